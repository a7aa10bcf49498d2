//! # Fetch/Mapping Service
//!
//! Executes a definition's request through a [`Transport`], extracts the row
//! array, and maps rows into [`OptionItem`]s. Responses are cached per request
//! identity, and identical in-flight requests share a single transport call.
//!
//! Standalone definitions without an `option_value` mapping get their value
//! key inferred from the first conclusive response; the inferred key is
//! remembered per definition id so later fetches map consistently.

pub mod cache;
pub mod mapping;
pub mod transport;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures_util::FutureExt;
use lister_types::{Definition, FetchQuery, FieldSpec, ListRequest, OptionItem};
use lister_util::merge_defined_maps;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub use cache::{FetchPolicy, ResponseCache};
pub use mapping::{map_rows, pick, select_rows};
pub use transport::{HttpTransport, NullTransport, Transport};

use crate::{config::ListerConfig, error::ListerError, inference::infer_option_value_key_with};

/// Raw rows and the options mapped from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub raw: Vec<Value>,
    pub options: Vec<OptionItem>,
}

pub struct FetchService {
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    config: ListerConfig,
    inferred_keys: Mutex<HashMap<String, String>>,
}

impl FetchService {
    pub fn new(transport: Arc<dyn Transport>, config: ListerConfig) -> Self {
        Self {
            transport,
            cache: ResponseCache::new(),
            config,
            inferred_keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn config(&self) -> &ListerConfig {
        &self.config
    }

    /// Value key previously inferred for a standalone definition.
    pub fn inferred_key(&self, definition_id: &str) -> Option<String> {
        self.inferred_keys.lock().ok()?.get(definition_id).cloned()
    }

    /// Build the request for a definition, filters and search query.
    ///
    /// A definition's own `build_request` wins. Otherwise the endpoint is
    /// requested with `source.params` overlaid by `filters`; a non-empty query
    /// adds the search text and, when known, the targeted column.
    pub fn build_request(&self, definition: &Definition, filters: &Map<String, Value>, query: &FetchQuery) -> ListRequest {
        if let Some(build_request) = &definition.source.build_request {
            return build_request.build(filters, query);
        }

        let mut params = merge_defined_maps(&definition.source.params, filters);
        if !query.is_empty() {
            let search = definition.search.as_ref();
            let query_param = search
                .and_then(|search| search.param.clone())
                .unwrap_or_else(|| self.config.search_param.clone());
            params.insert(query_param, Value::String(query.query.trim().to_string()));
            if let Some(target) = &query.target {
                let target_param = search
                    .and_then(|search| search.target_param.clone())
                    .unwrap_or_else(|| self.config.search_target_param.clone());
                params.insert(target_param, Value::String(target.clone()));
            }
        }

        ListRequest::new(definition.source.endpoint.clone())
            .with_method(definition.source.method.clone())
            .with_params(params)
    }

    pub async fn fetch(&self, definition: &Definition, filters: &Map<String, Value>, query: &FetchQuery) -> Result<FetchResult, ListerError> {
        self.fetch_with_policy(definition, filters, query, FetchPolicy::CacheFirst).await
    }

    pub async fn fetch_with_policy(
        &self,
        definition: &Definition,
        filters: &Map<String, Value>,
        query: &FetchQuery,
        policy: FetchPolicy,
    ) -> Result<FetchResult, ListerError> {
        let request = self.build_request(definition, filters, query);
        let payload = self.send(&request, policy).await.inspect_err(|error| {
            warn!(definition_id = %definition.id, endpoint = %request.endpoint, error = %error, "list fetch failed");
        })?;

        let raw = select_rows(definition, &payload)?;
        let value_spec = self.value_spec(definition, &raw);
        let options = map_rows(definition, &value_spec, &raw, &query.query);
        info!(
            definition_id = %definition.id,
            endpoint = %request.endpoint,
            row_count = raw.len(),
            item_count = options.len(),
            "list fetch completed"
        );
        Ok(FetchResult { raw, options })
    }

    async fn send(&self, request: &ListRequest, policy: FetchPolicy) -> Result<Arc<Value>, ListerError> {
        if !self.config.cache_enabled {
            return self.transport.send(request).await.map(Arc::new);
        }

        let key = request.cache_key();
        let transport = Arc::clone(&self.transport);
        let owned_request = request.clone();
        self.cache
            .get_or_fetch(&key, policy, move || async move { transport.send(&owned_request).await }.boxed())
            .await
    }

    fn value_spec(&self, definition: &Definition, raw: &[Value]) -> FieldSpec {
        if let Some(spec) = &definition.mapping.option_value {
            return spec.clone();
        }
        if let Some(key) = self.inferred_key(&definition.id) {
            return FieldSpec::Key(key);
        }

        let inferred = infer_option_value_key_with(raw, &self.config.fallback_value_key, self.config.inference_sample_size);
        // A fallback is not remembered so a later response can still infer.
        if inferred.inferred
            && !raw.is_empty()
            && let Ok(mut keys) = self.inferred_keys.lock()
        {
            keys.insert(definition.id.clone(), inferred.key.clone());
        }
        debug!(
            definition_id = %definition.id,
            key = %inferred.key,
            inferred = inferred.inferred,
            "option value key selected for standalone definition"
        );
        FieldSpec::Key(inferred.key)
    }
}
