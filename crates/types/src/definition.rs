//! Definitions describe a remote list source and how its rows become options.
//!
//! Mapping fields and selectors are either declarative (a key or dotted path)
//! or a function supplied by the host application. Function variants compare
//! by pointer identity so merged definitions stay comparable.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::{FetchQuery, ListRequest};

/// Row-to-value extractor supplied by the host.
pub type MappingFn = Arc<dyn Fn(&Value, &MappingContext) -> Option<Value> + Send + Sync>;

/// Extracts the raw row array from an arbitrary response payload.
pub type SelectorFn = Arc<dyn Fn(&Value) -> Option<Vec<Value>> + Send + Sync>;

/// Builds a custom request from the session filters and search query.
pub type RequestBuilderFn = Arc<dyn Fn(&Map<String, Value>, &FetchQuery) -> ListRequest + Send + Sync>;

/// Context handed to function mappings for each row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingContext {
    /// Position of the row inside the selected row array.
    pub index: usize,
    pub definition_id: String,
    /// Search text the rows were fetched for.
    pub query: String,
}

/// A mapping field: a raw-row key (dotted paths allowed) or a function.
#[derive(Clone)]
pub enum FieldSpec {
    Key(String),
    Fn(MappingFn),
}

impl FieldSpec {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    pub fn func(f: impl Fn(&Value, &MappingContext) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self::Fn(Arc::new(f))
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key.as_str()),
            Self::Fn(_) => None,
        }
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Fn(_) => f.write_str("Fn(<mapping>)"),
        }
    }
}

impl PartialEq for FieldSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Key(left), Self::Key(right)) => left == right,
            (Self::Fn(left), Self::Fn(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

/// Per-field extractors turning a raw row into an option.
///
/// Every field is optional so the same shape doubles as an inline patch. A
/// base definition must still name `option_value`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    pub option_value: Option<FieldSpec>,
    pub option_label: Option<FieldSpec>,
    pub option_icon: Option<FieldSpec>,
    pub option_description: Option<FieldSpec>,
    pub option_disabled: Option<FieldSpec>,
    pub option_group: Option<FieldSpec>,
    pub option_meta: Option<FieldSpec>,
}

impl Mapping {
    pub fn with_value(mut self, spec: FieldSpec) -> Self {
        self.option_value = Some(spec);
        self
    }

    pub fn with_label(mut self, spec: FieldSpec) -> Self {
        self.option_label = Some(spec);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Extracts the raw row array from a response.
#[derive(Clone)]
pub enum Selector {
    /// Dotted path into the payload; `"."` or `""` selects the root.
    Path(String),
    Fn(SelectorFn),
}

impl Selector {
    pub fn func(f: impl Fn(&Value) -> Option<Vec<Value>> + Send + Sync + 'static) -> Self {
        Self::Fn(Arc::new(f))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Fn(_) => f.write_str("Fn(<selector>)"),
        }
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Path(left), Self::Path(right)) => left == right,
            (Self::Fn(left), Self::Fn(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

/// Host-supplied request construction, compared by pointer identity.
#[derive(Clone)]
pub struct BuildRequest(pub RequestBuilderFn);

impl BuildRequest {
    pub fn new(f: impl Fn(&Map<String, Value>, &FetchQuery) -> ListRequest + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn build(&self, filters: &Map<String, Value>, query: &FetchQuery) -> ListRequest {
        (self.0)(filters, query)
    }
}

impl fmt::Debug for BuildRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BuildRequest(<fn>)")
    }
}

impl PartialEq for BuildRequest {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Where rows come from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Source {
    pub endpoint: String,
    /// HTTP method; `None` leaves the choice to the transport.
    pub method: Option<String>,
    pub build_request: Option<BuildRequest>,
    /// Static request parameters, overlaid by the session filters.
    pub params: Map<String, Value>,
}

/// Which remote column(s) a search targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Column targeted when the caller does not pick one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Request parameter carrying the search text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Request parameter carrying the targeted column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_param: Option<String>,
}

impl SearchSpec {
    /// Column targeted when nothing more specific was requested.
    pub fn default_target(&self) -> Option<String> {
        self.default
            .clone()
            .or_else(|| self.columns.as_ref().and_then(|columns| columns.first().cloned()))
    }
}

/// The effective description of a remote option source.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    /// Stable identifier; defaults to the endpoint.
    pub id: String,
    pub source: Source,
    pub selector: Option<Selector>,
    pub mapping: Mapping,
    pub search: Option<SearchSpec>,
}

impl Definition {
    /// Definition reading `value_key` from each row returned by `endpoint`.
    pub fn new(endpoint: impl Into<String>, value_key: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            id: endpoint.clone(),
            source: Source {
                endpoint,
                ..Source::default()
            },
            selector: None,
            mapping: Mapping::default().with_value(FieldSpec::key(value_key)),
            search: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_label_key(mut self, key: impl Into<String>) -> Self {
        self.mapping.option_label = Some(FieldSpec::key(key));
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_search(mut self, search: SearchSpec) -> Self {
        self.search = Some(search);
        self
    }
}

/// Partial definition supplied at a call site.
///
/// `mapping` is always present (possibly empty) so it can merge field by field
/// into a base mapping. `None` fields leave the base untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefinitionPatch {
    pub id: Option<String>,
    pub endpoint: Option<String>,
    pub method: Option<String>,
    pub build_request: Option<BuildRequest>,
    pub params: Option<Map<String, Value>>,
    pub selector: Option<Selector>,
    pub mapping: Mapping,
    pub search: Option<SearchSpec>,
}

impl DefinitionPatch {
    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }
}
