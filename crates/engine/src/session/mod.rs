//! # Picker Sessions
//!
//! [`Lister`] is the engine facade. It resolves definitions, owns the session
//! store and drives fetches for open sessions.
//!
//! ## Lifecycle
//!
//! `open` creates a session (or reuses the owner's open one) and returns an
//! [`OpenHandle`] that settles once the session leaves the open state through
//! `apply`, `cancel` or `close`. While open, the session fetches its initial
//! options and re-fetches on debounced query changes.
//!
//! ## Ordering
//!
//! Every fetch is tagged with the session's generation at the time it was
//! issued. Query changes, target changes and refreshes bump the generation,
//! so a slow response for an older query is discarded even when it arrives
//! after a newer one. Closing a session evicts it from the store, which makes
//! any still-running fetch for it a no-op.
//!
//! The store sits behind a `std::sync::Mutex` that is never held across an
//! `.await`.

pub mod options;
pub mod store;

use std::{
    future::IntoFuture,
    sync::{Arc, Mutex, MutexGuard},
};

use futures_util::{FutureExt, future::BoxFuture};
use indexmap::IndexMap;
use lister_types::{Definition, FetchQuery, OptionItem, OptionValue, OutcomeReason, SearchSpec, SelectionMode, SelectionValue, SessionOutcome};
use serde_json::{Map, Value};
use tokio::{
    runtime::Handle,
    sync::{oneshot, watch},
};
use tracing::{debug, info, warn};

pub use options::{OpenOptions, PickerPermissions, RefreshMode, RenderOption, SearchMode};
pub use store::{Session, SessionId, StoreSnapshot};
use store::{SessionSlot, SessionStore};

use crate::{
    config::ListerConfig,
    error::ListerError,
    fetch::{FetchPolicy, FetchResult, FetchService, Transport},
    registry::{DefinitionRef, DefinitionRegistry},
};

/// Handle returned by [`Lister::open`]. Await it for the session outcome.
#[derive(Debug)]
pub struct OpenHandle {
    session_id: SessionId,
    reused: bool,
    receiver: oneshot::Receiver<SessionOutcome>,
}

impl OpenHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Whether the handle joined a session that was already open.
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    /// Wait for the session to close. A session torn down without an
    /// outcome counts as cancelled.
    pub async fn outcome(self) -> SessionOutcome {
        self.receiver.await.unwrap_or_else(|_| SessionOutcome::cancel())
    }
}

impl IntoFuture for OpenHandle {
    type Output = SessionOutcome;
    type IntoFuture = BoxFuture<'static, SessionOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        self.outcome().boxed()
    }
}

/// The picker engine: definition registry, fetch service and session store.
#[derive(Clone)]
pub struct Lister {
    inner: Arc<ListerInner>,
}

struct ListerInner {
    store: Mutex<SessionStore>,
    fetcher: FetchService,
    registry: Mutex<DefinitionRegistry>,
    revision: watch::Sender<u64>,
}

/// Clears an owner's opening mark when `open` returns.
struct OpeningGuard<'a> {
    lister: &'a Lister,
    owner_key: String,
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        self.lister.store().finish_opening(&self.owner_key);
    }
}

impl Lister {
    pub fn new(transport: Arc<dyn Transport>, config: ListerConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(ListerInner {
                store: Mutex::new(SessionStore::default()),
                fetcher: FetchService::new(transport, config),
                registry: Mutex::new(DefinitionRegistry::new()),
                revision,
            }),
        }
    }

    pub fn with_registry(self, registry: DefinitionRegistry) -> Self {
        *self.inner.registry.lock().expect("definition registry lock") = registry;
        self
    }

    pub fn config(&self) -> &ListerConfig {
        self.inner.fetcher.config()
    }

    pub fn fetcher(&self) -> &FetchService {
        &self.inner.fetcher
    }

    pub fn register(&self, definition: Definition) -> Result<(), ListerError> {
        self.inner.registry.lock().expect("definition registry lock").register(definition)
    }

    pub fn resolve(&self, reference: &DefinitionRef) -> Option<Definition> {
        self.inner.registry.lock().expect("definition registry lock").resolve(reference)
    }

    /// Fetch options for a definition outside of any session.
    pub async fn fetch(&self, definition: &Definition, filters: &Map<String, Value>, query: &FetchQuery) -> Result<FetchResult, ListerError> {
        self.inner.fetcher.fetch(definition, filters, query).await
    }

    /// Subscribe to store changes. The value is a revision counter bumped on
    /// every mutation.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store().snapshot()
    }

    pub fn session(&self, session_id: SessionId) -> Option<Session> {
        self.store().get(session_id).map(|slot| slot.session.clone())
    }

    /// Labels of the shown options, through the session's renderer.
    ///
    /// The renderer runs after the store lock is released, so it may call back
    /// into the [`Lister`].
    pub fn rendered_labels(&self, session_id: SessionId) -> Option<Vec<String>> {
        let session = self.session(session_id)?;
        Some(session.options.iter().map(|option| session.render(option)).collect())
    }

    /// Wait until the session has no fetch pending. Returns `None` once the
    /// session is closed.
    pub async fn wait_until_loaded(&self, session_id: SessionId) -> Option<Session> {
        let mut revisions = self.watch();
        loop {
            match self.session(session_id) {
                None => return None,
                Some(session) if !session.loading => return Some(session),
                Some(_) => {}
            }
            if revisions.changed().await.is_err() {
                return self.session(session_id);
            }
        }
    }

    /// Open a picker session.
    ///
    /// Returns `None` without creating a session when the definition does not
    /// resolve, or when an open for the same owner is already underway. When
    /// the owner already has an open session, the returned handle joins it.
    pub fn open(&self, reference: impl Into<DefinitionRef>, filters: Map<String, Value>, options: OpenOptions) -> Option<OpenHandle> {
        let reference = reference.into();
        let owner_key = options.owner_key.clone();

        if let Some(owner_key) = &owner_key {
            let mut store = self.store();
            if let Some(session_id) = store.find_open_for_owner(owner_key) {
                let (sender, receiver) = oneshot::channel();
                if let Some(slot) = store.get_mut(session_id) {
                    slot.waiters.push(sender);
                }
                debug!(session_id = %session_id, owner_key = %owner_key, "reusing open session");
                return Some(OpenHandle {
                    session_id,
                    reused: true,
                    receiver,
                });
            }
            if !store.begin_opening(owner_key) {
                debug!(owner_key = %owner_key, "ignoring re-entrant open");
                return None;
            }
        }
        let _opening = owner_key.clone().map(|owner_key| OpeningGuard { lister: self, owner_key });

        let Some(definition) = self.resolve(&reference) else {
            debug!(reference = ?reference, "open ignored: definition did not resolve");
            return None;
        };

        let (sender, receiver) = oneshot::channel();
        let session_id = {
            let mut store = self.store();
            let session_id = store.next_id();
            let mode = options.mode;
            let working_value = options
                .default_value
                .clone()
                .map(|value| value.conform_to(mode))
                .unwrap_or_else(|| SelectionValue::empty(mode));
            let search_target = options
                .search_target
                .clone()
                .or_else(|| definition.search.as_ref().and_then(SearchSpec::default_target));

            let session = Session {
                id: session_id,
                owner_key: owner_key.clone().unwrap_or_else(|| format!("session:{session_id}")),
                is_open: true,
                mode,
                confirm: options.effective_confirm(),
                working_value,
                search_query: options.initial_query.clone().unwrap_or_default(),
                search_target,
                options: Vec::new(),
                all_options: Vec::new(),
                filters,
                definition,
                title: options.title.clone(),
                search_mode: options.search_mode,
                permissions: options.permissions,
                show_refresh: options.show_refresh,
                refresh_mode: options.refresh_mode,
                filters_spec: options.filters_spec.clone(),
                render_option: options.render_option.clone(),
                selected_snapshots: IndexMap::new(),
                loading: true,
                last_error: None,
                generation: 1,
            };
            info!(
                session_id = %session_id,
                owner_key = %session.owner_key,
                definition_id = %session.definition.id,
                mode = ?mode,
                "session opened"
            );
            let mut slot = SessionSlot::new(session);
            slot.waiters.push(sender);
            store.insert(slot);
            session_id
        };
        self.notify();

        let policy = match options.refresh_mode {
            RefreshMode::Cached => FetchPolicy::CacheFirst,
            RefreshMode::OnOpen => FetchPolicy::Refresh,
        };
        self.spawn_fetch(session_id, 1, policy);

        Some(OpenHandle {
            session_id,
            reused: false,
            receiver,
        })
    }

    /// Update the search text. Remote sessions fetch after the debounce
    /// window; local sessions filter the fetched options immediately.
    pub fn set_query(&self, session_id: SessionId, text: impl Into<String>) {
        let text = text.into();
        let mut store = self.store();
        let Some(slot) = store.get_mut(session_id) else {
            return;
        };
        if !slot.session.permissions.can_search {
            debug!(session_id = %session_id, "search not permitted");
            return;
        }
        slot.session.search_query = text;
        match slot.session.search_mode {
            SearchMode::Local => slot.session.options = visible_options(&slot.session),
            SearchMode::Remote => self.schedule_search(slot),
        }
        drop(store);
        self.notify();
    }

    /// Change the targeted search column, re-running a pending query.
    pub fn set_search_target(&self, session_id: SessionId, column: Option<String>) {
        let mut store = self.store();
        let Some(slot) = store.get_mut(session_id) else {
            return;
        };
        slot.session.search_target = column;
        if slot.session.search_mode == SearchMode::Remote && !slot.session.search_query.trim().is_empty() {
            self.schedule_search(slot);
        }
        drop(store);
        self.notify();
    }

    /// Toggle an option in the working value.
    ///
    /// Single selection without confirmation applies immediately. Disabled
    /// and unknown options are ignored. Returns whether the toggle happened.
    pub fn toggle(&self, session_id: SessionId, value: OptionValue) -> bool {
        let mut store = self.store();
        let Some(slot) = store.get_mut(session_id) else {
            return false;
        };
        let session = &mut slot.session;
        let option = session.find_option(&value).cloned();
        match &option {
            Some(option) if option.disabled => {
                debug!(session_id = %session_id, value = %value, "ignoring toggle of disabled option");
                return false;
            }
            None if !session.working_value.contains(&value) => {
                debug!(session_id = %session_id, value = %value, "ignoring toggle of unknown option");
                return false;
            }
            _ => {}
        }

        let selected = session.working_value.toggle(value.clone());
        if session.mode == SelectionMode::Single {
            session.selected_snapshots.clear();
        }
        match option {
            Some(option) if selected => {
                session.selected_snapshots.insert(value, option);
            }
            _ if !selected => {
                session.selected_snapshots.shift_remove(&value);
            }
            _ => {}
        }
        let apply_now = session.mode == SelectionMode::Single && !session.confirm;
        drop(store);

        if apply_now {
            self.finish(session_id, OutcomeReason::Apply);
        } else {
            self.notify();
        }
        true
    }

    /// Settle the session with its working value.
    pub fn apply(&self, session_id: SessionId) -> bool {
        self.finish(session_id, OutcomeReason::Apply)
    }

    /// Settle the session without a value.
    pub fn cancel(&self, session_id: SessionId) -> bool {
        self.finish(session_id, OutcomeReason::Cancel)
    }

    /// Forced close; a no-op for sessions that are already gone.
    pub fn close(&self, session_id: SessionId) {
        self.finish(session_id, OutcomeReason::Cancel);
    }

    pub fn close_for_owner(&self, owner_key: &str) {
        let session_id = self.store().find_open_for_owner(owner_key);
        if let Some(session_id) = session_id {
            self.close(session_id);
        }
    }

    /// Empty the working value without closing the session.
    pub fn clear(&self, session_id: SessionId) {
        let mut store = self.store();
        let Some(slot) = store.get_mut(session_id) else {
            return;
        };
        if !slot.session.permissions.can_clear {
            debug!(session_id = %session_id, "clear not permitted");
            return;
        }
        slot.session.working_value = SelectionValue::empty(slot.session.mode);
        slot.session.selected_snapshots.clear();
        drop(store);
        self.notify();
    }

    /// Refetch the current query, bypassing the response cache.
    pub fn refresh(&self, session_id: SessionId) {
        let mut store = self.store();
        let Some(slot) = store.get_mut(session_id) else {
            return;
        };
        if !slot.session.permissions.can_refresh {
            debug!(session_id = %session_id, "refresh not permitted");
            return;
        }
        slot.cancel_debounce();
        slot.session.generation += 1;
        slot.session.loading = true;
        let generation = slot.session.generation;
        drop(store);

        self.notify();
        self.spawn_fetch(session_id, generation, FetchPolicy::Refresh);
    }

    fn store(&self) -> MutexGuard<'_, SessionStore> {
        self.inner.store.lock().expect("session store lock")
    }

    fn notify(&self) {
        self.inner.revision.send_modify(|revision| *revision += 1);
    }

    fn finish(&self, session_id: SessionId, reason: OutcomeReason) -> bool {
        let Some(mut slot) = self.store().evict(session_id) else {
            debug!(session_id = %session_id, "session already closed");
            return false;
        };
        slot.cancel_debounce();
        slot.session.is_open = false;

        let outcome = match reason {
            OutcomeReason::Apply => SessionOutcome::apply(slot.session.working_value.clone(), slot.session.selected_options()),
            OutcomeReason::Cancel => SessionOutcome::cancel(),
        };
        for waiter in slot.waiters.drain(..) {
            // A dropped handle no longer cares about the outcome.
            let _ = waiter.send(outcome.clone());
        }
        info!(
            session_id = %session_id,
            owner_key = %slot.session.owner_key,
            reason = ?reason,
            "session closed"
        );
        self.notify();
        true
    }

    /// Bump the generation and start the debounce timer for a remote search.
    fn schedule_search(&self, slot: &mut SessionSlot) {
        slot.cancel_debounce();
        slot.session.generation += 1;
        slot.session.loading = true;
        let session_id = slot.session.id;
        let generation = slot.session.generation;

        let Ok(runtime) = Handle::try_current() else {
            warn!(session_id = %session_id, "no async runtime; search fetch skipped");
            slot.session.loading = false;
            return;
        };
        let lister = self.clone();
        let debounce = self.config().debounce();
        debug!(session_id = %session_id, generation, debounce_ms = debounce.as_millis(), "search scheduled");
        slot.debounce = Some(runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            if lister.begin_debounced_fetch(session_id, generation) {
                lister.run_fetch(session_id, generation, FetchPolicy::CacheFirst).await;
            }
        }));
    }

    /// Detach the elapsed debounce timer so later keystrokes no longer abort
    /// the fetch it starts.
    fn begin_debounced_fetch(&self, session_id: SessionId, generation: u64) -> bool {
        let mut store = self.store();
        match store.get_mut(session_id) {
            Some(slot) if slot.session.generation == generation => {
                slot.debounce = None;
                true
            }
            _ => false,
        }
    }

    fn spawn_fetch(&self, session_id: SessionId, generation: u64, policy: FetchPolicy) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(session_id = %session_id, "no async runtime; fetch skipped");
            if let Some(slot) = self.store().get_mut(session_id) {
                slot.session.loading = false;
            }
            return;
        };
        let lister = self.clone();
        runtime.spawn(async move {
            lister.run_fetch(session_id, generation, policy).await;
        });
    }

    async fn run_fetch(&self, session_id: SessionId, generation: u64, policy: FetchPolicy) {
        let Some((definition, filters, query)) = self.fetch_inputs(session_id, generation) else {
            return;
        };
        debug!(
            session_id = %session_id,
            definition_id = %definition.id,
            generation,
            query = %query.query,
            "session fetch started"
        );
        let result = self.inner.fetcher.fetch_with_policy(&definition, &filters, &query, policy).await;
        self.apply_fetch_result(session_id, generation, result);
    }

    fn fetch_inputs(&self, session_id: SessionId, generation: u64) -> Option<(Definition, Map<String, Value>, FetchQuery)> {
        let store = self.store();
        let session = &store.get(session_id)?.session;
        if !session.is_open || session.generation != generation {
            return None;
        }
        let query = match session.search_mode {
            SearchMode::Local => FetchQuery::default(),
            SearchMode::Remote => FetchQuery::new(session.search_query.clone()).with_target(session.search_target.clone()),
        };
        Some((session.definition.clone(), session.filters.clone(), query))
    }

    fn apply_fetch_result(&self, session_id: SessionId, generation: u64, result: Result<FetchResult, ListerError>) {
        let mut store = self.store();
        let Some(slot) = store.get_mut(session_id) else {
            debug!(session_id = %session_id, generation, "discarding fetch result for closed session");
            return;
        };
        let session = &mut slot.session;
        if !session.is_open || session.generation != generation {
            warn!(
                session_id = %session_id,
                generation,
                current_generation = session.generation,
                "discarding stale fetch result"
            );
            return;
        }

        session.loading = false;
        match result {
            Ok(result) => {
                for option in &result.options {
                    if session.working_value.contains(&option.value) {
                        session.selected_snapshots.insert(option.value.clone(), option.clone());
                    }
                }
                session.all_options = result.options;
                session.options = visible_options(session);
                session.last_error = None;
                debug!(
                    session_id = %session_id,
                    generation,
                    item_count = session.options.len(),
                    "session options updated"
                );
            }
            Err(error) => {
                warn!(
                    session_id = %session_id,
                    generation,
                    error = %error,
                    "session fetch failed; keeping previous options"
                );
                session.last_error = Some(error);
            }
        }
        drop(store);
        self.notify();
    }
}

/// Options shown for the session's current query. Remote sessions show every
/// fetched option; local sessions match label or value case-insensitively.
fn visible_options(session: &Session) -> Vec<OptionItem> {
    let query = session.search_query.trim().to_lowercase();
    if session.search_mode == SearchMode::Remote || query.is_empty() {
        return session.all_options.clone();
    }
    session
        .all_options
        .iter()
        .filter(|option| {
            option.display_label().to_lowercase().contains(&query) || option.value.to_string().to_lowercase().contains(&query)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::NullTransport;
    use async_trait::async_trait;
    use lister_types::{DefinitionPatch, ListRequest};
    use serde_json::json;
    use std::time::Duration;

    struct RowsTransport(Value);

    #[async_trait]
    impl Transport for RowsTransport {
        async fn send(&self, _request: &ListRequest) -> Result<Value, ListerError> {
            Ok(self.0.clone())
        }
    }

    struct FlakyTransport {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn send(&self, _request: &ListRequest) -> Result<Value, ListerError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Ok(json!([{"id": 1, "name": "one"}]))
            } else {
                Err(ListerError::Transport("connection reset".into()))
            }
        }
    }

    /// Answers by search column and records every request. Searches on
    /// `name` are slow.
    #[derive(Default)]
    struct ColumnTransport {
        requests: Mutex<Vec<ListRequest>>,
    }

    impl ColumnTransport {
        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last_param(&self, name: &str) -> Option<Value> {
            self.requests.lock().unwrap().last()?.params.get(name).cloned()
        }
    }

    #[async_trait]
    impl Transport for ColumnTransport {
        async fn send(&self, request: &ListRequest) -> Result<Value, ListerError> {
            self.requests.lock().unwrap().push(request.clone());
            match request.params.get("searchField").and_then(Value::as_str) {
                Some("name") => {
                    tokio::time::sleep(Duration::from_millis(900)).await;
                    Ok(json!([{"id": 1, "name": "by name"}]))
                }
                Some(_) => Ok(json!([{"id": 2, "name": "by email"}])),
                None => Ok(rows()),
            }
        }
    }

    fn column_lister() -> (Lister, Arc<ColumnTransport>) {
        let transport = Arc::new(ColumnTransport::default());
        let lister = Lister::new(transport.clone(), ListerConfig::default());
        let definition = Definition::new("/items", "id")
            .with_id("items")
            .with_label_key("name")
            .with_search(SearchSpec {
                columns: Some(vec!["name".into(), "email".into()]),
                default: Some("email".into()),
                ..SearchSpec::default()
            });
        lister.register(definition).unwrap();
        (lister, transport)
    }

    fn lister(rows: Value) -> Lister {
        let lister = Lister::new(Arc::new(RowsTransport(rows)), ListerConfig::default());
        lister
            .register(Definition::new("/items", "id").with_id("items").with_label_key("name"))
            .unwrap();
        lister
    }

    fn rows() -> Value {
        json!([
            {"id": 1, "name": "Alpha"},
            {"id": 2, "name": "Beta"},
            {"id": 3, "name": "Gamma", "locked": true}
        ])
    }

    #[tokio::test]
    async fn unresolved_definition_opens_nothing() {
        let lister = Lister::new(Arc::new(NullTransport), ListerConfig::default());
        assert!(lister.open(DefinitionRef::named("missing"), Map::new(), OpenOptions::single()).is_none());
        assert!(lister.open(DefinitionPatch::default(), Map::new(), OpenOptions::single()).is_none());
        assert!(lister.snapshot().sessions.is_empty());
    }

    #[tokio::test]
    async fn same_owner_reuses_open_session() {
        let lister = lister(rows());
        let first = lister
            .open(DefinitionRef::named("items"), Map::new(), OpenOptions::single().owner("field-1"))
            .unwrap();
        let second = lister
            .open(DefinitionRef::named("items"), Map::new(), OpenOptions::single().owner("field-1"))
            .unwrap();

        assert_eq!(first.session_id(), second.session_id());
        assert!(second.is_reused());
        assert_eq!(lister.snapshot().order.len(), 1);

        lister.cancel(first.session_id());
        assert_eq!(first.await.reason, OutcomeReason::Cancel);
        assert_eq!(second.await.reason, OutcomeReason::Cancel);
    }

    #[tokio::test]
    async fn reentrant_open_is_ignored() {
        let lister = lister(rows());
        lister.store().begin_opening("field-1");
        assert!(
            lister
                .open(DefinitionRef::named("items"), Map::new(), OpenOptions::single().owner("field-1"))
                .is_none()
        );
    }

    #[tokio::test]
    async fn single_select_without_confirm_applies_immediately() {
        let lister = lister(rows());
        let handle = lister.open(DefinitionRef::named("items"), Map::new(), OpenOptions::single()).unwrap();
        let session_id = handle.session_id();
        lister.wait_until_loaded(session_id).await.unwrap();

        assert!(lister.toggle(session_id, OptionValue::from(2)));
        let outcome = handle.await;
        assert!(outcome.is_apply());
        assert_eq!(outcome.value, Some(SelectionValue::Single(Some(OptionValue::from(2)))));
        assert_eq!(outcome.details.unwrap().options[0].label.as_deref(), Some("Beta"));
        assert!(lister.session(session_id).is_none());
    }

    #[tokio::test]
    async fn multiple_mode_stays_open_until_apply() {
        let lister = lister(rows());
        let handle = lister.open(DefinitionRef::named("items"), Map::new(), OpenOptions::multiple()).unwrap();
        let session_id = handle.session_id();
        lister.wait_until_loaded(session_id).await.unwrap();

        lister.toggle(session_id, OptionValue::from(1));
        lister.toggle(session_id, OptionValue::from(2));
        lister.toggle(session_id, OptionValue::from(1));
        lister.clear(session_id);
        lister.toggle(session_id, OptionValue::from(3));
        lister.toggle(session_id, OptionValue::from(1));

        let session = lister.session(session_id).expect("still open");
        assert!(session.is_open);
        assert_eq!(session.working_value, SelectionValue::Multiple(vec![OptionValue::from(3), OptionValue::from(1)]));

        assert!(lister.apply(session_id));
        let outcome = handle.await;
        assert_eq!(outcome.reason, OutcomeReason::Apply);
        assert_eq!(outcome.details.unwrap().options.len(), 2);
    }

    #[tokio::test]
    async fn disabled_and_unknown_options_are_ignored() {
        let lister = lister(rows());
        let mut definition = Definition::new("/items", "id").with_id("locked");
        definition.mapping.option_disabled = Some(lister_types::FieldSpec::key("locked"));
        lister.register(definition).unwrap();

        let handle = lister.open(DefinitionRef::named("locked"), Map::new(), OpenOptions::multiple()).unwrap();
        let session_id = handle.session_id();
        lister.wait_until_loaded(session_id).await.unwrap();

        assert!(!lister.toggle(session_id, OptionValue::from(3)));
        assert!(!lister.toggle(session_id, OptionValue::from(42)));
        assert!(lister.session(session_id).unwrap().working_value.is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_cancels() {
        let lister = lister(rows());
        let handle = lister
            .open(DefinitionRef::named("items"), Map::new(), OpenOptions::multiple().owner("field"))
            .unwrap();
        let session_id = handle.session_id();

        lister.close_for_owner("field");
        lister.close(session_id);
        assert!(!lister.cancel(session_id));
        assert_eq!(handle.await, SessionOutcome::cancel());
        assert!(lister.snapshot().active_id.is_none());
    }

    #[tokio::test]
    async fn default_value_and_search_target_are_seeded() {
        let lister = lister(rows());
        let patch = DefinitionPatch {
            search: Some(SearchSpec {
                columns: Some(vec!["name".into(), "email".into()]),
                ..SearchSpec::default()
            }),
            ..DefinitionPatch::default()
        };
        let reference = DefinitionRef::Patched {
            id: "items".into(),
            patch,
        };
        let options = OpenOptions::multiple().default_value(SelectionValue::Single(Some(OptionValue::from(2))));
        let handle = lister.open(reference, Map::new(), options).unwrap();

        let session = lister.wait_until_loaded(handle.session_id()).await.unwrap();
        assert_eq!(session.search_target.as_deref(), Some("name"));
        assert_eq!(session.working_value, SelectionValue::Multiple(vec![OptionValue::from(2)]));
        assert_eq!(session.selected_options()[0].label.as_deref(), Some("Beta"));
    }

    #[tokio::test]
    async fn local_search_filters_without_fetching() {
        let lister = lister(rows());
        let handle = lister
            .open(
                DefinitionRef::named("items"),
                Map::new(),
                OpenOptions::single().search_mode(SearchMode::Local),
            )
            .unwrap();
        let session_id = handle.session_id();
        lister.wait_until_loaded(session_id).await.unwrap();

        lister.set_query(session_id, "ET");
        let session = lister.session(session_id).unwrap();
        assert!(!session.loading);
        assert_eq!(session.options.len(), 1);
        assert_eq!(session.options[0].display_label(), "Beta");

        lister.set_query(session_id, "");
        assert_eq!(lister.session(session_id).unwrap().options.len(), 3);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_options() {
        let lister = Lister::new(Arc::new(FlakyTransport { calls: Mutex::new(0) }), ListerConfig::default());
        lister.register(Definition::new("/items", "id").with_id("items")).unwrap();
        let handle = lister.open(DefinitionRef::named("items"), Map::new(), OpenOptions::single()).unwrap();
        let session_id = handle.session_id();
        assert_eq!(lister.wait_until_loaded(session_id).await.unwrap().options.len(), 1);

        lister.refresh(session_id);
        let session = lister.wait_until_loaded(session_id).await.unwrap();
        assert_eq!(session.options.len(), 1);
        assert_eq!(session.last_error, Some(ListerError::Transport("connection reset".into())));
    }

    #[tokio::test]
    async fn permissions_gate_actions() {
        let lister = lister(rows());
        let permissions = PickerPermissions {
            can_clear: false,
            can_refresh: false,
            can_search: false,
        };
        let options = OpenOptions::multiple()
            .permissions(permissions)
            .default_value(SelectionValue::Multiple(vec![OptionValue::from(1)]));
        let handle = lister.open(DefinitionRef::named("items"), Map::new(), options).unwrap();
        let session_id = handle.session_id();
        let loaded = lister.wait_until_loaded(session_id).await.unwrap();

        lister.clear(session_id);
        lister.set_query(session_id, "beta");
        lister.refresh(session_id);

        let session = lister.session(session_id).unwrap();
        assert_eq!(session.working_value, SelectionValue::Multiple(vec![OptionValue::from(1)]));
        assert!(session.search_query.is_empty());
        assert_eq!(session.generation, loaded.generation);
    }

    #[tokio::test(start_paused = true)]
    async fn queries_are_debounced() {
        let lister = lister(rows());
        let handle = lister.open(DefinitionRef::named("items"), Map::new(), OpenOptions::single()).unwrap();
        let session_id = handle.session_id();
        lister.wait_until_loaded(session_id).await.unwrap();

        lister.set_query(session_id, "a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        lister.set_query(session_id, "al");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(lister.session(session_id).unwrap().loading);

        let session = lister.wait_until_loaded(session_id).await.unwrap();
        assert_eq!(session.search_query, "al");
        assert_eq!(session.generation, 3);
    }

    #[tokio::test]
    async fn rendered_labels_use_custom_renderer() {
        let lister = lister(rows());
        let options = OpenOptions::single().render_option(RenderOption::new(|option| format!("{} ({})", option.display_label(), option.value)));
        let handle = lister.open(DefinitionRef::named("items"), Map::new(), options).unwrap();
        lister.wait_until_loaded(handle.session_id()).await.unwrap();

        let labels = lister.rendered_labels(handle.session_id()).unwrap();
        assert_eq!(labels[0], "Alpha (1)");
    }

    #[tokio::test]
    async fn renderer_may_read_the_store() {
        let lister = lister(rows());
        let observer = lister.clone();
        let render = RenderOption::new(move |option| format!("{} of {}", option.display_label(), observer.snapshot().order.len()));
        let handle = lister
            .open(DefinitionRef::named("items"), Map::new(), OpenOptions::single().render_option(render))
            .unwrap();
        lister.wait_until_loaded(handle.session_id()).await.unwrap();

        let labels = lister.rendered_labels(handle.session_id()).unwrap();
        assert_eq!(labels, vec!["Alpha of 1", "Beta of 1", "Gamma of 1"]);
        lister.close(handle.session_id());
    }

    #[tokio::test]
    async fn open_option_target_wins_over_search_default() {
        let (lister, _transport) = column_lister();
        let defaulted = lister.open(DefinitionRef::named("items"), Map::new(), OpenOptions::single()).unwrap();
        let chosen = lister
            .open(DefinitionRef::named("items"), Map::new(), OpenOptions::single().search_target("name"))
            .unwrap();

        assert_eq!(lister.session(defaulted.session_id()).unwrap().search_target.as_deref(), Some("email"));
        assert_eq!(lister.session(chosen.session_id()).unwrap().search_target.as_deref(), Some("name"));
    }

    #[tokio::test]
    async fn initial_query_is_sent_with_first_request() {
        let (lister, transport) = column_lister();
        let handle = lister
            .open(DefinitionRef::named("items"), Map::new(), OpenOptions::single().initial_query("by"))
            .unwrap();
        let session = lister.wait_until_loaded(handle.session_id()).await.unwrap();

        assert_eq!(session.search_query, "by");
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.last_param("search"), Some(json!("by")));
        assert_eq!(transport.last_param("searchField"), Some(json!("email")));
        assert_eq!(session.options[0].display_label(), "by email");
    }

    #[tokio::test]
    async fn refresh_on_open_bypasses_warm_cache() {
        let (lister, transport) = column_lister();
        for _ in 0..2 {
            let handle = lister.open(DefinitionRef::named("items"), Map::new(), OpenOptions::single()).unwrap();
            lister.wait_until_loaded(handle.session_id()).await.unwrap();
            lister.close(handle.session_id());
        }
        assert_eq!(transport.calls(), 1);

        let handle = lister
            .open(
                DefinitionRef::named("items"),
                Map::new(),
                OpenOptions::single().refresh_mode(RefreshMode::OnOpen),
            )
            .unwrap();
        let session = lister.wait_until_loaded(handle.session_id()).await.unwrap();
        assert_eq!(transport.calls(), 2);
        assert_eq!(session.options.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn changing_target_refetches_and_drops_older_search() {
        let (lister, transport) = column_lister();
        let handle = lister
            .open(DefinitionRef::named("items"), Map::new(), OpenOptions::single().search_target("name"))
            .unwrap();
        let session_id = handle.session_id();
        lister.wait_until_loaded(session_id).await.unwrap();

        // The "name" search is in flight when the target changes.
        lister.set_query(session_id, "b");
        tokio::time::sleep(Duration::from_millis(300)).await;
        lister.set_search_target(session_id, Some("email".into()));
        tokio::time::sleep(Duration::from_secs(2)).await;

        let session = lister.session(session_id).unwrap();
        assert!(!session.loading);
        assert_eq!(session.search_target.as_deref(), Some("email"));
        assert_eq!(session.options.len(), 1);
        assert_eq!(session.options[0].display_label(), "by email");
        assert_eq!(transport.calls(), 3);
        assert_eq!(transport.last_param("searchField"), Some(json!("email")));
    }
}
