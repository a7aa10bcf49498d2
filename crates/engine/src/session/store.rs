//! Session bookkeeping: open sessions, their order and the active one.
//!
//! The store is plain data guarded by the [`Lister`](crate::Lister) facade;
//! all mutation happens through its actions.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use indexmap::IndexMap;
use lister_types::{Definition, OptionItem, OptionValue, SelectionMode, SelectionValue, SessionOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{sync::oneshot, task::JoinHandle};

use super::options::{PickerPermissions, RefreshMode, RenderOption, SearchMode};
use crate::error::ListerError;

/// Monotonic session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of one picker interaction.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub owner_key: String,
    pub is_open: bool,
    pub mode: SelectionMode,
    pub confirm: bool,
    pub working_value: SelectionValue,
    pub search_query: String,
    pub search_target: Option<String>,
    /// Options currently shown.
    pub options: Vec<OptionItem>,
    /// Last fetched options before local filtering.
    pub all_options: Vec<OptionItem>,
    pub filters: Map<String, Value>,
    pub definition: Definition,
    pub title: Option<String>,
    pub search_mode: SearchMode,
    pub permissions: PickerPermissions,
    pub show_refresh: bool,
    pub refresh_mode: RefreshMode,
    pub filters_spec: Option<Value>,
    pub render_option: Option<RenderOption>,
    /// Option snapshots for the working selection, so labels survive searches
    /// that no longer return the selected rows.
    pub selected_snapshots: IndexMap<OptionValue, OptionItem>,
    pub loading: bool,
    pub last_error: Option<ListerError>,
    /// Latest issued fetch generation; older results are discarded.
    pub generation: u64,
}

impl Session {
    /// Snapshots for the working value, in selection order.
    pub fn selected_options(&self) -> Vec<OptionItem> {
        self.working_value
            .values()
            .filter_map(|value| self.selected_snapshots.get(value).cloned())
            .collect()
    }

    /// Look up an option by value among shown, fetched and selected options.
    pub fn find_option(&self, value: &OptionValue) -> Option<&OptionItem> {
        self.options
            .iter()
            .chain(self.all_options.iter())
            .find(|option| option.value == *value)
            .or_else(|| self.selected_snapshots.get(value))
    }

    /// Label for an option, through the session's renderer when it has one.
    pub fn render(&self, option: &OptionItem) -> String {
        match &self.render_option {
            Some(render) => render.render(option),
            None => option.display_label(),
        }
    }
}

/// A stored session with its pending open handles and debounce timer.
pub(crate) struct SessionSlot {
    pub(crate) session: Session,
    pub(crate) waiters: Vec<oneshot::Sender<SessionOutcome>>,
    pub(crate) debounce: Option<JoinHandle<()>>,
}

impl SessionSlot {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            session,
            waiters: Vec::new(),
            debounce: None,
        }
    }

    pub(crate) fn cancel_debounce(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }
}

/// Read-only copy of the store.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub sessions: HashMap<SessionId, Session>,
    pub order: Vec<SessionId>,
    pub active_id: Option<SessionId>,
}

impl StoreSnapshot {
    pub fn active(&self) -> Option<&Session> {
        self.active_id.and_then(|id| self.sessions.get(&id))
    }
}

#[derive(Default)]
pub(crate) struct SessionStore {
    slots: HashMap<SessionId, SessionSlot>,
    order: Vec<SessionId>,
    active_id: Option<SessionId>,
    opening: HashSet<String>,
    next_id: u64,
}

impl SessionStore {
    pub(crate) fn next_id(&mut self) -> SessionId {
        self.next_id += 1;
        SessionId(self.next_id)
    }

    /// Find the open session for an owner: the active session first, then the
    /// most recently opened, then any match.
    pub(crate) fn find_open_for_owner(&self, owner_key: &str) -> Option<SessionId> {
        let matches = |id: &SessionId| {
            self.slots
                .get(id)
                .is_some_and(|slot| slot.session.is_open && slot.session.owner_key == owner_key)
        };
        if let Some(active_id) = self.active_id.filter(|id| matches(id)) {
            return Some(active_id);
        }
        if let Some(id) = self.order.iter().rev().find(|id| matches(*id)) {
            return Some(*id);
        }
        self.slots.keys().find(|id| matches(*id)).copied()
    }

    /// Mark an owner as opening. Returns `false` if an open is already underway.
    pub(crate) fn begin_opening(&mut self, owner_key: &str) -> bool {
        self.opening.insert(owner_key.to_string())
    }

    pub(crate) fn finish_opening(&mut self, owner_key: &str) {
        self.opening.remove(owner_key);
    }

    pub(crate) fn insert(&mut self, slot: SessionSlot) {
        let id = slot.session.id;
        self.slots.insert(id, slot);
        self.order.push(id);
        self.active_id = Some(id);
    }

    pub(crate) fn get(&self, id: SessionId) -> Option<&SessionSlot> {
        self.slots.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: SessionId) -> Option<&mut SessionSlot> {
        self.slots.get_mut(&id)
    }

    /// Remove a session; the most recent remaining session becomes active.
    pub(crate) fn evict(&mut self, id: SessionId) -> Option<SessionSlot> {
        let slot = self.slots.remove(&id)?;
        self.order.retain(|candidate| *candidate != id);
        if self.active_id == Some(id) {
            self.active_id = self.order.last().copied();
        }
        Some(slot)
    }

    pub(crate) fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            sessions: self.slots.iter().map(|(id, slot)| (*id, slot.session.clone())).collect(),
            order: self.order.clone(),
            active_id: self.active_id,
        }
    }
}
