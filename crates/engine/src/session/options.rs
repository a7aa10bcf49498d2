use std::{fmt, sync::Arc};

use lister_types::{OptionItem, SelectionMode, SelectionValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where search text is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Every query is sent to the endpoint (debounced).
    #[default]
    Remote,
    /// Options fetched on open are filtered in memory by label or value.
    Local,
}

/// Whether the initial fetch may be answered from the response cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefreshMode {
    #[default]
    Cached,
    /// Always refetch when a session opens.
    OnOpen,
}

/// Actions a picker exposes to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickerPermissions {
    pub can_clear: bool,
    pub can_refresh: bool,
    pub can_search: bool,
}

impl Default for PickerPermissions {
    fn default() -> Self {
        Self {
            can_clear: true,
            can_refresh: true,
            can_search: true,
        }
    }
}

/// Host-provided option renderer.
#[derive(Clone)]
pub struct RenderOption(pub Arc<dyn Fn(&OptionItem) -> String + Send + Sync>);

impl RenderOption {
    pub fn new(render: impl Fn(&OptionItem) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(render))
    }

    pub fn render(&self, option: &OptionItem) -> String {
        (self.0)(option)
    }
}

impl fmt::Debug for RenderOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RenderOption(<fn>)")
    }
}

/// Options accepted by [`Lister::open`](crate::Lister::open).
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    pub mode: SelectionMode,
    /// Require an explicit apply. Always on for multiple selection.
    pub confirm: bool,
    pub default_value: Option<SelectionValue>,
    pub permissions: PickerPermissions,
    /// Identity of the field opening the picker. Sessions are reused per owner;
    /// without one every open creates a fresh session.
    pub owner_key: Option<String>,
    pub title: Option<String>,
    pub search_mode: SearchMode,
    pub initial_query: Option<String>,
    pub show_refresh: bool,
    pub refresh_mode: RefreshMode,
    /// Opaque description of filter controls, carried for the host UI.
    pub filters_spec: Option<Value>,
    pub render_option: Option<RenderOption>,
    pub search_target: Option<String>,
}

impl OpenOptions {
    pub fn single() -> Self {
        Self::default()
    }

    pub fn multiple() -> Self {
        Self {
            mode: SelectionMode::Multiple,
            confirm: true,
            ..Self::default()
        }
    }

    pub fn owner(mut self, owner_key: impl Into<String>) -> Self {
        self.owner_key = Some(owner_key.into());
        self
    }

    pub fn confirm(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn default_value(mut self, value: SelectionValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn search_mode(mut self, search_mode: SearchMode) -> Self {
        self.search_mode = search_mode;
        self
    }

    pub fn initial_query(mut self, query: impl Into<String>) -> Self {
        self.initial_query = Some(query.into());
        self
    }

    pub fn search_target(mut self, column: impl Into<String>) -> Self {
        self.search_target = Some(column.into());
        self
    }

    pub fn refresh_mode(mut self, refresh_mode: RefreshMode) -> Self {
        self.refresh_mode = refresh_mode;
        self
    }

    pub fn permissions(mut self, permissions: PickerPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn render_option(mut self, render: RenderOption) -> Self {
        self.render_option = Some(render);
        self
    }

    /// Confirmation actually in effect for these options.
    pub fn effective_confirm(&self) -> bool {
        self.confirm || self.mode == SelectionMode::Multiple
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_mode_always_confirms() {
        let options = OpenOptions {
            mode: SelectionMode::Multiple,
            confirm: false,
            ..OpenOptions::default()
        };
        assert!(options.effective_confirm());
        assert!(!OpenOptions::single().effective_confirm());
        assert!(OpenOptions::single().confirm(true).effective_confirm());
    }

    #[test]
    fn render_option_formats_items() {
        let render = RenderOption::new(|option| format!("<{}>", option.display_label()));
        assert_eq!(render.render(&OptionItem::new("a").with_label("Alpha")), "<Alpha>");
    }
}
