//! Shared type definitions for the Lister picker engine.
//!
//! Everything in this crate is plain data: definitions describing a remote
//! list source, the options derived from its rows, the selection values a
//! picker session works with, and the outcome a session settles with.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

pub mod definition;
pub mod document;
pub mod request;

pub use definition::{
    BuildRequest, Definition, DefinitionPatch, FieldSpec, Mapping, MappingContext, MappingFn, RequestBuilderFn, SearchSpec, Selector, SelectorFn,
    Source,
};
pub use document::{DefinitionDocument, DefinitionsFile, MappingDocument};
pub use request::{FetchQuery, ListRequest};

/// Identity of a single option.
///
/// Only scalars qualify: strings and numbers. Anything else returned by a
/// mapping is treated as "no value" and the row is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    String(String),
    Number(Number),
}

impl OptionValue {
    /// Convert a JSON value into an option identity when it is a scalar.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self::String(text.clone())),
            Value::Number(number) => Some(Self::Number(number.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::String(text) => Value::String(text.clone()),
            Self::Number(number) => Value::Number(number.clone()),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

/// A normalized selectable entry derived from one raw remote row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub value: OptionValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl OptionItem {
    /// Create an option carrying only its identity.
    pub fn new(value: impl Into<OptionValue>) -> Self {
        Self {
            value: value.into(),
            label: None,
            icon: None,
            description: None,
            disabled: false,
            group: None,
            meta: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label shown to users; falls back to the identity when unmapped.
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.value.to_string())
    }
}

/// How many options a picker session may hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
}

/// The selection a session is working on, or a caller has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectionValue {
    Multiple(Vec<OptionValue>),
    Single(Option<OptionValue>),
}

impl SelectionValue {
    /// The empty selection for a mode.
    pub fn empty(mode: SelectionMode) -> Self {
        match mode {
            SelectionMode::Single => Self::Single(None),
            SelectionMode::Multiple => Self::Multiple(Vec::new()),
        }
    }

    /// Reshape a value to fit a mode: a single value becomes a one-item list
    /// and a list keeps only its first entry when a single value is needed.
    pub fn conform_to(self, mode: SelectionMode) -> Self {
        match (self, mode) {
            (Self::Single(value), SelectionMode::Multiple) => Self::Multiple(value.into_iter().collect()),
            (Self::Multiple(values), SelectionMode::Single) => Self::Single(values.into_iter().next()),
            (value, _) => value,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(value) => value.is_none(),
            Self::Multiple(values) => values.is_empty(),
        }
    }

    pub fn contains(&self, candidate: &OptionValue) -> bool {
        self.values().any(|value| value == candidate)
    }

    pub fn values(&self) -> impl Iterator<Item = &OptionValue> {
        let values: &[OptionValue] = match self {
            Self::Single(Some(value)) => std::slice::from_ref(value),
            Self::Single(None) => &[],
            Self::Multiple(values) => values.as_slice(),
        };
        values.iter()
    }

    /// Toggle `candidate` in or out of the selection.
    ///
    /// Single selections replace the current value (selecting the current value
    /// again keeps it selected). Returns `true` when the value is selected after
    /// the call.
    pub fn toggle(&mut self, candidate: OptionValue) -> bool {
        match self {
            Self::Single(current) => {
                *current = Some(candidate);
                true
            }
            Self::Multiple(values) => {
                if let Some(position) = values.iter().position(|value| *value == candidate) {
                    values.remove(position);
                    false
                } else {
                    values.push(candidate);
                    true
                }
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Single(value) => value.as_ref().map(OptionValue::to_json).unwrap_or(Value::Null),
            Self::Multiple(values) => Value::Array(values.iter().map(OptionValue::to_json).collect()),
        }
    }
}

/// Why a session stopped being open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeReason {
    Apply,
    Cancel,
}

/// Snapshot data attached to an applied outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDetails {
    /// Snapshots of the options that make up the applied value.
    pub options: Vec<OptionItem>,
}

/// What an open picker session settles with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub reason: OutcomeReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<SelectionValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<OutcomeDetails>,
}

impl SessionOutcome {
    pub fn apply(value: SelectionValue, options: Vec<OptionItem>) -> Self {
        Self {
            reason: OutcomeReason::Apply,
            value: Some(value),
            details: Some(OutcomeDetails { options }),
        }
    }

    pub fn cancel() -> Self {
        Self {
            reason: OutcomeReason::Cancel,
            value: None,
            details: None,
        }
    }

    pub fn is_apply(&self) -> bool {
        self.reason == OutcomeReason::Apply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn option_value_accepts_only_scalars() {
        assert_eq!(OptionValue::from_json(&json!("a")), Some(OptionValue::from("a")));
        assert_eq!(OptionValue::from_json(&json!(7)), Some(OptionValue::from(7)));
        assert!(OptionValue::from_json(&json!(null)).is_none());
        assert!(OptionValue::from_json(&json!(true)).is_none());
        assert!(OptionValue::from_json(&json!({"id": 1})).is_none());
    }

    #[test]
    fn multiple_toggle_adds_then_removes() {
        let mut value = SelectionValue::empty(SelectionMode::Multiple);
        assert!(value.toggle("a".into()));
        assert!(value.toggle("b".into()));
        assert!(!value.toggle("a".into()));
        assert_eq!(value, SelectionValue::Multiple(vec!["b".into()]));
    }

    #[test]
    fn single_toggle_replaces_value() {
        let mut value = SelectionValue::empty(SelectionMode::Single);
        value.toggle("a".into());
        value.toggle("b".into());
        assert_eq!(value, SelectionValue::Single(Some("b".into())));
        assert!(value.contains(&"b".into()));
    }

    #[test]
    fn conform_to_reshapes_between_modes() {
        let single = SelectionValue::Single(Some("a".into()));
        assert_eq!(single.conform_to(SelectionMode::Multiple), SelectionValue::Multiple(vec!["a".into()]));

        let many = SelectionValue::Multiple(vec!["a".into(), "b".into()]);
        assert_eq!(many.conform_to(SelectionMode::Single), SelectionValue::Single(Some("a".into())));
    }

    #[test]
    fn selection_value_serializes_as_plain_json() {
        let value = SelectionValue::Multiple(vec!["a".into(), OptionValue::from(2)]);
        assert_eq!(value.to_json(), json!(["a", 2]));
        assert_eq!(SelectionValue::Single(None).to_json(), Value::Null);
    }
}
