//! Trigger text for a committed selection, and the hand-off of session
//! outcomes to the hosting form field.

use lister_types::{OptionItem, OptionValue, OutcomeReason, SelectionValue, SessionOutcome};
use serde::{Deserialize, Serialize};

/// How a trigger summarizes its selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOptions {
    pub placeholder: String,
    /// Labels shown before collapsing the rest into "+N more".
    pub max_labels: usize,
    pub separator: String,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            placeholder: "Select…".to_string(),
            max_labels: 2,
            separator: ", ".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSummary {
    pub text: String,
    /// Labels of every selected value, in selection order.
    pub labels: Vec<String>,
    pub hidden_count: usize,
    pub is_empty: bool,
}

/// Label shown for an option.
pub fn option_label(option: &OptionItem) -> String {
    option.display_label()
}

/// Resolve labels for the selected values. Fetched options are consulted
/// first, then snapshots taken when the values were picked; a value found in
/// neither is shown as itself.
pub fn resolve_labels(value: &SelectionValue, options: &[OptionItem], snapshots: &[OptionItem]) -> Vec<String> {
    value
        .values()
        .map(|selected| {
            find(options, selected)
                .or_else(|| find(snapshots, selected))
                .map(option_label)
                .unwrap_or_else(|| selected.to_string())
        })
        .collect()
}

fn find<'a>(options: &'a [OptionItem], value: &OptionValue) -> Option<&'a OptionItem> {
    options.iter().find(|option| option.value == *value)
}

pub fn summarize_selection(
    value: Option<&SelectionValue>,
    options: &[OptionItem],
    snapshots: &[OptionItem],
    display: &DisplayOptions,
) -> TriggerSummary {
    let labels = value.map(|value| resolve_labels(value, options, snapshots)).unwrap_or_default();
    if labels.is_empty() {
        return TriggerSummary {
            text: display.placeholder.clone(),
            labels,
            hidden_count: 0,
            is_empty: true,
        };
    }

    let shown = display.max_labels.max(1).min(labels.len());
    let hidden_count = labels.len() - shown;
    let mut text = labels[..shown].join(&display.separator);
    if hidden_count > 0 {
        text.push_str(&format!(" +{hidden_count} more"));
    }
    TriggerSummary {
        text,
        labels,
        hidden_count,
        is_empty: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueAction {
    Apply,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChangeMeta {
    pub action: ValueAction,
    /// Snapshots of the applied options.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionItem>,
}

/// Detail passed alongside a value change to the hosting field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChangeDetail {
    /// Always `"variant"`: the change came from a picker.
    pub source: String,
    pub raw: Option<SelectionValue>,
    pub meta: ValueChangeMeta,
}

impl ValueChangeDetail {
    pub const SOURCE: &'static str = "variant";

    fn new(raw: Option<SelectionValue>, action: ValueAction, options: Vec<OptionItem>) -> Self {
        Self {
            source: Self::SOURCE.to_string(),
            raw,
            meta: ValueChangeMeta { action, options },
        }
    }
}

/// A form field that receives committed picker values.
pub trait FieldHost {
    fn on_value(&mut self, next: Option<SelectionValue>, detail: ValueChangeDetail);
}

/// Push an applied outcome into the field. Cancelled outcomes leave the
/// field untouched. Returns whether the field was updated.
pub fn commit_outcome(host: &mut dyn FieldHost, outcome: &SessionOutcome) -> bool {
    if outcome.reason != OutcomeReason::Apply {
        return false;
    }
    let options = outcome.details.as_ref().map(|details| details.options.clone()).unwrap_or_default();
    let detail = ValueChangeDetail::new(outcome.value.clone(), ValueAction::Apply, options);
    host.on_value(outcome.value.clone(), detail);
    true
}

/// Clear the field's committed value.
pub fn commit_clear(host: &mut dyn FieldHost) {
    host.on_value(None, ValueChangeDetail::new(None, ValueAction::Clear, Vec::new()));
}
