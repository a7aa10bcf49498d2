//! Turning response payloads into options.

use lister_types::{Definition, FieldSpec, MappingContext, OptionItem, OptionValue, Selector};
use lister_util::{http::extract_collection_items, value_at_path};
use serde_json::Value;
use tracing::debug;

use crate::error::ListerError;

/// Resolve a mapping field against a raw row. `null` counts as absent.
pub fn pick(row: &Value, spec: &FieldSpec, context: &MappingContext) -> Option<Value> {
    let picked = match spec {
        FieldSpec::Key(key) => value_at_path(row, key).cloned(),
        FieldSpec::Fn(func) => func(row, context),
    };
    picked.filter(|value| !value.is_null())
}

/// Extract the raw row array from a response payload.
///
/// Without a selector the payload itself is used when it is an array;
/// otherwise well-known wrapper keys (`items`, `results`, `data`, ...) are
/// tried. An empty response body yields no rows.
pub fn select_rows(definition: &Definition, payload: &Value) -> Result<Vec<Value>, ListerError> {
    if payload.is_null() {
        return Ok(Vec::new());
    }
    let rows = match &definition.selector {
        Some(Selector::Path(path)) => extract_collection_items(payload, Some(path)),
        Some(Selector::Fn(select)) => select(payload),
        None => extract_collection_items(payload, None),
    };
    rows.ok_or_else(|| ListerError::Selector {
        definition_id: definition.id.clone(),
    })
}

/// Map raw rows into options, dropping rows without a scalar value.
///
/// `value_spec` is the effective value field: the definition's own
/// `option_value`, or the inferred key for standalone definitions.
pub fn map_rows(definition: &Definition, value_spec: &FieldSpec, rows: &[Value], query: &str) -> Vec<OptionItem> {
    let mapping = &definition.mapping;
    let mut options = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let context = MappingContext {
            index,
            definition_id: definition.id.clone(),
            query: query.to_string(),
        };
        let Some(value) = pick(row, value_spec, &context).as_ref().and_then(OptionValue::from_json) else {
            continue;
        };
        let text = |spec: &Option<FieldSpec>| spec.as_ref().and_then(|spec| pick(row, spec, &context)).and_then(display_text);

        options.push(OptionItem {
            value,
            label: text(&mapping.option_label),
            icon: text(&mapping.option_icon),
            description: text(&mapping.option_description),
            disabled: mapping
                .option_disabled
                .as_ref()
                .and_then(|spec| pick(row, spec, &context))
                .is_some_and(|value| truthy(&value)),
            group: text(&mapping.option_group),
            meta: mapping.option_meta.as_ref().and_then(|spec| pick(row, spec, &context)),
        });
    }

    let dropped = rows.len() - options.len();
    if dropped > 0 {
        debug!(definition_id = %definition.id, dropped, "dropped rows without option value");
    }
    options
}

fn display_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lister_types::Mapping;
    use serde_json::json;

    #[test]
    fn rows_without_value_are_dropped() {
        let definition = Definition::new("/items", "id");
        let rows = vec![json!({"id": 1}), json!({"name": "no-id"})];
        let options = map_rows(&definition, &FieldSpec::key("id"), &rows, "");
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].value, OptionValue::from(1));
    }

    #[test]
    fn non_scalar_values_are_dropped() {
        let definition = Definition::new("/items", "id");
        let rows = vec![json!({"id": {"nested": 1}}), json!({"id": null}), json!({"id": "ok"})];
        let options = map_rows(&definition, &FieldSpec::key("id"), &rows, "");
        assert_eq!(options, vec![OptionItem::new("ok")]);
    }

    #[test]
    fn maps_every_field_with_paths_and_functions() {
        let mut definition = Definition::new("/users", "id");
        definition.mapping = Mapping {
            option_value: Some(FieldSpec::key("id")),
            option_label: Some(FieldSpec::key("profile.name")),
            option_icon: Some(FieldSpec::key("avatar")),
            option_description: Some(FieldSpec::func(|row, context| {
                Some(json!(format!("#{} {}", context.index, row["email"].as_str()?)))
            })),
            option_disabled: Some(FieldSpec::key("locked")),
            option_group: Some(FieldSpec::key("team")),
            option_meta: Some(FieldSpec::key("profile")),
        };
        let rows = vec![json!({
            "id": "u1",
            "email": "ann@example.com",
            "avatar": "ann.png",
            "locked": "yes",
            "team": 7,
            "profile": {"name": "Ann"}
        })];

        let option = map_rows(&definition, &FieldSpec::key("id"), &rows, "an").remove(0);
        assert_eq!(option.label.as_deref(), Some("Ann"));
        assert_eq!(option.icon.as_deref(), Some("ann.png"));
        assert_eq!(option.description.as_deref(), Some("#0 ann@example.com"));
        assert!(option.disabled);
        assert_eq!(option.group.as_deref(), Some("7"));
        assert_eq!(option.meta, Some(json!({"name": "Ann"})));
    }

    #[test]
    fn selector_paths_and_heuristics() {
        let payload = json!({"data": {"items": [{"id": 1}]}});
        let with_path = Definition::new("/x", "id").with_selector(Selector::Path("data.items".into()));
        assert_eq!(select_rows(&with_path, &payload).unwrap(), vec![json!({"id": 1})]);

        let wrapped = json!({"results": [{"id": 2}], "total": 1});
        assert_eq!(select_rows(&Definition::new("/x", "id"), &wrapped).unwrap(), vec![json!({"id": 2})]);

        let with_fn = Definition::new("/x", "id").with_selector(Selector::func(|payload| {
            payload.get("page").and_then(|page| page.get("rows")).and_then(Value::as_array).cloned()
        }));
        assert_eq!(select_rows(&with_fn, &json!({"page": {"rows": [1, 2]}})).unwrap().len(), 2);
    }

    #[test]
    fn unusable_payloads() {
        let definition = Definition::new("/x", "id");
        assert!(select_rows(&definition, &Value::Null).unwrap().is_empty());
        assert_eq!(
            select_rows(&definition, &json!({"count": 3})),
            Err(ListerError::Selector { definition_id: "/x".into() })
        );
    }
}
