//! Option-value key inference for standalone inline definitions.
//!
//! When a caller points a picker at an endpoint without naming the identity
//! column, the first rows of the response are inspected to pick one. The
//! choice is deterministic: common identity names are tried in a fixed order,
//! then every key is scored, and an unconvincing result falls back to the
//! configured default instead of guessing.

use std::collections::HashSet;

use indexmap::IndexSet;
use serde_json::Value;
use tracing::debug;

/// Identity names tried, in order, before scoring arbitrary keys.
pub const COMMON_IDENTITY_KEYS: &[&str] = &["id", "value", "key", "uuid", "slug", "_id", "code"];

pub const DEFAULT_SAMPLE_SIZE: usize = 10;

const MIN_PRESENCE: f64 = 0.9;
const MIN_UNIQUENESS: f64 = 0.95;

/// Result of inference: the chosen key and whether it was actually inferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredKey {
    pub key: String,
    /// `false` when `key` is the fallback.
    pub inferred: bool,
}

impl InferredKey {
    fn fallback(key: &str) -> Self {
        Self {
            key: key.to_string(),
            inferred: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct KeyStats {
    presence: f64,
    uniqueness: f64,
}

impl KeyStats {
    fn qualifies(&self) -> bool {
        self.presence >= MIN_PRESENCE && self.uniqueness >= MIN_UNIQUENESS
    }
}

/// Infer the option value key from the first [`DEFAULT_SAMPLE_SIZE`] rows.
pub fn infer_option_value_key(rows: &[Value], fallback: &str) -> InferredKey {
    infer_option_value_key_with(rows, fallback, DEFAULT_SAMPLE_SIZE)
}

/// Infer the option value key from the first `sample_size` rows.
pub fn infer_option_value_key_with(rows: &[Value], fallback: &str, sample_size: usize) -> InferredKey {
    let sample = &rows[..rows.len().min(sample_size.max(1))];
    if sample.is_empty() {
        return InferredKey::fallback(fallback);
    }

    for candidate in COMMON_IDENTITY_KEYS {
        if key_stats(sample, candidate).qualifies() {
            debug!(key = %candidate, sample_size = sample.len(), "option value key matched common identity name");
            return InferredKey {
                key: (*candidate).to_string(),
                inferred: true,
            };
        }
    }

    let mut keys: IndexSet<&str> = IndexSet::new();
    for row in sample {
        if let Value::Object(map) = row {
            keys.extend(map.keys().map(String::as_str));
        }
    }

    let mut best: Option<(&str, KeyStats, f64)> = None;
    for key in keys {
        let stats = key_stats(sample, key);
        let score = stats.presence * 4.0 + stats.uniqueness * 10.0 + name_bonus(key);
        // Strict comparison keeps the first-seen key on ties.
        if best.is_none_or(|(_, _, best_score)| score > best_score) {
            best = Some((key, stats, score));
        }
    }

    match best {
        Some((key, stats, score)) if stats.qualifies() => {
            debug!(key = %key, score, "option value key inferred by scoring");
            InferredKey {
                key: key.to_string(),
                inferred: true,
            }
        }
        _ => {
            debug!(fallback = %fallback, "no convincing option value key; using fallback");
            InferredKey::fallback(fallback)
        }
    }
}

fn key_stats(sample: &[Value], key: &str) -> KeyStats {
    let mut present = 0usize;
    let mut distinct: HashSet<String> = HashSet::new();
    for row in sample {
        let identity = match row.get(key) {
            Some(Value::String(text)) if !text.is_empty() => format!("s:{text}"),
            Some(Value::Number(number)) => format!("n:{number}"),
            _ => continue,
        };
        present += 1;
        distinct.insert(identity);
    }

    let presence = present as f64 / sample.len() as f64;
    let uniqueness = if present == 0 { 0.0 } else { distinct.len() as f64 / present as f64 };
    KeyStats { presence, uniqueness }
}

fn name_bonus(key: &str) -> f64 {
    let lower = key.to_ascii_lowercase();
    let mut bonus = 0.0;
    if lower == "id" || lower.ends_with("_id") || key.ends_with("Id") {
        bonus += 3.0;
    } else if ["uuid", "slug", "code", "key"].iter().any(|needle| lower.contains(needle)) {
        bonus += 2.0;
    } else if lower.contains("id") {
        bonus += 1.0;
    }
    if ["name", "title", "label"].iter().any(|needle| lower.contains(needle)) {
        bonus -= 3.0;
    }
    bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_sample_returns_fallback() {
        assert_eq!(infer_option_value_key(&[], "id"), InferredKey::fallback("id"));
    }

    #[test]
    fn id_wins_over_name() {
        let rows = vec![
            json!({"id": 1, "name": "a"}),
            json!({"id": 2, "name": "b"}),
            json!({"id": 3, "name": "c"}),
        ];
        let inferred = infer_option_value_key(&rows, "fallback");
        assert_eq!(inferred.key, "id");
        assert!(inferred.inferred);
    }

    #[test]
    fn common_names_are_tried_in_order() {
        let rows = vec![json!({"slug": "a", "value": 1}), json!({"slug": "b", "value": 2})];
        assert_eq!(infer_option_value_key(&rows, "id").key, "value");
    }

    #[test]
    fn scoring_prefers_identity_like_names() {
        let rows = vec![
            json!({"userId": "u1", "displayName": "Ann"}),
            json!({"userId": "u2", "displayName": "Bob"}),
            json!({"userId": "u3", "displayName": "Cid"}),
        ];
        let inferred = infer_option_value_key(&rows, "id");
        assert_eq!(inferred, InferredKey { key: "userId".into(), inferred: true });
    }

    #[test]
    fn duplicate_values_fall_back() {
        let rows = vec![json!({"kind": "a"}), json!({"kind": "a"}), json!({"kind": "b"})];
        assert_eq!(infer_option_value_key(&rows, "id"), InferredKey::fallback("id"));
    }

    #[test]
    fn sparse_identity_is_rejected() {
        let rows = vec![json!({"id": 1}), json!({"id": 2}), json!({"other": true}), json!({"id": ""})];
        assert!(!infer_option_value_key(&rows, "id").inferred);
    }

    #[test]
    fn only_the_sample_is_inspected() {
        let mut rows: Vec<Value> = (0..10).map(|index| json!({"ref": format!("r{index}")})).collect();
        rows.push(json!({"ref": "r0"}));
        let inferred = infer_option_value_key(&rows, "id");
        assert_eq!(inferred.key, "ref");
        assert!(!infer_option_value_key_with(&rows, "id", 11).inferred);
    }

    #[test]
    fn inference_is_deterministic() {
        let rows = vec![
            json!({"alpha": "x1", "beta": "y1"}),
            json!({"alpha": "x2", "beta": "y2"}),
        ];
        let first = infer_option_value_key(&rows, "id");
        for _ in 0..5 {
            assert_eq!(infer_option_value_key(&rows, "id"), first);
        }
        assert_eq!(first.key, "alpha");
    }
}
