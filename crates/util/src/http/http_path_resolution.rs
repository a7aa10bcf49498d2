use serde_json::{Map, Value};

/// Fill `{placeholder}` segments of an endpoint template from request parameters.
///
/// Parameters consumed by the path are removed from the returned map so they
/// are not sent a second time as query or body fields. Placeholders with no
/// matching parameter stay in the path unchanged.
///
/// # Examples
/// ```rust
/// use lister_util::http::build_path;
/// use serde_json::{Map, json};
///
/// let mut params = Map::new();
/// params.insert("org".into(), json!("acme corp"));
/// params.insert("active".into(), json!(true));
///
/// let (path, rest) = build_path("/orgs/{org}/members", params);
/// assert_eq!(path, "/orgs/acme%20corp/members");
/// assert_eq!(rest.len(), 1);
/// assert!(rest.contains_key("active"));
/// ```
pub fn build_path(template: &str, params: Map<String, Value>) -> (String, Map<String, Value>) {
    if !template.contains('{') {
        return (template.to_string(), params);
    }

    let mut path = template.to_string();
    let mut remaining = Map::new();
    for (key, value) in params {
        let needle = format!("{{{}}}", key);
        if !path.contains(&needle) {
            remaining.insert(key, value);
            continue;
        }
        let text = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        path = path.replace(&needle, &encode_path_placeholder_value(&text));
    }
    (path, remaining)
}

/// Percent-encodes a path placeholder value while preserving RFC3986 unreserved bytes.
///
/// Unreserved bytes (`A-Z`, `a-z`, `0-9`, `-`, `.`, `_`, `~`) are emitted as-is.
/// All other bytes are percent-encoded using uppercase hex.
fn encode_path_placeholder_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if is_unreserved_path_byte(byte) {
            encoded.push(byte as char);
        } else {
            encoded.push('%');
            encoded.push(to_upper_hex((byte >> 4) & 0x0f));
            encoded.push(to_upper_hex(byte & 0x0f));
        }
    }
    encoded
}

fn is_unreserved_path_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

fn to_upper_hex(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        _ => (b'A' + (nibble - 10)) as char,
    }
}

#[cfg(test)]
mod tests {
    use super::build_path;
    use serde_json::{Map, Value, json};

    #[test]
    fn build_path_encodes_reserved_bytes_for_placeholder_values() {
        let mut params = Map::new();
        params.insert("project".to_string(), Value::String("team/app name".to_string()));

        let (path, rest) = build_path("/v1/projects/{project}/users", params);
        assert_eq!(path, "/v1/projects/team%2Fapp%20name/users");
        assert!(rest.is_empty());
    }

    #[test]
    fn build_path_leaves_unknown_placeholders_and_plain_templates_alone() {
        let mut params = Map::new();
        params.insert("limit".to_string(), json!(10));

        let (path, rest) = build_path("/v1/{missing}/users", params.clone());
        assert_eq!(path, "/v1/{missing}/users");
        assert_eq!(rest, params);

        let (plain, untouched) = build_path("/users", params.clone());
        assert_eq!(plain, "/users");
        assert_eq!(untouched, params);
    }
}
