use serde_json::Value;

use crate::limits::{MAX_LIST_ITEMS, MAX_LIST_ITEM_LEN};

/// Coerce a list-valued listing field into trimmed, non-empty strings.
///
/// Accepts a JSON array, a string holding a JSON array, or a comma-separated
/// string. Anything else is an empty list. Items longer than
/// `MAX_LIST_ITEM_LEN` are dropped and at most `MAX_LIST_ITEMS` are kept.
pub fn normalize_list(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(item_text).collect(),
        Value::String(s) => {
            let s = s.trim();
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) if s.starts_with('[') => {
                    items.iter().filter_map(item_text).collect()
                }
                _ => s.split(',').map(str::to_string).collect(),
            }
        }
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty() && item.len() <= MAX_LIST_ITEM_LEN)
        .take(MAX_LIST_ITEMS)
        .collect()
}

fn item_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_every_shape() {
        let expected = vec!["wifi".to_string(), "pool".to_string()];
        assert_eq!(normalize_list(&json!(["wifi", " pool "])), expected);
        assert_eq!(normalize_list(&json!("[\"wifi\",\"pool\"]")), expected);
        assert_eq!(normalize_list(&json!("wifi, pool,")), expected);
        assert_eq!(normalize_list(&json!("wifi")), vec!["wifi".to_string()]);
    }

    #[test]
    fn drops_junk() {
        assert!(normalize_list(&Value::Null).is_empty());
        assert!(normalize_list(&json!({"a": 1})).is_empty());
        assert!(normalize_list(&json!("  ")).is_empty());
        assert_eq!(normalize_list(&json!(["", null, 3])), vec!["3".to_string()]);
    }

    #[test]
    fn enforces_limits() {
        let long = "x".repeat(MAX_LIST_ITEM_LEN + 1);
        assert!(normalize_list(&json!([long])).is_empty());
        let many: Vec<String> = (0..MAX_LIST_ITEMS + 5).map(|i| format!("item{i}")).collect();
        assert_eq!(normalize_list(&json!(many)).len(), MAX_LIST_ITEMS);
    }
}
