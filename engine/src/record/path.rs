//! Read-side path resolution over nested records.
//!
//! A dotted path descends through objects. A list met at an intermediate
//! segment fans out: the remaining path is resolved against every element
//! and the results come back as a list in element order.

use serde_json::Value;

use super::Record;

/// Resolve `segments` against `record`. Returns `None` when the path
/// does not lead to a value.
pub fn value_at_path(record: &Record, segments: &[&str]) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    let entry = record.get(*first)?;

    match entry {
        Value::Array(items) => {
            let mut result = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) => result.push(
                        value_at_path(map, rest).unwrap_or(Value::Null),
                    ),
                    other => result.push(other.clone()),
                }
            }
            Some(Value::Array(result))
        }
        Value::Object(map) => value_at_path(map, rest),
        leaf => {
            if rest.is_empty() {
                Some(leaf.clone())
            } else {
                None
            }
        }
    }
}

/// Split a dotted path into segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_plain_scalar() {
        let r = record(json!({"sku": "ABC", "qty": 3}));
        assert_eq!(value_at_path(&r, &["sku"]), Some(json!("ABC")));
        assert_eq!(value_at_path(&r, &["qty"]), Some(json!(3)));
        assert_eq!(value_at_path(&r, &["missing"]), None);
    }

    #[test]
    fn test_nested_object() {
        let r = record(json!({"seo": {"url": "a/b", "title": "t"}}));
        assert_eq!(value_at_path(&r, &["seo", "url"]), Some(json!("a/b")));
    }

    #[test]
    fn test_list_fan_out() {
        let r = record(json!({
            "options": [
                {"label": "Red", "price": 1},
                {"label": "Blue", "price": 2}
            ]
        }));
        assert_eq!(
            value_at_path(&r, &["options", "label"]),
            Some(json!(["Red", "Blue"]))
        );
        assert_eq!(
            value_at_path(&r, &["options", "price"]),
            Some(json!([1, 2]))
        );
    }

    #[test]
    fn test_scalar_list_passthrough() {
        let r = record(json!({"tags": ["a", "b"]}));
        // scalar elements come back as-is regardless of remaining path
        assert_eq!(value_at_path(&r, &["tags"]), Some(json!(["a", "b"])));
    }

    #[test]
    fn test_missing_branch_in_fan_out() {
        let r = record(json!({
            "options": [{"label": "Red"}, {"price": 2}]
        }));
        assert_eq!(
            value_at_path(&r, &["options", "label"]),
            Some(json!(["Red", null]))
        );
    }

    #[test]
    fn test_overlong_path_on_scalar() {
        let r = record(json!({"sku": "ABC"}));
        assert_eq!(value_at_path(&r, &["sku", "deeper"]), None);
    }
}
