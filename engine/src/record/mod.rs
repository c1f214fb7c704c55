//! Nested record representation and scalar conversions.
//!
//! A record is a `serde_json::Map<String, Value>`: values are scalars,
//! nested objects, or lists. List elements at a given path are either all
//! scalars or all objects, never mixed.

use serde_json::{Map, Number, Value};

pub mod path;

/// One decoded logical entity.
pub type Record = Map<String, Value>;

/// Scalar type hints a column header may carry in `<...>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    Int,
    Float,
    Bool,
    Str,
}

impl TypeHint {
    /// Parse the text between `<` and `>` in a column header.
    /// Unknown hints fall back to best-effort inference (`None`).
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "int" | "integer" => Some(TypeHint::Int),
            "float" | "decimal" => Some(TypeHint::Float),
            "bool" | "boolean" => Some(TypeHint::Bool),
            "string" | "str" | "text" => Some(TypeHint::Str),
            _ => None,
        }
    }
}

/// Best-effort conversion of a raw cell into a typed scalar:
/// bool literal, then integer, then float, else string.
pub fn infer_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

/// Convert a raw cell using an explicit type hint. A value that does not
/// parse under its hint stays a string rather than turning into a null.
pub fn coerce_scalar(raw: &str, hint: TypeHint) -> Value {
    match hint {
        TypeHint::Int => raw
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        TypeHint::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        TypeHint::Bool => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Value::Bool(true),
            "false" | "0" | "no" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        TypeHint::Str => Value::String(raw.to_string()),
    }
}

/// Render a scalar back to its CSV cell form. Nulls render blank;
/// containers should not reach a leaf cell but degrade to JSON text.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Render any value for display in arguments/exchange lookups.
pub fn value_to_string(value: &Value) -> String {
    scalar_to_string(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_scalar() {
        assert_eq!(infer_scalar("42"), json!(42));
        assert_eq!(infer_scalar("4.5"), json!(4.5));
        assert_eq!(infer_scalar("true"), json!(true));
        assert_eq!(infer_scalar("posty"), json!("posty"));
        // sku-like values must stay strings
        assert_eq!(infer_scalar("T-123"), json!("T-123"));
    }

    #[test]
    fn test_coerce_with_hint() {
        assert_eq!(coerce_scalar("7", TypeHint::Int), json!(7));
        assert_eq!(coerce_scalar("7", TypeHint::Str), json!("7"));
        assert_eq!(coerce_scalar("yes", TypeHint::Bool), json!(true));
        assert_eq!(coerce_scalar("1.25", TypeHint::Float), json!(1.25));
    }

    #[test]
    fn test_coerce_failure_keeps_string() {
        assert_eq!(coerce_scalar("n/a", TypeHint::Int), json!("n/a"));
        assert_eq!(coerce_scalar("maybe", TypeHint::Bool), json!("maybe"));
    }

    #[test]
    fn test_scalar_round_trip() {
        for raw in ["12", "3.5", "true", "hello"] {
            let typed = infer_scalar(raw);
            assert_eq!(scalar_to_string(&typed), raw);
        }
    }

    #[test]
    fn test_type_hint_parse() {
        assert_eq!(TypeHint::parse("int"), Some(TypeHint::Int));
        assert_eq!(TypeHint::parse(" Float "), Some(TypeHint::Float));
        assert_eq!(TypeHint::parse("datetime"), None);
    }
}
