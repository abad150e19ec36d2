//! Serde helpers for model-supplied JSON arguments.
//!
//! Models send ids as numbers or strings and occasionally send limits as
//! strings. The `deserialize_with` helpers accept both; a value of the wrong
//! shape leaves the field unset instead of failing the whole struct.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Deserialize an argument struct. `null` counts as an empty object.
pub fn parse<T: DeserializeOwned>(params: &Value) -> serde_json::Result<T> {
    match params {
        Value::Null => serde_json::from_value(Value::Object(Map::new())),
        other => serde_json::from_value(other.clone()),
    }
}

fn int_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
        _ => None,
    }
}

/// Integer from a JSON number or a numeric string (`"12"`, `"#12"`).
pub fn int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(int_of(&Value::deserialize(deserializer)?))
}

/// Non-negative count; negative numbers become 0.
pub fn count<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(int_of(&Value::deserialize(deserializer)?).and_then(|n| usize::try_from(n.max(0)).ok()))
}

/// Trimmed, non-empty string. Numbers are accepted as their decimal text.
pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Args {
        #[serde(default, deserialize_with = "int")]
        id: Option<i64>,
        #[serde(default, deserialize_with = "count")]
        limit: Option<usize>,
        #[serde(default, deserialize_with = "text")]
        name: Option<String>,
    }

    #[test]
    fn test_int_accepts_strings_and_numbers() {
        let id = |v: Value| parse::<Args>(&json!({ "id": v })).unwrap().id;
        assert_eq!(id(json!(5)), Some(5));
        assert_eq!(id(json!("12")), Some(12));
        assert_eq!(id(json!("#7")), Some(7));
        assert_eq!(id(json!("x")), None);
        assert_eq!(id(json!(3.0)), Some(3));
        assert_eq!(id(json!(["nested"])), None);
    }

    #[test]
    fn test_text_and_count() {
        let args: Args = parse(&json!({"name": "  rust ", "limit": -3, "extra": true})).unwrap();
        assert_eq!(args.name.as_deref(), Some("rust"));
        assert_eq!(args.limit, Some(0));

        let blank: Args = parse(&json!({"name": "  ", "limit": "25"})).unwrap();
        assert_eq!(blank.name, None);
        assert_eq!(blank.limit, Some(25));
    }

    #[test]
    fn test_null_is_empty_and_scalars_are_rejected() {
        let args: Args = parse(&Value::Null).unwrap();
        assert!(args.id.is_none() && args.limit.is_none() && args.name.is_none());
        assert!(parse::<Args>(&json!("search rust")).is_err());
    }
}
