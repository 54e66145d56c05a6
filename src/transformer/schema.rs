//! Tool input-schema sanitizer.
//!
//! OpenAI-compatible backends reject a handful of JSON-schema keys that
//! Anthropic clients routinely send. The sanitizer makes a defensive copy of
//! the schema with those keys removed, recursing through objects and arrays.

use serde_json::{Map, Value};

/// String `format` values the upstream accepts.
const ALLOWED_STRING_FORMATS: &[&str] = &["date-time", "enum"];

/// Recursively clean a tool input schema.
///
/// Rules, applied at every depth:
/// 1. `$schema` and `additionalProperties` keys are dropped.
/// 2. On objects whose `type` is `"string"`, a `format` outside
///    [`ALLOWED_STRING_FORMATS`] is dropped.
/// 3. Everything else is copied through unchanged, preserving key order.
///
/// The function is pure and idempotent.
pub fn sanitize_schema(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let is_string_type = map.get("type").and_then(|t| t.as_str()) == Some("string");

            let mut cleaned = Map::new();
            for (key, val) in map {
                if key == "$schema" || key == "additionalProperties" {
                    continue;
                }
                if key == "format" && is_string_type {
                    let keep = val
                        .as_str()
                        .map(|f| ALLOWED_STRING_FORMATS.contains(&f))
                        .unwrap_or(false);
                    if !keep {
                        continue;
                    }
                }
                cleaned.insert(key.clone(), sanitize_schema(val));
            }
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}
