use serde_json::{json, Value};

use super::FilterVariant;

/// Passthrough filter for fields without a declared filter kind.
///
/// Holds one raw value and matches it exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdHocFilter;

fn value_to_raw(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => None,
        Value::String(raw) => Some(raw.clone()),
        other => Some(other.to_string()),
    }
}

impl FilterVariant for AdHocFilter {
    type Data = Option<String>;

    fn default_data(&self) -> Option<String> {
        None
    }

    fn normalize(&self, data: Option<String>) -> Option<String> {
        data.filter(|raw| !raw.is_empty())
    }

    fn data_to_string(&self, data: &Option<String>) -> String {
        data.clone().unwrap_or_default()
    }

    fn data_from_string(&self, value: &str) -> Option<String> {
        (!value.is_empty()).then(|| value.to_string())
    }

    fn data_from_value(&self, value: &Value) -> Option<Option<String>> {
        value_to_raw(value).map(Some)
    }

    fn to_backend_clause(&self, field: &str, data: &Option<String>) -> Value {
        match data {
            Some(raw) => json!({ "term": { field: raw } }),
            None => json!({ "match_all": {} }),
        }
    }

    fn data_from_backend_clause(&self, field: &str, clause: &Value) -> Option<Option<String>> {
        value_to_raw(clause.get("term")?.get(field)?).map(Some)
    }
}
