use serde_json::{json, Value};

use super::FilterVariant;

/// Tri-state boolean filter: `Some(true)`, `Some(false)` or unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BooleanFilter;

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

impl FilterVariant for BooleanFilter {
    type Data = Option<bool>;

    fn default_data(&self) -> Option<bool> {
        None
    }

    fn data_to_string(&self, data: &Option<bool>) -> String {
        data.map(|flag| flag.to_string()).unwrap_or_default()
    }

    fn data_from_string(&self, value: &str) -> Option<bool> {
        let flag = parse_flag(value);
        if flag.is_none() && !value.is_empty() {
            tracing::warn!(value = %value, "malformed boolean filter parameter");
        }
        flag
    }

    fn data_from_value(&self, value: &Value) -> Option<Option<bool>> {
        match value {
            Value::Bool(flag) => Some(Some(*flag)),
            Value::String(raw) => parse_flag(raw).map(Some),
            _ => None,
        }
    }

    fn to_backend_clause(&self, field: &str, data: &Option<bool>) -> Value {
        match data {
            Some(flag) => json!({ "term": { field: flag } }),
            None => json!({ "match_all": {} }),
        }
    }

    fn data_from_backend_clause(&self, field: &str, clause: &Value) -> Option<Option<bool>> {
        clause.get("term")?.get(field)?.as_bool().map(Some)
    }
}
