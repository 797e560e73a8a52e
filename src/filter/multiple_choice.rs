use serde_json::{json, Value};

use super::{Filter, FilterVariant};
use crate::error::StateError;

/// Set-membership filter over string values.
///
/// Encoded as a comma-joined list with each element percent-encoded, so
/// elements may themselves contain commas or spaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MultipleChoiceFilter;

fn value_to_choice(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => Some(raw.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

impl FilterVariant for MultipleChoiceFilter {
    type Data = Vec<String>;

    fn default_data(&self) -> Vec<String> {
        Vec::new()
    }

    /// Selection is a set: sorted, deduplicated, no empty choices.
    fn normalize(&self, mut data: Vec<String>) -> Vec<String> {
        data.retain(|choice| !choice.is_empty());
        data.sort();
        data.dedup();
        data
    }

    fn data_to_string(&self, data: &Vec<String>) -> String {
        data.iter()
            .map(|choice| urlencoding::encode(choice).into_owned())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn data_from_string(&self, value: &str) -> Vec<String> {
        value
            .split(',')
            .filter(|part| !part.is_empty())
            .map(|part| match urlencoding::decode(part) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => {
                    tracing::warn!(value = %part, "choice is not valid percent-encoding");
                    part.to_string()
                }
            })
            .collect()
    }

    fn data_from_value(&self, value: &Value) -> Option<Vec<String>> {
        match value {
            Value::Array(values) => {
                let choices: Vec<String> = values.iter().filter_map(value_to_choice).collect();
                (!choices.is_empty()).then_some(choices)
            }
            other => value_to_choice(other).map(|choice| vec![choice]),
        }
    }

    fn to_backend_clause(&self, field: &str, data: &Vec<String>) -> Value {
        json!({ "terms": { field: data } })
    }

    fn data_from_backend_clause(&self, field: &str, clause: &Value) -> Option<Vec<String>> {
        let values = clause.get("terms")?.get(field)?.as_array()?;
        Some(values.iter().filter_map(value_to_choice).collect())
    }
}

impl Filter<MultipleChoiceFilter> {
    /// Add `choice` if absent, remove it if present.
    pub fn toggle_choice(&self, choice: &str) -> Result<(), StateError> {
        let mut choices = self.current_data();
        match choices.iter().position(|existing| existing == choice) {
            Some(index) => {
                choices.remove(index);
            }
            None => choices.push(choice.to_string()),
        }
        self.set(choices)
    }

    pub fn is_selected(&self, choice: &str) -> bool {
        self.is_active() && self.current_data().iter().any(|existing| existing == choice)
    }
}
