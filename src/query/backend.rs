//! Backend search payloads.
//!
//! Shapes follow the Elasticsearch query DSL: a `bool` query whose `must`
//! is a lenient `simple_query_string` (or `match_all`) and whose `filter`
//! holds one `term`/`terms`/`range` clause per active filter.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};

use super::{Sort, SortDirection};

pub fn match_all() -> Value {
    json!({ "match_all": {} })
}

pub fn simple_query_string(text: &str, fields: Option<&BTreeSet<String>>) -> Value {
    let mut clause = Map::new();
    clause.insert("query".into(), json!(text));
    clause.insert("lenient".into(), json!(true));
    if let Some(fields) = fields.filter(|fields| !fields.is_empty()) {
        clause.insert("fields".into(), json!(fields));
    }
    json!({ "simple_query_string": clause })
}

/// `match_all` when there is neither text nor a filter clause.
pub fn build_query(text: &str, fields: Option<&BTreeSet<String>>, filters: Vec<Value>) -> Value {
    let text = text.trim();
    if text.is_empty() && filters.is_empty() {
        return match_all();
    }
    let must = if text.is_empty() {
        match_all()
    } else {
        simple_query_string(text, fields)
    };
    json!({ "bool": { "must": must, "filter": filters } })
}

pub fn build_sort(sort: &Sort) -> Value {
    let order = match sort.direction {
        SortDirection::Ascending => "asc",
        SortDirection::Descending => "desc",
    };
    json!([{ sort.field.as_str(): { "order": order } }])
}

pub fn build_highlight(fragment_size: u32) -> Value {
    json!({ "fields": { "*": {} }, "fragment_size": fragment_size })
}

/// The field a `term`, `terms` or `range` clause targets.
pub fn clause_field(clause: &Value) -> Option<&str> {
    let (_, body) = clause.as_object()?.iter().next()?;
    body.as_object()?.keys().next().map(String::as_str)
}

/// Pieces recovered from a previously built backend query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedQuery {
    pub text: String,
    pub fields: Option<BTreeSet<String>>,
    pub clauses: Vec<Value>,
}

impl SavedQuery {
    /// Total: unknown shapes yield an empty query.
    pub fn parse(query: &Value) -> SavedQuery {
        let mut saved = SavedQuery::default();
        if let Some(body) = query.get("bool") {
            for must in one_or_many(body.get("must")) {
                saved.absorb_text(must);
            }
            saved.clauses = one_or_many(body.get("filter")).into_iter().cloned().collect();
        } else {
            saved.absorb_text(query);
        }
        saved
    }

    fn absorb_text(&mut self, clause: &Value) {
        let Some(body) = clause.get("simple_query_string") else {
            return;
        };
        if let Some(text) = body.get("query").and_then(Value::as_str) {
            self.text = text.to_string();
        }
        if let Some(fields) = body.get("fields").and_then(Value::as_array) {
            let fields: BTreeSet<String> = fields
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            self.fields = (!fields.is_empty()).then_some(fields);
        }
    }
}

fn one_or_many(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None => Vec::new(),
        Some(Value::Array(values)) => values.iter().collect(),
        Some(value) => vec![value],
    }
}
