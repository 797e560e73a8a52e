use std::cell::RefCell;
use std::rc::Rc;

use chrono::NaiveDate;
use synced_search::{Capabilities, MemoryParamStore, Query, QueryUpdate, SearchConfig};
use tracing_subscriber::EnvFilter;

const CATALOG: &str = r#"{
    "fields": [
        {"id": "date", "label": "Date", "filter": {"type": "date", "lower": "1800-01-01", "upper": "1899-12-31"}},
        {"id": "language", "label": "Language", "filter": {"type": "multiple_choice"}},
        {"id": "pages", "filter": {"type": "range", "lower": 1, "upper": 900}},
        {"id": "digitized", "filter": {"type": "boolean"}},
        {"id": "author"}
    ],
    "legacy_keys": [{"from": "lang", "to": "language"}]
}"#;

/// Route log output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn catalog() -> SearchConfig {
    SearchConfig::from_json(CATALOG).unwrap()
}

pub fn bind(query_string: &str) -> (Rc<MemoryParamStore>, Query) {
    bind_with(query_string, Capabilities::default())
}

pub fn bind_with(query_string: &str, capabilities: Capabilities) -> (Rc<MemoryParamStore>, Query) {
    init_tracing();
    let config = catalog();
    let store = Rc::new(config.memory_store(query_string));
    let query = Query::new(store.clone(), config, capabilities);
    (store, query)
}

pub fn record(query: &Query) -> Rc<RefCell<Vec<QueryUpdate>>> {
    let updates = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&updates);
    query.on_update(move |update| sink.borrow_mut().push(update.clone()));
    updates
}

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}
