use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use synced_search::{Capabilities, ParamMap, ParamStore, Query};

use crate::support::{bind, catalog, init_tracing};

#[test]
fn bursts_of_writes_flush_once_with_the_latest_map() {
    init_tracing();
    let config = catalog();
    let published = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&published);
    let store = Rc::new(
        config
            .memory_store("")
            .with_sink(move |params: &ParamMap| sink.borrow_mut().push(params.to_query_string())),
    );
    let query = Query::new(store.clone(), config, Capabilities::default());

    let start = Instant::now();
    query.set_query_text("f").unwrap();
    query.set_query_text("fa").unwrap();
    query.set_query_text("faust").unwrap();

    assert!(!store.flush_due(start));
    assert!(published.borrow().is_empty());

    assert!(store.flush_due(Instant::now() + Duration::from_millis(150)));
    assert_eq!(*published.borrow(), vec!["q=faust".to_string()]);
    assert!(!store.flush_now());
}

#[test]
fn legacy_keys_are_forwarded_on_load() {
    let (store, query) = bind("lang=de&lang=en&q=faust");
    let language = query.filter_for_field("language").unwrap();

    assert!(language.is_active());
    assert_eq!(
        language.as_multiple_choice().unwrap().current_data(),
        vec!["de".to_string(), "en".to_string()]
    );
    assert!(!store.current_params().contains_key("lang"));
}

#[test]
fn navigation_is_adopted_by_every_container() {
    let (store, query) = bind("q=faust&language=de");
    query.set_query_text("werther").unwrap();
    query
        .filter_for_field("digitized")
        .unwrap()
        .set_from_string("true")
        .unwrap();

    store.navigate(ParamMap::from_query_string("q=faust&language=de"));

    assert_eq!(query.query_text(), "faust");
    let active: Vec<String> = query
        .active_filters()
        .iter()
        .map(|filter| filter.key().to_string())
        .collect();
    assert_eq!(active, vec!["language".to_string()]);
}
