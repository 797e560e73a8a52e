use std::collections::BTreeSet;

use serde_json::json;
use synced_search::{
    Capabilities, CompareTerms, ParamStore, Query, QueryUpdate, Sort, StateError,
};

use crate::support::{bind, bind_with, record};

#[test]
fn clone_is_isolated_from_the_original() {
    let (store, query) = bind("");
    let language = query.filter_for_field("language").unwrap();

    query.set_query_text("test").unwrap();
    language.set_to_value(&json!("de")).unwrap();

    let clone = query.clone();
    query.set_query_text("other").unwrap();
    language.set_to_value(&json!("en")).unwrap();

    assert_eq!(clone.query_text(), "test");
    let cloned_language = clone.filter_for_field("language").unwrap();
    assert_eq!(
        cloned_language.as_multiple_choice().unwrap().current_data(),
        vec!["de".to_string()]
    );

    clone.set_query_text("cloned").unwrap();
    cloned_language.reset().unwrap();
    assert_eq!(query.query_text(), "other");
    assert!(language.is_active());
    assert_eq!(store.current_params().get_str("q").as_deref(), Some("other"));
    assert!(store.key_conflicts().is_empty());
}

#[test]
fn clone_keeps_data_held_by_inactive_filters() {
    let (_store, query) = bind("author=Goethe");
    let author = query.filter_for_field("author").unwrap();
    author.deactivate().unwrap();

    let clone = query.clone();
    let cloned = clone.filter_for_field("author").unwrap();
    assert!(!cloned.is_active());
    assert_eq!(
        cloned.as_ad_hoc().unwrap().current_data().as_deref(),
        Some("Goethe")
    );

    cloned.activate().unwrap();
    assert!(cloned.is_active());
    assert!(!author.is_active());
}

#[test]
fn completed_query_rejects_mutation_and_clears_keys() {
    let (store, query) = bind("q=faust&language=de&sort=-date&page=2");
    let language = query.filter_for_field("language").unwrap();

    query.complete();
    query.complete();

    assert_eq!(store.current_params().to_query_string(), "page=2");
    assert!(matches!(
        query.set_query_text("x"),
        Err(StateError::Completed { .. })
    ));
    assert!(matches!(
        language.set_from_string("en"),
        Err(StateError::Completed { .. })
    ));
    assert_eq!(store.subscriber_count(), 0);
}

#[test]
fn every_container_owns_disjoint_keys() {
    let (store, query) = bind_with("", Capabilities::with_tags());
    let _compare = CompareTerms::new(&query);

    assert!(store.key_conflicts().is_empty());
    let owned: BTreeSet<String> = store.claimed_keys().into_keys().collect();
    let expected: BTreeSet<String> = [
        "author", "compare", "date", "digitized", "fields", "highlight", "language", "pages",
        "q", "sort", "tags",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    assert_eq!(owned, expected);
}

#[test]
fn tag_filter_requires_capability() {
    let (_store, query) = bind("tags=todo");
    assert!(query.filter_for_field("tags").is_none());

    let (_store, query) = bind_with("tags=todo", Capabilities::with_tags());
    let tags = query.filter_for_field("tags").unwrap();
    assert!(tags.is_active());
    assert_eq!(tags.field().display_name(), "Tags");
}

#[test]
fn search_request_for_a_refined_query() {
    let (_store, query) = bind("q=werther&fields=title&sort=-date&highlight=120");
    query.set_filter_to_value("digitized", &json!(true)).unwrap();
    query
        .filter_for_field("pages")
        .unwrap()
        .set_from_string("10,20")
        .unwrap();

    assert_eq!(
        query.to_search_request(Some(25)),
        json!({
            "query": {"bool": {
                "must": {"simple_query_string": {"query": "werther", "lenient": true, "fields": ["title"]}},
                "filter": [
                    {"range": {"pages": {"gte": 10.0, "lte": 20.0}}},
                    {"term": {"digitized": true}}
                ]
            }},
            "sort": [{"date": {"order": "desc"}}],
            "highlight": {"fields": {"*": {}}, "fragment_size": 120},
            "size": 25
        })
    );
}

#[test]
fn saved_backend_query_restores_an_equivalent_query() {
    let (_store, original) = bind(
        "q=werther&fields=body,title&date=1850-01-01:1860-12-31&language=de,en&pages=10,20&digitized=false&author=Goethe",
    );
    let saved = original.to_backend_query();

    let (store, restored) = bind("q=unrelated&language=fr");
    let revision = store.revision();
    restored.load_backend_query(&saved).unwrap();

    assert_eq!(store.revision(), revision + 1);
    assert_eq!(restored.to_backend_query(), saved);
    assert_eq!(restored.to_route_param(), original.to_route_param());
}

#[test]
fn unknown_fields_are_usage_errors() {
    let (_store, query) = bind("");
    assert_eq!(
        query.set_filter_to_value("publisher", &json!("Cotta")),
        Err(StateError::UnknownField("publisher".to_string()))
    );
}

#[test]
fn sort_changes_are_not_text_changes() {
    let (_store, query) = bind("q=x");
    let updates = record(&query);

    query.set_sort(Some(Sort::ascending("title"))).unwrap();
    query.set_search_fields(Some(BTreeSet::new())).unwrap();
    query.set_query_text("y").unwrap();

    assert_eq!(
        *updates.borrow(),
        vec![
            QueryUpdate::Query {
                text_changed: false
            },
            QueryUpdate::Query { text_changed: true },
        ]
    );
}

#[test]
fn debug_output_names_state() {
    let (_store, query): (_, Query) = bind("q=x");
    assert!(format!("{query:?}").contains("text: \"x\""));
}
