use synced_search::{CompareState, CompareTerms, ParamMap, ParamStore};

use crate::support::bind;

#[test]
fn query_text_change_resets_compared_terms() {
    let (store, query) = bind("");
    let compare = CompareTerms::new(&query);

    compare
        .set_params(|state| state.terms = vec!["a".to_string(), "b".to_string()])
        .unwrap();
    assert_eq!(compare.compared_terms(), vec!["", "a", "b"]);

    query.set_query_text("x").unwrap();

    assert_eq!(compare.current_state(), CompareState { terms: vec![] });
    assert!(!store.current_params().contains_key("compare"));
    assert_eq!(compare.compared_terms(), vec!["x"]);
}

#[test]
fn filter_changes_keep_compared_terms() {
    let (_store, query) = bind("q=love&compare=hate");
    let compare = CompareTerms::new(&query);

    query
        .filter_for_field("language")
        .unwrap()
        .set_from_string("de")
        .unwrap();

    assert_eq!(compare.compared_terms(), vec!["love", "hate"]);
}

#[test]
fn navigating_back_restores_terms_for_unchanged_text() {
    let (store, query) = bind("q=love&compare=hate");
    let compare = CompareTerms::new(&query);

    compare.add_term("war").unwrap();
    store.navigate(ParamMap::from_query_string("q=love&compare=hate"));

    assert_eq!(compare.terms(), vec!["hate"]);
    assert_eq!(query.query_text(), "love");
}

#[test]
fn dropping_the_extension_stops_following_the_query() {
    let (store, query) = bind("q=love&compare=hate");
    let compare = CompareTerms::new(&query);
    drop(compare);

    query.set_query_text("peace").unwrap();
    assert_eq!(store.current_params().get_str("compare").as_deref(), Some("hate"));
    assert!(store.claimed_keys().get("compare").is_none());
}
