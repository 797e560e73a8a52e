use serde_json::json;
use synced_search::{
    AdHocFilter, BooleanFilter, DateFilter, DateRange, FilterVariant, MultipleChoiceFilter,
    NumericRange, ParamStore, RangeFilter,
};

use crate::support::{bind, record, ymd};

fn assert_round_trip<V: FilterVariant>(variant: &V, samples: Vec<V::Data>) {
    for data in samples {
        let data = variant.normalize(data);
        let encoded = variant.data_to_string(&data);
        assert_eq!(variant.data_from_string(&encoded), data, "encoded as {encoded:?}");
    }
}

#[test]
fn every_variant_round_trips_its_encoding() {
    let dates = DateFilter::new(ymd(1800, 1, 1), ymd(1899, 12, 31));
    assert_round_trip(
        &dates,
        vec![
            DateRange::new(ymd(1850, 1, 1), ymd(1860, 12, 31)),
            DateRange::single(ymd(1832, 3, 22)),
            DateRange {
                min: Some(ymd(1850, 1, 1)),
                max: None,
            },
            DateRange {
                min: None,
                max: Some(ymd(1850, 1, 1)),
            },
            dates.default_data(),
            DateRange {
                min: None,
                max: None,
            },
        ],
    );
    assert_round_trip(&BooleanFilter, vec![Some(true), Some(false), None]);
    assert_round_trip(
        &MultipleChoiceFilter,
        vec![
            vec![],
            vec!["de".to_string()],
            vec!["a,b".to_string(), "Grüße".to_string(), "100%".to_string()],
            vec!["".to_string(), "a".to_string()],
            vec!["b".to_string(), "a".to_string(), "b".to_string()],
        ],
    );
    assert_round_trip(
        &RangeFilter::new(1.0, 900.0),
        vec![
            NumericRange::new(1.0, 900.0),
            NumericRange::new(12.5, 40.0),
            NumericRange::single(-3.0),
            NumericRange::new(f64::NAN, 2.0),
        ],
    );
    assert_round_trip(
        &AdHocFilter,
        vec![None, Some("Goethe".to_string()), Some(String::new())],
    );
}

#[test]
fn date_filter_scenario() {
    let (store, query) = bind("");
    let date = query.filter_for_field("date").unwrap();
    let date = date.as_date().unwrap();
    assert_eq!(
        date.default_data(),
        DateRange::new(ymd(1800, 1, 1), ymd(1899, 12, 31))
    );

    let selected = DateRange::new(ymd(1850, 1, 1), ymd(1860, 12, 31));
    date.set(selected).unwrap();
    assert!(date.is_active());
    assert_eq!(date.data_string(), "1850-01-01:1860-12-31");
    assert_eq!(date.variant().data_from_string("1850-01-01:1860-12-31"), selected);
    assert_eq!(
        store.current_params().get_str("date").as_deref(),
        Some("1850-01-01:1860-12-31")
    );

    date.reset().unwrap();
    assert!(!date.is_active());
    assert_eq!(date.current_data(), date.default_data());
    assert!(!store.current_params().contains_key("date"));
}

#[test]
fn multiple_choice_scenario() {
    let (store, query) = bind("");
    let language = query.filter_for_field("language").unwrap();
    let language = language.as_multiple_choice().unwrap();

    let choices = vec![
        "a".to_string(),
        "b".to_string(),
        "value with spaces".to_string(),
    ];
    language.set(choices.clone()).unwrap();

    assert_eq!(language.data_string(), "a,b,value%20with%20spaces");
    assert!(!language.data_string().contains(' '));
    assert_eq!(language.current_data(), choices);
    assert_eq!(
        store.current_params().get_str("language").as_deref(),
        Some("a,b,value%20with%20spaces")
    );

    language.toggle_choice("b").unwrap();
    assert!(!language.is_selected("b"));
    assert!(language.is_selected("a"));
}

#[test]
fn default_data_implies_inactive() {
    let (_store, query) = bind("date=1850-01-01:1860-12-31&pages=10,20&digitized=true&language=de&author=x");
    for filter in query.filters() {
        assert!(filter.is_active(), "{} starts active", filter.key());
        filter.reset().unwrap();
        assert!(!filter.is_active(), "{} inactive after reset", filter.key());
        assert!(filter.is_default());
    }

    let pages = query.filter_for_field("pages").unwrap();
    let pages = pages.as_range().unwrap();
    pages.set(pages.default_data()).unwrap();
    assert!(!pages.is_active());
}

#[test]
fn activation_is_a_no_op_on_default_data() {
    let (store, query) = bind("");
    for filter in query.filters() {
        filter.activate().unwrap();
        assert!(!filter.is_active(), "{} stayed inactive", filter.key());
    }
    assert!(store.current_params().is_empty());
}

#[test]
fn toggle_twice_restores_flag_and_data() {
    let (_store, query) = bind("pages=10,20");
    let pages = query.filter_for_field("pages").unwrap();
    let pages = pages.as_range().unwrap();
    let before = pages.current_state();

    pages.toggle().unwrap();
    assert!(!pages.is_active());
    assert_eq!(pages.current_data(), before.data);

    pages.toggle().unwrap();
    assert_eq!(pages.current_state(), before);
}

#[test]
fn updates_only_involve_the_active_side() {
    let (_store, query) = bind("");
    let updates = record(&query);
    let author = query.filter_for_field("author").unwrap();

    author.deactivate().unwrap();
    author.reset().unwrap();
    author.activate().unwrap();
    assert!(updates.borrow().is_empty());

    author.set_to_value(&json!("Goethe")).unwrap();
    assert_eq!(updates.borrow().len(), 1);
    author.set_to_value(&json!("Goethe")).unwrap();
    assert_eq!(updates.borrow().len(), 1);
    author.set_to_value(&json!("Schiller")).unwrap();
    assert_eq!(updates.borrow().len(), 2);

    author.deactivate().unwrap();
    assert_eq!(updates.borrow().len(), 3);

    // Discarding the held data of an inactive filter stays invisible.
    author.reset().unwrap();
    assert_eq!(updates.borrow().len(), 3);
}

#[test]
fn malformed_parameters_decode_to_defaults() {
    let (_store, query) = bind("date=yesterday&pages=a,b&digitized=maybe&highlight=-1");
    assert!(query.active_filters().is_empty());
    assert_eq!(query.highlight(), None);
}

#[test]
fn single_token_dates_select_one_day() {
    let (_store, query) = bind("date=1832-03-22");
    let date = query.filter_for_field("date").unwrap();
    let date = date.as_date().unwrap();
    assert!(date.is_active());
    assert_eq!(date.current_data(), DateRange::single(ymd(1832, 3, 22)));
}
