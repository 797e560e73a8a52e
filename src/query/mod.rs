//! Query - free text, sort and filters composed into one search.
//!
//! A [`Query`] owns one [`Stored`] container for its free text, search
//! fields, sort and highlight window, plus one filter per declared field.
//! Downstream collaborators consume [`Query::to_backend_query`] and the
//! unified [`Query::on_update`] signal.
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//! use synced_search::{Capabilities, FieldDefinition, FilterConfig, MemoryParamStore, Query, SearchConfig};
//!
//! let config = SearchConfig::new(vec![
//!     FieldDefinition::new("language").with_filter(FilterConfig::MultipleChoice),
//! ]);
//! let store = Rc::new(MemoryParamStore::from_query_string("q=faust&language=de"));
//! let query = Query::new(store, config, Capabilities::default());
//!
//! assert_eq!(query.query_text(), "faust");
//! assert_eq!(query.active_filters().len(), 1);
//! assert_eq!(query.to_route_param(), "language=de&q=faust");
//! ```

pub mod backend;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use serde_json::{json, Value};

use crate::config::{Capabilities, ParamKeys, SearchConfig};
use crate::error::StateError;
use crate::filter::{AnyFilter, FilterEvent};
use crate::notifier::{ListenerId, Notifier};
use crate::params::{MemoryParamStore, ParamMap, ParamPatch, ParamStore};
use crate::stored::{StateChange, StateCodec, Stored};

use backend::SavedQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort order, stored as `field` (ascending) or `-field` (descending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    pub fn parse(raw: &str) -> Option<Sort> {
        let raw = raw.trim();
        match raw.strip_prefix('-') {
            Some(field) if !field.is_empty() => Some(Sort::descending(field)),
            Some(_) => None,
            None if raw.is_empty() => None,
            None => Some(Sort::ascending(raw)),
        }
    }

    pub fn encode(&self) -> String {
        match self.direction {
            SortDirection::Ascending => self.field.clone(),
            SortDirection::Descending => format!("-{}", self.field),
        }
    }
}

/// Free text, search fields, sort and highlight window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    pub text: String,
    /// Restricts the text match to these fields; `None` searches all.
    pub search_fields: Option<BTreeSet<String>>,
    pub sort: Option<Sort>,
    pub highlight: Option<u32>,
}

/// Codec for the query's own keys.
#[derive(Debug, Clone)]
pub struct QueryCodec {
    keys: ParamKeys,
}

impl QueryCodec {
    pub fn new(keys: ParamKeys) -> Self {
        Self { keys }
    }
}

impl StateCodec for QueryCodec {
    type State = QueryState;

    fn keys(&self) -> Vec<String> {
        vec![
            self.keys.query.clone(),
            self.keys.search_fields.clone(),
            self.keys.sort.clone(),
            self.keys.highlight.clone(),
        ]
    }

    fn decode(&self, params: &ParamMap, _previous: Option<&QueryState>) -> QueryState {
        let search_fields = params.get_str(&self.keys.search_fields).and_then(|raw| {
            let fields: BTreeSet<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect();
            (!fields.is_empty()).then_some(fields)
        });
        let highlight = params.get_str(&self.keys.highlight).and_then(|raw| {
            let parsed = raw.trim().parse::<u32>().ok();
            if parsed.is_none() {
                tracing::warn!(value = %raw, "malformed highlight parameter");
            }
            parsed
        });

        QueryState {
            text: params.get_str(&self.keys.query).unwrap_or_default(),
            search_fields,
            sort: params
                .get_str(&self.keys.sort)
                .and_then(|raw| Sort::parse(&raw)),
            highlight,
        }
    }

    fn encode(&self, state: &QueryState) -> ParamPatch {
        let mut patch = ParamPatch::new();
        patch.put(
            self.keys.query.clone(),
            (!state.text.is_empty()).then(|| state.text.clone()),
        );
        patch.put(
            self.keys.search_fields.clone(),
            state
                .search_fields
                .as_ref()
                .filter(|fields| !fields.is_empty())
                .map(|fields| fields.iter().cloned().collect::<Vec<_>>().join(",")),
        );
        patch.put(self.keys.sort.clone(), state.sort.as_ref().map(Sort::encode));
        patch.put(
            self.keys.highlight.clone(),
            state.highlight.map(|size| size.to_string()),
        );
        patch
    }
}

/// A change visible through [`Query::on_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryUpdate {
    /// The query's own state changed.
    Query { text_changed: bool },
    /// A filter transition touching the active side.
    Filter(FilterEvent),
}

impl QueryUpdate {
    pub fn is_text_change(&self) -> bool {
        matches!(self, QueryUpdate::Query { text_changed: true })
    }
}

struct BoundFilter {
    filter: AnyFilter,
    listener: ListenerId,
}

struct QueryInner {
    config: SearchConfig,
    capabilities: Capabilities,
    store: Rc<dyn ParamStore>,
    state: Stored<QueryCodec>,
    filters: RefCell<Vec<BoundFilter>>,
    updates: Rc<Notifier<QueryUpdate>>,
}

/// The query aggregate.
///
/// Cloning produces a fully independent aggregate bound to a private
/// in-memory store seeded with this query's parameters; changes to either
/// side afterwards are not seen by the other.
pub struct Query {
    inner: Rc<QueryInner>,
}

impl Query {
    /// Bind a query and one filter per declared field. The reserved tag
    /// filter is added when `capabilities` allow it.
    pub fn new(store: Rc<dyn ParamStore>, config: SearchConfig, capabilities: Capabilities) -> Self {
        let mut filters: Vec<AnyFilter> = config
            .fields
            .iter()
            .map(|field| AnyFilter::bind(field, Rc::clone(&store)))
            .collect();
        if capabilities.tags {
            filters.push(AnyFilter::bind(&config.tag_field(), Rc::clone(&store)));
        }
        Self::assemble(store, config, capabilities, filters)
    }

    fn assemble(
        store: Rc<dyn ParamStore>,
        config: SearchConfig,
        capabilities: Capabilities,
        filters: Vec<AnyFilter>,
    ) -> Self {
        let state = Stored::new("query", Rc::clone(&store), QueryCodec::new(config.keys.clone()));
        let updates = Rc::new(Notifier::new());

        let forward = Rc::clone(&updates);
        state.on_change(move |change: &StateChange<QueryState>| {
            forward.emit(&QueryUpdate::Query {
                text_changed: change.previous.text != change.current.text,
            });
        });

        let filters = filters
            .into_iter()
            .map(|filter| attach(&updates, filter))
            .collect();

        Query {
            inner: Rc::new(QueryInner {
                config,
                capabilities,
                store,
                state,
                filters: RefCell::new(filters),
                updates,
            }),
        }
    }

    /// A second handle to the same aggregate.
    pub(crate) fn share(&self) -> Query {
        Query {
            inner: Rc::clone(&self.inner),
        }
    }

    pub fn store(&self) -> &Rc<dyn ParamStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &SearchConfig {
        &self.inner.config
    }

    pub fn keys(&self) -> &ParamKeys {
        &self.inner.config.keys
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    pub fn current_state(&self) -> QueryState {
        self.inner.state.current_state()
    }

    pub fn query_text(&self) -> String {
        self.inner.state.with_state(|state| state.text.clone())
    }

    pub fn search_fields(&self) -> Option<BTreeSet<String>> {
        self.inner.state.with_state(|state| state.search_fields.clone())
    }

    pub fn sort(&self) -> Option<Sort> {
        self.inner.state.with_state(|state| state.sort.clone())
    }

    pub fn highlight(&self) -> Option<u32> {
        self.inner.state.with_state(|state| state.highlight)
    }

    pub fn is_completed(&self) -> bool {
        self.inner.state.is_completed()
    }

    /// Merge a partial update of the query's own state.
    pub fn set_params(&self, apply: impl FnOnce(&mut QueryState)) -> Result<(), StateError> {
        self.inner.state.set_params(apply)
    }

    pub fn set_query_text(&self, text: impl Into<String>) -> Result<(), StateError> {
        let text = text.into();
        self.set_params(|state| state.text = text)
    }

    /// An empty set searches every field.
    pub fn set_search_fields(&self, fields: Option<BTreeSet<String>>) -> Result<(), StateError> {
        let fields = fields.filter(|fields| !fields.is_empty());
        self.set_params(|state| state.search_fields = fields)
    }

    pub fn set_sort(&self, sort: Option<Sort>) -> Result<(), StateError> {
        self.set_params(|state| state.sort = sort)
    }

    pub fn set_highlight(&self, highlight: Option<u32>) -> Result<(), StateError> {
        self.set_params(|state| state.highlight = highlight)
    }

    pub fn filters(&self) -> Vec<AnyFilter> {
        self.inner
            .filters
            .borrow()
            .iter()
            .map(|bound| bound.filter.clone())
            .collect()
    }

    pub fn active_filters(&self) -> Vec<AnyFilter> {
        self.inner
            .filters
            .borrow()
            .iter()
            .filter(|bound| bound.filter.is_active())
            .map(|bound| bound.filter.clone())
            .collect()
    }

    pub fn filter_for_field(&self, field: &str) -> Option<AnyFilter> {
        self.inner
            .filters
            .borrow()
            .iter()
            .find(|bound| bound.filter.key() == field)
            .map(|bound| bound.filter.clone())
    }

    /// Narrow the search to documents sharing `value` on `field`.
    ///
    /// Returns `false` when the value does not fit the field's filter kind.
    pub fn set_filter_to_value(&self, field: &str, value: &Value) -> Result<bool, StateError> {
        let filter = self
            .filter_for_field(field)
            .ok_or_else(|| StateError::UnknownField(field.to_string()))?;
        filter.set_to_value(value)
    }

    /// Add a filter, replacing (and returning) any filter on the same field.
    pub fn add_filter(&self, filter: AnyFilter) -> Result<Option<AnyFilter>, StateError> {
        if self.is_completed() {
            return Err(self.completed_error());
        }
        let replaced = self.detach_where(|bound| bound.key() == filter.key());
        self.inner
            .filters
            .borrow_mut()
            .push(attach(&self.inner.updates, filter));
        Ok(replaced)
    }

    /// Stop tracking `filter`. The filter stays bound to the store; call
    /// its `complete` to drop its parameter.
    pub fn remove_filter(&self, filter: &AnyFilter) -> Option<AnyFilter> {
        self.detach_where(|bound| bound.same_filter(filter))
    }

    fn detach_where(&self, matches: impl Fn(&AnyFilter) -> bool) -> Option<AnyFilter> {
        let mut filters = self.inner.filters.borrow_mut();
        let index = filters.iter().position(|bound| matches(&bound.filter))?;
        let bound = filters.remove(index);
        bound.filter.remove_update_listener(bound.listener);
        Some(bound.filter)
    }

    /// Register for query-state changes and filter updates.
    pub fn on_update<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&QueryUpdate) + 'static,
    {
        self.inner.updates.on(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.updates.remove(id)
    }

    pub fn to_backend_query(&self) -> Value {
        let clauses = self
            .active_filters()
            .iter()
            .filter_map(AnyFilter::to_backend_query)
            .collect();
        self.inner.state.with_state(|state| {
            backend::build_query(&state.text, state.search_fields.as_ref(), clauses)
        })
    }

    pub fn to_backend_sort(&self) -> Option<Value> {
        self.sort().as_ref().map(backend::build_sort)
    }

    pub fn to_backend_highlight(&self) -> Option<Value> {
        self.highlight().map(backend::build_highlight)
    }

    /// Full search request body.
    pub fn to_search_request(&self, size: Option<usize>) -> Value {
        let mut request = json!({ "query": self.to_backend_query() });
        if let Some(sort) = self.to_backend_sort() {
            request["sort"] = sort;
        }
        if let Some(highlight) = self.to_backend_highlight() {
            request["highlight"] = highlight;
        }
        if let Some(size) = size {
            request["size"] = json!(size);
        }
        request
    }

    /// The parameters describing the query and every filter.
    pub fn to_query_params(&self) -> ParamMap {
        let mut patch = self.inner.state.to_patch();
        for bound in self.inner.filters.borrow().iter() {
            patch.merge(bound.filter.to_patch());
        }
        patch.to_params()
    }

    pub fn to_route_param(&self) -> String {
        self.to_query_params().to_query_string()
    }

    /// Restore text, search fields and filters from a saved backend query.
    ///
    /// Written to the store as one patch; sort and highlight are kept.
    pub fn load_backend_query(&self, query: &Value) -> Result<(), StateError> {
        if self.is_completed() {
            return Err(self.completed_error());
        }
        let saved = SavedQuery::parse(query);

        let mut next = self.current_state();
        next.text = saved.text;
        next.search_fields = saved.fields;
        let mut patch = self.inner.state.codec().encode(&next);

        let filters = self.filters();
        for clause in &saved.clauses {
            let known = backend::clause_field(clause)
                .map(|field| filters.iter().any(|filter| filter.key() == field))
                .unwrap_or(false);
            if !known {
                tracing::warn!(clause = %clause, "saved query clause matches no filter");
            }
        }
        for filter in &filters {
            let encoded = saved
                .clauses
                .iter()
                .filter(|clause| backend::clause_field(clause) == Some(filter.key()))
                .find_map(|clause| filter.encode_backend_clause(clause));
            patch.put(filter.key().to_string(), encoded);
        }

        tracing::debug!(patch = ?patch, "loading saved backend query");
        self.inner.store.patch(patch);
        Ok(())
    }

    /// Complete the query container and every filter.
    pub fn complete(&self) {
        self.inner.state.complete();
        for bound in self.inner.filters.borrow().iter() {
            bound.filter.complete();
        }
    }

    fn completed_error(&self) -> StateError {
        tracing::error!(container = %self.inner.state.name(), "mutation after completion");
        StateError::Completed {
            keys: self.inner.state.keys().to_vec(),
        }
    }
}

fn attach(updates: &Rc<Notifier<QueryUpdate>>, filter: AnyFilter) -> BoundFilter {
    let forward = Rc::clone(updates);
    let listener = filter.on_update(move |event| forward.emit(&QueryUpdate::Filter(event.clone())));
    BoundFilter { filter, listener }
}

impl Clone for Query {
    fn clone(&self) -> Self {
        let params = self.to_query_params();
        let store: Rc<dyn ParamStore> = Rc::new(
            MemoryParamStore::with_params(params).with_debounce(self.inner.config.flush_debounce()),
        );
        let filters = self
            .filters()
            .iter()
            .map(|filter| filter.fork(Rc::clone(&store)))
            .collect();
        Query::assemble(
            store,
            self.inner.config.clone(),
            self.inner.capabilities,
            filters,
        )
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("state", &self.current_state())
            .field("filters", &self.filters())
            .finish()
    }
}
