//! Compared terms: extra search terms shown side by side with the primary
//! query text.
//!
//! Terms are stored comma-joined under a single key. Terms are not escaped,
//! so a term containing a comma splits into two terms after a round trip.
//! The terms are reset whenever the primary query text changes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::StateError;
use crate::notifier::{ListenerId, Notifier};
use crate::params::{ParamMap, ParamPatch};
use crate::query::Query;
use crate::stored::{StateCodec, Stored};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompareState {
    pub terms: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CompareCodec {
    key: String,
}

impl CompareCodec {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl StateCodec for CompareCodec {
    type State = CompareState;

    fn keys(&self) -> Vec<String> {
        vec![self.key.clone()]
    }

    fn decode(&self, params: &ParamMap, _previous: Option<&CompareState>) -> CompareState {
        let terms = params
            .get_str(&self.key)
            .map(|raw| {
                raw.split(',')
                    .filter(|term| !term.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        CompareState { terms }
    }

    fn encode(&self, state: &CompareState) -> ParamPatch {
        let mut patch = ParamPatch::new();
        patch.put(
            self.key.clone(),
            (!state.terms.is_empty()).then(|| state.terms.join(",")),
        );
        patch
    }
}

struct CompareInner {
    query: Query,
    state: Stored<CompareCodec>,
    query_listener: Cell<Option<ListenerId>>,
    sequence: Notifier<Vec<String>>,
    last_sequence: RefCell<Vec<String>>,
    reset_pending: Cell<bool>,
}

impl CompareInner {
    fn compared_terms(&self) -> Vec<String> {
        let mut sequence = vec![self.query.query_text()];
        self.state
            .with_state(|state| sequence.extend(state.terms.iter().cloned()));
        sequence
    }

    fn publish(&self) {
        let sequence = self.compared_terms();
        if *self.last_sequence.borrow() == sequence {
            return;
        }
        self.last_sequence.replace(sequence.clone());
        self.sequence.emit(&sequence);
    }

    fn on_state_change(&self, current: &CompareState) {
        if self.reset_pending.get() {
            if !current.terms.is_empty() {
                return;
            }
            self.reset_pending.set(false);
        }
        self.publish();
    }

    fn reset_for_new_text(&self) {
        if self.state.is_completed() {
            return;
        }
        // The same store change may carry new terms this container has not
        // adopted yet, so the live map decides whether a reset is needed.
        let codec = self.state.codec();
        let owned = self
            .state
            .store()
            .current_params()
            .restrict(self.state.keys());
        let incoming = codec.decode(&owned, None);
        let held = self.state.with_state(|state| !state.terms.is_empty());
        if !held && incoming.terms.is_empty() {
            if !owned.is_empty() {
                self.state.store().patch(codec.encode(&CompareState::default()));
            }
            self.publish();
            return;
        }
        // The reset lands after the current store dispatch; publishing
        // happens once the cleared state is adopted.
        tracing::debug!("query text changed, resetting compared terms");
        self.reset_pending.set(true);
        self.state.store().patch(codec.encode(&CompareState::default()));
    }
}

impl Drop for CompareInner {
    fn drop(&mut self) {
        if let Some(id) = self.query_listener.take() {
            self.query.remove_listener(id);
        }
    }
}

/// Compared terms bound to a [`Query`].
pub struct CompareTerms {
    inner: Rc<CompareInner>,
}

impl CompareTerms {
    pub fn new(query: &Query) -> Self {
        let store = Rc::clone(query.store());
        let state = Stored::new(
            "compare",
            store,
            CompareCodec::new(query.keys().compare.clone()),
        );

        let inner = Rc::new_cyclic(|weak: &Weak<CompareInner>| {
            let on_state = weak.clone();
            state.on_change(move |change| {
                if let Some(inner) = on_state.upgrade() {
                    inner.on_state_change(&change.current);
                }
            });

            let on_query = weak.clone();
            let listener = query.on_update(move |update| {
                if !update.is_text_change() {
                    return;
                }
                if let Some(inner) = on_query.upgrade() {
                    inner.reset_for_new_text();
                }
            });

            CompareInner {
                query: query.share(),
                state,
                query_listener: Cell::new(Some(listener)),
                sequence: Notifier::new(),
                last_sequence: RefCell::new(Vec::new()),
                reset_pending: Cell::new(false),
            }
        });
        inner.last_sequence.replace(inner.compared_terms());

        CompareTerms { inner }
    }

    pub fn current_state(&self) -> CompareState {
        self.inner.state.current_state()
    }

    pub fn terms(&self) -> Vec<String> {
        self.inner.state.with_state(|state| state.terms.clone())
    }

    pub fn set_params(&self, apply: impl FnOnce(&mut CompareState)) -> Result<(), StateError> {
        self.inner.state.set_params(apply)
    }

    pub fn set_terms(&self, terms: Vec<String>) -> Result<(), StateError> {
        self.set_params(|state| state.terms = terms)
    }

    /// Appends `term` unless it is empty or already compared.
    pub fn add_term(&self, term: &str) -> Result<(), StateError> {
        self.set_params(|state| {
            if !term.is_empty() && !state.terms.iter().any(|existing| existing == term) {
                state.terms.push(term.to_string());
            }
        })
    }

    pub fn remove_term(&self, term: &str) -> Result<(), StateError> {
        self.set_params(|state| state.terms.retain(|existing| existing != term))
    }

    /// The primary query text followed by every compared term.
    pub fn compared_terms(&self) -> Vec<String> {
        self.inner.compared_terms()
    }

    /// Register for changes of [`compared_terms`](Self::compared_terms).
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Vec<String>) + 'static,
    {
        self.inner.sequence.on(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.sequence.remove(id)
    }

    pub fn is_completed(&self) -> bool {
        self.inner.state.is_completed()
    }

    /// Stop following the query and remove the compare key from the store.
    pub fn complete(&self) {
        if let Some(id) = self.inner.query_listener.take() {
            self.inner.query.remove_listener(id);
        }
        self.inner.state.complete();
    }
}

impl fmt::Debug for CompareTerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompareTerms")
            .field("terms", &self.terms())
            .field("completed", &self.is_completed())
            .finish()
    }
}
