//! Stored - a typed state slice bound to a subset of Parameter Store keys.
//!
//! A [`Stored`] container never writes its own state: `set_state` encodes
//! the requested state into a patch for the store, and the new state is
//! adopted only once the store echoes the change back. External edits
//! (the user changing the URL) travel the same path, so the store stays
//! the single source of truth.
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//! use synced_search::{MemoryParamStore, ParamMap, ParamPatch, StateCodec, Stored};
//!
//! struct PageCodec;
//!
//! impl StateCodec for PageCodec {
//!     type State = u32;
//!
//!     fn keys(&self) -> Vec<String> {
//!         vec!["page".to_string()]
//!     }
//!
//!     fn decode(&self, params: &ParamMap, _previous: Option<&u32>) -> u32 {
//!         params
//!             .get_str("page")
//!             .and_then(|page| page.parse().ok())
//!             .unwrap_or(1)
//!     }
//!
//!     fn encode(&self, page: &u32) -> ParamPatch {
//!         let mut patch = ParamPatch::new();
//!         patch.put("page", (*page != 1).then(|| page.to_string()));
//!         patch
//!     }
//! }
//!
//! let store = Rc::new(MemoryParamStore::from_query_string("page=3"));
//! let page = Stored::new("page", store.clone(), PageCodec);
//! assert_eq!(page.current_state(), 3);
//!
//! page.set_state(5).unwrap();
//! assert_eq!(page.current_state(), 5);
//!
//! page.complete();
//! assert!(page.set_state(6).is_err());
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::StateError;
use crate::notifier::{ListenerId, Notifier};
use crate::params::{ParamMap, ParamPatch, ParamStore};

/// Pure mapping between a state value and the keys it owns.
///
/// `decode` must be total: malformed or missing values resolve to a safe
/// default instead of failing. For every reachable state `s`,
/// `decode(encode(s))` must behave like `s`.
pub trait StateCodec: 'static {
    type State: Clone + PartialEq + fmt::Debug + 'static;

    /// The store keys this codec reads and writes.
    fn keys(&self) -> Vec<String>;

    /// Build state from the owned slice of the store. `previous` is the
    /// last adopted state, `None` while constructing.
    fn decode(&self, params: &ParamMap, previous: Option<&Self::State>) -> Self::State;

    /// The patch that makes the store describe `state`. Must mention every
    /// owned key it wants unset with an explicit clear.
    fn encode(&self, state: &Self::State) -> ParamPatch;
}

/// An adopted state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange<T> {
    pub previous: T,
    pub current: T,
}

struct StoredInner<C: StateCodec> {
    name: String,
    store: Rc<dyn ParamStore>,
    codec: C,
    keys: Vec<String>,
    state: RefCell<C::State>,
    completed: Cell<bool>,
    subscription: Cell<Option<ListenerId>>,
    changes: Notifier<StateChange<C::State>>,
}

impl<C: StateCodec> StoredInner<C> {
    fn receive(&self, params: &ParamMap) {
        if self.completed.get() {
            return;
        }

        let owned = params.restrict(self.keys.as_slice());
        let decoded = {
            let current = self.state.borrow();
            self.codec.decode(&owned, Some(&*current))
        };
        if decoded == *self.state.borrow() {
            tracing::trace!(container = %self.name, "store change did not affect state");
            return;
        }

        let previous = self.state.replace(decoded.clone());
        tracing::debug!(container = %self.name, state = ?decoded, "adopted state from store");
        self.changes.emit(&StateChange {
            previous,
            current: decoded,
        });
    }

    fn detach(&self) {
        if let Some(id) = self.subscription.take() {
            self.store.unsubscribe(id);
        }
        self.store.release_keys(&self.name, &self.keys);
    }
}

impl<C: StateCodec> Drop for StoredInner<C> {
    fn drop(&mut self) {
        if !self.completed.get() {
            self.detach();
        }
    }
}

/// A state container synchronized with a [`ParamStore`].
pub struct Stored<C: StateCodec> {
    inner: Rc<StoredInner<C>>,
}

impl<C: StateCodec> Stored<C> {
    /// Bind `codec` to `store`, claim its keys and decode the initial state.
    pub fn new(name: impl Into<String>, store: Rc<dyn ParamStore>, codec: C) -> Self {
        let name = name.into();
        let keys = codec.keys();
        store.claim_keys(&name, &keys);

        let initial = codec.decode(&store.current_params().restrict(keys.as_slice()), None);
        tracing::debug!(container = %name, keys = ?keys, state = ?initial, "bound state container");

        let inner = Rc::new(StoredInner {
            name,
            store: Rc::clone(&store),
            codec,
            keys,
            state: RefCell::new(initial),
            completed: Cell::new(false),
            subscription: Cell::new(None),
            changes: Notifier::new(),
        });

        let weak: Weak<StoredInner<C>> = Rc::downgrade(&inner);
        let id = store.subscribe(Box::new(move |params| {
            if let Some(inner) = weak.upgrade() {
                inner.receive(params);
            }
        }));
        inner.subscription.set(Some(id));

        Stored { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn keys(&self) -> &[String] {
        &self.inner.keys
    }

    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    pub fn store(&self) -> &Rc<dyn ParamStore> {
        &self.inner.store
    }

    pub fn current_state(&self) -> C::State {
        self.inner.state.borrow().clone()
    }

    /// Read the current state without cloning it.
    pub fn with_state<R>(&self, read: impl FnOnce(&C::State) -> R) -> R {
        read(&self.inner.state.borrow())
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completed.get()
    }

    /// Merge a partial update into the current state and write it through.
    pub fn set_params(&self, apply: impl FnOnce(&mut C::State)) -> Result<(), StateError> {
        self.ensure_live()?;
        let mut merged = self.current_state();
        apply(&mut merged);
        self.set_state(merged)
    }

    /// Request `state`. A no-op when it equals the current state.
    pub fn set_state(&self, state: C::State) -> Result<(), StateError> {
        self.ensure_live()?;
        if state == *self.inner.state.borrow() {
            tracing::trace!(container = %self.inner.name, "skipping write of unchanged state");
            return Ok(());
        }

        let patch = self.inner.codec.encode(&state);
        tracing::debug!(container = %self.inner.name, patch = ?patch, "writing state to store");
        self.inner.store.patch(patch);
        Ok(())
    }

    /// Adopt `state` without going through the store.
    ///
    /// Only valid when `state` encodes to exactly what the store already
    /// holds for the owned keys.
    pub(crate) fn force_state(&self, state: C::State) -> Result<(), StateError> {
        self.ensure_live()?;
        self.adopt(state);
        Ok(())
    }

    pub(crate) fn adopt(&self, state: C::State) {
        if state == *self.inner.state.borrow() {
            return;
        }
        let previous = self.inner.state.replace(state.clone());
        tracing::debug!(container = %self.inner.name, state = ?state, "forced state");
        self.inner.changes.emit(&StateChange {
            previous,
            current: state,
        });
    }

    /// Register for adopted state transitions.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StateChange<C::State>) + 'static,
    {
        self.inner.changes.on(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.changes.remove(id)
    }

    /// The patch describing the current state.
    pub fn to_patch(&self) -> ParamPatch {
        self.with_state(|state| self.inner.codec.encode(state))
    }

    /// Detach from the store and remove every owned key from it.
    ///
    /// Idempotent. Any later mutation fails with
    /// [`StateError::Completed`].
    pub fn complete(&self) {
        if self.inner.completed.replace(true) {
            return;
        }
        self.inner.detach();

        let mut patch = ParamPatch::new();
        for key in &self.inner.keys {
            patch.clear(key.clone());
        }
        tracing::debug!(container = %self.inner.name, "completed state container");
        self.inner.store.patch(patch);
    }

    pub(crate) fn ensure_live(&self) -> Result<(), StateError> {
        if self.inner.completed.get() {
            tracing::error!(container = %self.inner.name, "mutation after completion");
            return Err(StateError::Completed {
                keys: self.inner.keys.clone(),
            });
        }
        Ok(())
    }
}

impl<C: StateCodec> fmt::Debug for Stored<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stored")
            .field("name", &self.inner.name)
            .field("keys", &self.inner.keys)
            .field("state", &*self.inner.state.borrow())
            .field("completed", &self.inner.completed.get())
            .finish()
    }
}
