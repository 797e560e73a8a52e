//! MemoryParamStore - in-process Parameter Store.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use super::{Debouncer, ParamMap, ParamPatch, ParamSink, ParamStore};
use crate::notifier::{ListenerId, Notifier};

/// Default quiet period before the live map is flushed to the sink.
pub const DEFAULT_FLUSH_DEBOUNCE: Duration = Duration::from_millis(100);

/// Two live containers claimed the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConflict {
    pub key: String,
    pub held_by: String,
    pub claimed_by: String,
}

enum Change {
    Patch(ParamPatch),
    Replace(ParamMap),
}

/// In-memory Parameter Store.
///
/// Features:
/// - Patches and external replacements are applied strictly in arrival
///   order. A patch issued by a subscriber while the store is notifying is
///   queued and applied once the current notification round completes.
/// - Subscribers are only notified when the live map actually changed.
/// - Every change (re)schedules a debounced flush of the full map to an
///   optional [`ParamSink`]; call [`flush_due`](Self::flush_due) from the
///   host's timer tick or [`flush_now`](Self::flush_now) to force it.
/// - Key claims are tracked so overlapping containers are detectable.
///
/// ## Example
///
/// ```
/// use std::rc::Rc;
/// use synced_search::{MemoryParamStore, ParamPatch, ParamStore};
///
/// let store = Rc::new(MemoryParamStore::from_query_string("q=rust"));
/// let mut patch = ParamPatch::new();
/// patch.set("sort", "-date");
/// store.patch(patch);
///
/// assert_eq!(store.current_params().to_query_string(), "q=rust&sort=-date");
/// ```
pub struct MemoryParamStore {
    params: RefCell<ParamMap>,
    listeners: Notifier<ParamMap>,
    queue: RefCell<VecDeque<Change>>,
    dispatching: Cell<bool>,
    revision: Cell<u64>,
    owners: RefCell<BTreeMap<String, String>>,
    conflicts: RefCell<Vec<KeyConflict>>,
    debouncer: RefCell<Debouncer>,
    sink: RefCell<Option<Box<dyn ParamSink>>>,
}

impl Default for MemoryParamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryParamStore {
    pub fn new() -> Self {
        Self::with_params(ParamMap::new())
    }

    pub fn with_params(params: ParamMap) -> Self {
        Self {
            params: RefCell::new(params),
            listeners: Notifier::new(),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
            revision: Cell::new(0),
            owners: RefCell::new(BTreeMap::new()),
            conflicts: RefCell::new(Vec::new()),
            debouncer: RefCell::new(Debouncer::new(DEFAULT_FLUSH_DEBOUNCE)),
            sink: RefCell::new(None),
        }
    }

    pub fn from_query_string(query: &str) -> Self {
        Self::with_params(ParamMap::from_query_string(query))
    }

    pub fn with_debounce(self, delay: Duration) -> Self {
        *self.debouncer.borrow_mut() = Debouncer::new(delay);
        self
    }

    pub fn with_sink(self, sink: impl ParamSink + 'static) -> Self {
        *self.sink.borrow_mut() = Some(Box::new(sink));
        self
    }

    /// Replace the whole map, as when the user edits the URL or navigates.
    pub fn navigate(&self, params: ParamMap) {
        self.enqueue(Change::Replace(params));
    }

    /// Number of changes applied so far.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Keys currently claimed, with their owner.
    pub fn claimed_keys(&self) -> BTreeMap<String, String> {
        self.owners.borrow().clone()
    }

    /// Every overlapping claim observed so far.
    pub fn key_conflicts(&self) -> Vec<KeyConflict> {
        self.conflicts.borrow().clone()
    }

    pub fn is_flush_pending(&self) -> bool {
        self.debouncer.borrow().is_pending()
    }

    /// Publish to the sink if the debounce window has elapsed at `now`.
    pub fn flush_due(&self, now: Instant) -> bool {
        let due = self.debouncer.borrow_mut().fire_if_due(now);
        if due {
            self.publish();
        }
        due
    }

    /// Publish to the sink immediately if a flush is pending.
    pub fn flush_now(&self) -> bool {
        let pending = self.debouncer.borrow_mut().take();
        if pending {
            self.publish();
        }
        pending
    }

    fn publish(&self) {
        let snapshot = self.params.borrow().clone();
        if let Some(sink) = self.sink.borrow().as_ref() {
            tracing::debug!(params = %snapshot, "flushing parameters to sink");
            sink.publish(&snapshot);
        }
    }

    fn enqueue(&self, change: Change) {
        self.queue.borrow_mut().push_back(change);
        if self.dispatching.replace(true) {
            return;
        }

        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(change) = next else {
                break;
            };

            let changed = {
                let mut params = self.params.borrow_mut();
                match change {
                    Change::Patch(patch) => params.apply(&patch),
                    Change::Replace(replacement) => {
                        let changed = *params != replacement;
                        *params = replacement;
                        changed
                    }
                }
            };
            if !changed {
                tracing::trace!("parameter change left the store untouched");
                continue;
            }

            self.revision.set(self.revision.get() + 1);
            self.debouncer.borrow_mut().schedule(Instant::now());
            let snapshot = self.params.borrow().clone();
            self.listeners.emit(&snapshot);
        }

        self.dispatching.set(false);
    }
}

impl ParamStore for MemoryParamStore {
    fn current_params(&self) -> ParamMap {
        self.params.borrow().clone()
    }

    fn subscribe(&self, listener: Box<dyn Fn(&ParamMap)>) -> ListenerId {
        self.listeners.on(listener)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn patch(&self, patch: ParamPatch) {
        if patch.is_empty() {
            return;
        }
        self.enqueue(Change::Patch(patch));
    }

    fn claim_keys(&self, owner: &str, keys: &[String]) {
        let mut owners = self.owners.borrow_mut();
        for key in keys {
            if let Some(held_by) = owners.get(key) {
                tracing::warn!(key = %key, held_by = %held_by, claimed_by = %owner, "parameter key claimed twice");
                self.conflicts.borrow_mut().push(KeyConflict {
                    key: key.clone(),
                    held_by: held_by.clone(),
                    claimed_by: owner.to_string(),
                });
                continue;
            }
            owners.insert(key.clone(), owner.to_string());
        }
    }

    fn release_keys(&self, owner: &str, keys: &[String]) {
        let mut owners = self.owners.borrow_mut();
        for key in keys {
            if owners.get(key).is_some_and(|held_by| held_by == owner) {
                owners.remove(key);
            }
        }
    }
}

impl fmt::Debug for MemoryParamStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryParamStore")
            .field("params", &*self.params.borrow())
            .field("revision", &self.revision.get())
            .field("subscribers", &self.listeners.len())
            .finish()
    }
}
