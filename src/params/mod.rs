//! Parameter Store - the shared, externally owned key-value map.
//!
//! Every stateful piece of the crate persists itself into a [`ParamStore`]
//! (typically mirrored into a URL query string) and reads itself back from
//! the store's change stream. The store is the single source of truth.
//!
//! ## Architecture
//!
//! ```text
//!   caller ──set──▶ Stored<C> ──encode──▶ ParamPatch ──patch──▶ ParamStore
//!                      ▲                                          │
//!                      └────────decode◀──── ParamMap ◀────notify──┘
//! ```
//!
//! `MemoryParamStore` is the included implementation. Binding it to a real
//! navigation mechanism is done through a [`ParamSink`].

mod debounce;
mod in_memory;
mod legacy;

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use crate::notifier::ListenerId;

pub use debounce::Debouncer;
pub use in_memory::{KeyConflict, MemoryParamStore, DEFAULT_FLUSH_DEBOUNCE};
pub use legacy::{forward_legacy_params, LegacyKey};

/// A parameter value: a single string or a list (repeated query keys).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    /// The value as one string. Lists are comma-joined.
    pub fn as_joined(&self) -> String {
        match self {
            ParamValue::Single(value) => value.clone(),
            ParamValue::Multi(values) => values.join(","),
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Single(value) => vec![value.as_str()],
            ParamValue::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::Multi(values)
    }
}

/// Ordered map of parameter keys to values. An absent key is "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap {
    entries: BTreeMap<String, ParamValue>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    /// The value under `key` as one string, if set.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(ParamValue::as_joined)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParamValue> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A copy restricted to `keys`.
    pub fn restrict<S: AsRef<str>>(&self, keys: &[S]) -> ParamMap {
        let mut restricted = ParamMap::new();
        for key in keys {
            if let Some(value) = self.entries.get(key.as_ref()) {
                restricted.insert(key.as_ref(), value.clone());
            }
        }
        restricted
    }

    /// Merge a patch in place. Returns `true` if anything changed.
    pub fn apply(&mut self, patch: &ParamPatch) -> bool {
        let mut changed = false;
        for (key, value) in patch.iter() {
            match value {
                Some(value) => {
                    if self.entries.get(key) != Some(value) {
                        self.entries.insert(key.clone(), value.clone());
                        changed = true;
                    }
                }
                None => {
                    changed |= self.entries.remove(key).is_some();
                }
            }
        }
        changed
    }

    /// Parse a URL query string (with or without the leading `?`).
    ///
    /// Repeated keys collect into [`ParamValue::Multi`]. Pairs that fail to
    /// percent-decode are kept verbatim.
    pub fn from_query_string(query: &str) -> ParamMap {
        let mut map = ParamMap::new();
        let query = query.strip_prefix('?').unwrap_or(query);
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key);
            let value = decode_component(value);
            match map.entries.remove(&key) {
                None => {
                    map.entries.insert(key, ParamValue::Single(value));
                }
                Some(ParamValue::Single(first)) => {
                    map.entries.insert(key, ParamValue::Multi(vec![first, value]));
                }
                Some(ParamValue::Multi(mut values)) => {
                    values.push(value);
                    map.entries.insert(key, ParamValue::Multi(values));
                }
            }
        }
        map
    }

    /// Render as a URL query string without the leading `?`.
    pub fn to_query_string(&self) -> String {
        let mut pairs = Vec::new();
        for (key, value) in &self.entries {
            for value in value.values() {
                pairs.push(format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                ));
            }
        }
        pairs.join("&")
    }
}

impl fmt::Display for ParamMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ParamMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// A partial update of a [`ParamMap`]. `None` deletes the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamPatch {
    entries: BTreeMap<String, Option<ParamValue>>,
}

impl ParamPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.entries.insert(key.into(), Some(value.into()));
    }

    pub fn clear(&mut self, key: impl Into<String>) {
        self.entries.insert(key.into(), None);
    }

    /// Set `key` when `value` is present, clear it otherwise.
    pub fn put(&mut self, key: impl Into<String>, value: Option<String>) {
        self.entries.insert(key.into(), value.map(ParamValue::Single));
    }

    pub fn get(&self, key: &str) -> Option<&Option<ParamValue>> {
        self.entries.get(key)
    }

    /// Later entries win.
    pub fn merge(&mut self, other: ParamPatch) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Option<ParamValue>> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The keys this patch sets, as a map. Cleared keys are dropped.
    pub fn to_params(&self) -> ParamMap {
        self.entries
            .iter()
            .filter_map(|(key, value)| value.clone().map(|value| (key.clone(), value)))
            .collect()
    }
}

/// The Parameter Store contract.
///
/// Implementations use interior mutability: containers share the store
/// through `Rc<dyn ParamStore>` on a single thread.
pub trait ParamStore {
    /// Synchronous snapshot of the live map.
    fn current_params(&self) -> ParamMap;

    /// Register for the full map on every change.
    fn subscribe(&self, listener: Box<dyn Fn(&ParamMap)>) -> ListenerId;

    fn unsubscribe(&self, id: ListenerId);

    /// Merge a patch into the live map and notify subscribers.
    fn patch(&self, patch: ParamPatch);

    /// Record that `owner` reads and writes `keys`.
    fn claim_keys(&self, owner: &str, keys: &[String]);

    /// Drop the claims `owner` holds on `keys`. Claims held by others stay.
    fn release_keys(&self, owner: &str, keys: &[String]);
}

/// Destination of the debounced external flush (e.g. the browser history).
pub trait ParamSink {
    fn publish(&self, params: &ParamMap);
}

impl<F> ParamSink for F
where
    F: Fn(&ParamMap),
{
    fn publish(&self, params: &ParamMap) {
        self(params)
    }
}
