//! Filters - toggleable, typed predicates bound to one field.
//!
//! A [`Filter`] is a [`Stored`] container over [`FilterState`] whose
//! encoding is supplied by a [`FilterVariant`]. Semantics:
//!
//! - A filter whose data equals the variant's default data is inactive.
//! - Setting non-default data activates the filter.
//! - An inactive filter writes nothing to the store, so all inactive
//!   filters are indistinguishable from the store's point of view.
//! - The update signal only fires for transitions that touch the active
//!   side; inactive-to-inactive changes are invisible outside.

mod ad_hoc;
mod any;
mod boolean;
mod date;
mod multiple_choice;
mod range;

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::StateError;
use crate::field::FieldDefinition;
use crate::notifier::{ListenerId, Notifier};
use crate::params::{ParamMap, ParamPatch, ParamStore};
use crate::stored::{StateChange, StateCodec, Stored};

pub use ad_hoc::AdHocFilter;
pub use any::{AnyFilter, FilterEvent};
pub use boolean::BooleanFilter;
pub use date::{DateFilter, DateRange};
pub use multiple_choice::MultipleChoiceFilter;
pub use range::{NumericRange, RangeFilter};

/// Codec and backend mapping for one kind of filter data.
///
/// Variants are stateless: they are built once per field definition and
/// never change while the filter is bound.
pub trait FilterVariant: Clone + 'static {
    type Data: Clone + PartialEq + fmt::Debug + 'static;

    /// The "no selection" value.
    fn default_data(&self) -> Self::Data;

    /// Canonical form of `data`. Every normalized value survives
    /// `data_from_string(data_to_string(..))` unchanged.
    fn normalize(&self, data: Self::Data) -> Self::Data {
        data
    }

    fn data_to_string(&self, data: &Self::Data) -> String;

    /// Total: malformed input decodes to [`default_data`](Self::default_data).
    fn data_from_string(&self, value: &str) -> Self::Data;

    /// Data selecting exactly one concrete field value, if `value` fits.
    fn data_from_value(&self, value: &Value) -> Option<Self::Data>;

    /// The backend filter clause selecting `data` on `field`.
    fn to_backend_clause(&self, field: &str, data: &Self::Data) -> Value;

    /// Reverse of [`to_backend_clause`](Self::to_backend_clause).
    fn data_from_backend_clause(&self, field: &str, clause: &Value) -> Option<Self::Data>;
}

/// Active flag plus the filter's current data.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState<D> {
    pub active: bool,
    pub data: D,
}

/// [`StateCodec`] adapting a [`FilterVariant`] to one parameter key.
#[derive(Debug, Clone)]
pub struct FilterCodec<V: FilterVariant> {
    key: String,
    variant: V,
    default: V::Data,
}

impl<V: FilterVariant> FilterCodec<V> {
    pub fn new(key: impl Into<String>, variant: V) -> Self {
        let default = variant.default_data();
        Self {
            key: key.into(),
            variant,
            default,
        }
    }

    /// Present key: active with the decoded data. Absent key: inactive,
    /// keeping the last held data so re-activation restores it.
    pub fn store_to_state(
        &self,
        params: &ParamMap,
        previous: Option<&FilterState<V::Data>>,
    ) -> FilterState<V::Data> {
        match params.get_str(&self.key) {
            Some(value) => {
                let data = self.variant.normalize(self.variant.data_from_string(&value));
                FilterState {
                    active: data != self.default,
                    data,
                }
            }
            None => FilterState {
                active: false,
                data: previous
                    .map(|state| state.data.clone())
                    .unwrap_or_else(|| self.default.clone()),
            },
        }
    }

    pub fn state_to_store(&self, state: &FilterState<V::Data>) -> ParamPatch {
        let mut patch = ParamPatch::new();
        patch.put(
            self.key.clone(),
            state
                .active
                .then(|| self.variant.data_to_string(&state.data)),
        );
        patch
    }
}

impl<V: FilterVariant> StateCodec for FilterCodec<V> {
    type State = FilterState<V::Data>;

    fn keys(&self) -> Vec<String> {
        vec![self.key.clone()]
    }

    fn decode(&self, params: &ParamMap, previous: Option<&Self::State>) -> Self::State {
        self.store_to_state(params, previous)
    }

    fn encode(&self, state: &Self::State) -> ParamPatch {
        self.state_to_store(state)
    }
}

/// A filter bound to a field and a [`ParamStore`].
pub struct Filter<V: FilterVariant> {
    field: FieldDefinition,
    stored: Stored<FilterCodec<V>>,
    updates: Rc<Notifier<StateChange<FilterState<V::Data>>>>,
}

impl<V: FilterVariant> Filter<V> {
    /// Bind a filter for `field`, keyed by the field id.
    pub fn new(field: FieldDefinition, variant: V, store: Rc<dyn ParamStore>) -> Self {
        let codec = FilterCodec::new(field.id.clone(), variant);
        let stored = Stored::new(format!("filter:{}", field.id), store, codec);

        let updates = Rc::new(Notifier::new());
        let forward = Rc::clone(&updates);
        stored.on_change(move |change: &StateChange<FilterState<V::Data>>| {
            if change.previous.active || change.current.active {
                forward.emit(change);
            }
        });

        Filter {
            field,
            stored,
            updates,
        }
    }

    pub fn field(&self) -> &FieldDefinition {
        &self.field
    }

    pub fn key(&self) -> &str {
        &self.field.id
    }

    pub fn variant(&self) -> &V {
        &self.stored.codec().variant
    }

    pub fn default_data(&self) -> V::Data {
        self.stored.codec().default.clone()
    }

    pub fn current_state(&self) -> FilterState<V::Data> {
        self.stored.current_state()
    }

    pub fn current_data(&self) -> V::Data {
        self.stored.with_state(|state| state.data.clone())
    }

    pub fn is_active(&self) -> bool {
        self.stored.with_state(|state| state.active)
    }

    pub fn is_default(&self) -> bool {
        let default = &self.stored.codec().default;
        self.stored.with_state(|state| state.data == *default)
    }

    pub fn is_completed(&self) -> bool {
        self.stored.is_completed()
    }

    /// Store `data`; activates unless it is the default data.
    pub fn set(&self, data: V::Data) -> Result<(), StateError> {
        let data = self.variant().normalize(data);
        let active = data != self.stored.codec().default;
        if active {
            return self.stored.set_state(FilterState { active, data });
        }
        // Clearing the key echoes back as "absent", which keeps the held
        // data; the default has to be adopted directly.
        self.stored.set_state(FilterState {
            active: false,
            data: data.clone(),
        })?;
        self.stored.force_state(FilterState {
            active: false,
            data,
        })
    }

    /// Store the data selecting exactly `value`. Returns `false` when the
    /// value cannot be expressed by this filter.
    pub fn set_to_value(&self, value: &Value) -> Result<bool, StateError> {
        self.stored.ensure_live()?;
        match self.variant().data_from_value(value) {
            Some(data) => {
                self.set(data)?;
                Ok(true)
            }
            None => {
                tracing::warn!(field = %self.field.id, value = %value, "value cannot be selected by filter");
                Ok(false)
            }
        }
    }

    /// Decode `value` with the variant's string codec and store it.
    pub fn set_from_string(&self, value: &str) -> Result<(), StateError> {
        self.set(self.variant().data_from_string(value))
    }

    /// Deactivate and store the default data.
    pub fn reset(&self) -> Result<(), StateError> {
        self.set(self.default_data())
    }

    /// No-op while the data is the default data.
    pub fn activate(&self) -> Result<(), StateError> {
        self.stored.ensure_live()?;
        if self.is_default() {
            tracing::trace!(field = %self.field.id, "refusing to activate default filter");
            return Ok(());
        }
        self.stored.set_params(|state| state.active = true)
    }

    pub fn deactivate(&self) -> Result<(), StateError> {
        self.stored.set_params(|state| state.active = false)
    }

    pub fn toggle(&self) -> Result<(), StateError> {
        if self.is_active() {
            self.deactivate()
        } else {
            self.activate()
        }
    }

    pub fn store_to_state(&self, params: &ParamMap) -> FilterState<V::Data> {
        self.stored
            .with_state(|state| self.stored.codec().store_to_state(params, Some(state)))
    }

    pub fn state_to_store(&self, state: &FilterState<V::Data>) -> ParamPatch {
        self.stored.codec().state_to_store(state)
    }

    /// The patch describing the current state.
    pub fn to_patch(&self) -> ParamPatch {
        self.stored.to_patch()
    }

    /// Current data in its parameter encoding.
    pub fn data_string(&self) -> String {
        self.stored
            .with_state(|state| self.variant().data_to_string(&state.data))
    }

    /// The backend clause, only while active.
    pub fn to_backend_query(&self) -> Option<Value> {
        self.stored.with_state(|state| {
            state
                .active
                .then(|| self.variant().to_backend_clause(&self.field.id, &state.data))
        })
    }

    /// Register for transitions that touch the active side.
    pub fn on_update<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StateChange<FilterState<V::Data>>) + 'static,
    {
        self.updates.on(listener)
    }

    pub fn remove_update_listener(&self, id: ListenerId) -> bool {
        self.updates.remove(id)
    }

    pub fn complete(&self) {
        self.stored.complete();
    }

    /// An independent copy bound to `store`, carrying this filter's state.
    pub(crate) fn fork(&self, store: Rc<dyn ParamStore>) -> Self {
        let fork = Filter::new(self.field.clone(), self.variant().clone(), store);
        fork.stored.adopt(self.current_state());
        fork
    }
}

impl<V: FilterVariant> fmt::Debug for Filter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("field", &self.field.id)
            .field("state", &self.current_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::NaiveDate;

    use super::*;
    use crate::params::MemoryParamStore;

    fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, month, day)
    }

    fn date_filter(store: &Rc<MemoryParamStore>) -> Filter<DateFilter> {
        let lower = NaiveDate::from_ymd_opt(1800, 1, 1).unwrap();
        let upper = NaiveDate::from_ymd_opt(1899, 12, 31).unwrap();
        Filter::new(
            FieldDefinition::new("date"),
            DateFilter::new(lower, upper),
            store.clone(),
        )
    }

    fn choice_filter(store: &Rc<MemoryParamStore>) -> Filter<MultipleChoiceFilter> {
        Filter::new(
            FieldDefinition::new("language"),
            MultipleChoiceFilter,
            store.clone(),
        )
    }

    fn count_updates<V: FilterVariant>(filter: &Filter<V>) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        filter.on_update(move |_| counter.set(counter.get() + 1));
        count
    }

    #[test]
    fn date_scenario() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = date_filter(&store);
        let default = DateRange {
            min: ymd(1800, 1, 1),
            max: ymd(1899, 12, 31),
        };
        assert_eq!(filter.default_data(), default);
        assert!(!filter.is_active());

        let chosen = DateRange {
            min: ymd(1850, 1, 1),
            max: ymd(1860, 12, 31),
        };
        filter.set(chosen).unwrap();
        assert!(filter.is_active());
        assert_eq!(filter.data_string(), "1850-01-01:1860-12-31");
        assert_eq!(
            store.current_params().get_str("date").as_deref(),
            Some("1850-01-01:1860-12-31")
        );
        assert_eq!(filter.variant().data_from_string("1850-01-01:1860-12-31"), chosen);

        filter.reset().unwrap();
        assert_eq!(
            filter.current_state(),
            FilterState {
                active: false,
                data: default
            }
        );
        assert!(!store.current_params().contains_key("date"));
    }

    #[test]
    fn setting_default_data_deactivates() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = choice_filter(&store);

        filter.set(vec!["en".to_string()]).unwrap();
        assert!(filter.is_active());

        filter.set(Vec::new()).unwrap();
        assert!(!filter.is_active());
        assert!(!store.current_params().contains_key("language"));
    }

    #[test]
    fn activate_is_a_no_op_on_default_data() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = choice_filter(&store);

        filter.activate().unwrap();
        assert!(!filter.is_active());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn toggle_twice_restores_active_flag_and_data() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = choice_filter(&store);
        filter
            .set(vec!["en".to_string(), "de".to_string()])
            .unwrap();
        let data = vec!["de".to_string(), "en".to_string()];
        assert_eq!(filter.current_data(), data);

        filter.toggle().unwrap();
        assert!(!filter.is_active());
        assert_eq!(filter.current_data(), data);

        filter.toggle().unwrap();
        assert!(filter.is_active());
        assert_eq!(filter.current_data(), data);
    }

    #[test]
    fn updates_fire_only_across_the_active_side() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = choice_filter(&store);
        let updates = count_updates(&filter);

        filter.set(Vec::new()).unwrap();
        filter.reset().unwrap();
        assert_eq!(updates.get(), 0);

        filter.set(vec!["en".to_string()]).unwrap();
        assert_eq!(updates.get(), 1);

        filter.set(Vec::new()).unwrap();
        assert_eq!(updates.get(), 2);
    }

    #[test]
    fn external_removal_keeps_last_data() {
        let store = Rc::new(MemoryParamStore::from_query_string("language=en,fr"));
        let filter = choice_filter(&store);
        assert!(filter.is_active());

        store.navigate(ParamMap::new());
        assert!(!filter.is_active());
        assert_eq!(filter.current_data(), vec!["en".to_string(), "fr".to_string()]);

        filter.activate().unwrap();
        assert!(filter.is_active());
        assert_eq!(
            store.current_params().get_str("language").as_deref(),
            Some("en,fr")
        );
    }

    #[test]
    fn reset_while_inactive_discards_held_data_without_writing() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = choice_filter(&store);
        filter.set(vec!["en".to_string()]).unwrap();
        filter.deactivate().unwrap();
        let revision = store.revision();

        filter.reset().unwrap();

        assert!(filter.is_default());
        assert!(!filter.is_active());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn setting_default_data_drops_held_data() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = choice_filter(&store);
        filter.set(vec!["en".to_string()]).unwrap();
        filter.deactivate().unwrap();

        filter.set(Vec::new()).unwrap();
        assert!(filter.is_default());

        filter.activate().unwrap();
        assert!(!filter.is_active());
        assert!(store.current_params().is_empty());
    }

    #[test]
    fn choice_order_does_not_change_state() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = choice_filter(&store);
        let updates = count_updates(&filter);

        filter.set(vec!["a".to_string(), "b".to_string()]).unwrap();
        let revision = store.revision();
        filter.set(vec!["b".to_string(), "a".to_string()]).unwrap();

        assert_eq!(store.revision(), revision);
        assert_eq!(updates.get(), 1);
        assert_eq!(filter.data_string(), "a,b");
    }

    #[test]
    fn malformed_parameter_decodes_inactive() {
        let store = Rc::new(MemoryParamStore::from_query_string("date=not-a-date"));
        let filter = date_filter(&store);
        assert!(!filter.is_active());
        assert!(filter.is_default());
    }

    #[test]
    fn backend_query_only_while_active() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = choice_filter(&store);
        assert_eq!(filter.to_backend_query(), None);

        filter.set(vec!["en".to_string()]).unwrap();
        assert_eq!(
            filter.to_backend_query(),
            Some(serde_json::json!({"terms": {"language": ["en"]}}))
        );
    }

    #[test]
    fn set_to_value_selects_single_value() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = date_filter(&store);

        assert!(filter.set_to_value(&serde_json::json!("1855-06-01")).unwrap());
        assert_eq!(filter.data_string(), "1855-06-01:1855-06-01");
        assert!(!filter.set_to_value(&serde_json::json!(true)).unwrap());
    }

    #[test]
    fn completed_filter_rejects_mutation() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = choice_filter(&store);
        filter.set(vec!["en".to_string()]).unwrap();

        filter.complete();

        assert!(store.current_params().is_empty());
        assert!(matches!(
            filter.set(vec!["fr".to_string()]),
            Err(StateError::Completed { .. })
        ));
        assert!(filter.toggle().is_err());
    }

    #[test]
    fn completed_default_filter_rejects_activation() {
        let store = Rc::new(MemoryParamStore::new());
        let filter = date_filter(&store);

        filter.complete();

        assert!(matches!(
            filter.activate(),
            Err(StateError::Completed { .. })
        ));
        assert!(filter.set_to_value(&serde_json::json!(true)).is_err());
        assert!(filter
            .set_to_value(&serde_json::json!("1855-06-01"))
            .is_err());
    }
}
