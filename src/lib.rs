//! Search refinement state kept in sync with a shared parameter store.
//!
//! Every piece of state (query text, filters, sort, compared terms) lives
//! in a [`Stored`] container that owns a disjoint set of store keys. The
//! store is the source of truth: containers write patches to it and adopt
//! the state it echoes back.

mod compare;
mod config;
mod error;
mod field;
mod filter;
mod notifier;
mod params;
mod query;
mod stored;

pub use compare::{CompareCodec, CompareState, CompareTerms};
pub use config::{Capabilities, ParamKeys, SearchConfig};
pub use error::{ConfigError, StateError};
pub use field::{FieldDefinition, FilterConfig};
pub use filter::{
    AdHocFilter, AnyFilter, BooleanFilter, DateFilter, DateRange, Filter, FilterCodec,
    FilterEvent, FilterState, FilterVariant, MultipleChoiceFilter, NumericRange, RangeFilter,
};
pub use notifier::{ListenerId, Notifier};
pub use params::{
    forward_legacy_params, Debouncer, KeyConflict, LegacyKey, MemoryParamStore, ParamMap,
    ParamPatch, ParamSink, ParamStore, ParamValue, DEFAULT_FLUSH_DEBOUNCE,
};
pub use query::backend;
pub use query::{Query, QueryCodec, QueryState, QueryUpdate, Sort, SortDirection};
pub use stored::{StateChange, StateCodec, Stored};
