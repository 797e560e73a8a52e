use std::rc::Rc;

use serde_json::Value;

use super::{
    AdHocFilter, BooleanFilter, DateFilter, Filter, FilterVariant, MultipleChoiceFilter,
    RangeFilter,
};
use crate::error::StateError;
use crate::field::{FieldDefinition, FilterConfig};
use crate::notifier::ListenerId;
use crate::params::{ParamPatch, ParamStore};

/// A filter transition that touched the active side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEvent {
    pub field: String,
    pub was_active: bool,
    pub is_active: bool,
}

/// A bound filter of any kind.
///
/// Cloning shares the underlying filter.
#[derive(Debug, Clone)]
pub enum AnyFilter {
    Date(Rc<Filter<DateFilter>>),
    Boolean(Rc<Filter<BooleanFilter>>),
    MultipleChoice(Rc<Filter<MultipleChoiceFilter>>),
    Range(Rc<Filter<RangeFilter>>),
    AdHoc(Rc<Filter<AdHocFilter>>),
}

macro_rules! each_filter {
    ($any:expr, $filter:ident => $body:expr) => {
        match $any {
            AnyFilter::Date($filter) => $body,
            AnyFilter::Boolean($filter) => $body,
            AnyFilter::MultipleChoice($filter) => $body,
            AnyFilter::Range($filter) => $body,
            AnyFilter::AdHoc($filter) => $body,
        }
    };
}

impl AnyFilter {
    /// Bind the filter declared by `field`.
    pub fn bind(field: &FieldDefinition, store: Rc<dyn ParamStore>) -> AnyFilter {
        let field = field.clone();
        match field.filter.clone() {
            Some(FilterConfig::Date { lower, upper }) => {
                AnyFilter::Date(Rc::new(Filter::new(field, DateFilter::new(lower, upper), store)))
            }
            Some(FilterConfig::Boolean) => {
                AnyFilter::Boolean(Rc::new(Filter::new(field, BooleanFilter, store)))
            }
            Some(FilterConfig::MultipleChoice) => AnyFilter::MultipleChoice(Rc::new(Filter::new(
                field,
                MultipleChoiceFilter,
                store,
            ))),
            Some(FilterConfig::Range { lower, upper }) => {
                AnyFilter::Range(Rc::new(Filter::new(field, RangeFilter::new(lower, upper), store)))
            }
            None => AnyFilter::AdHoc(Rc::new(Filter::new(field, AdHocFilter, store))),
        }
    }

    pub fn field(&self) -> &FieldDefinition {
        each_filter!(self, filter => filter.field())
    }

    pub fn key(&self) -> &str {
        each_filter!(self, filter => filter.key())
    }

    pub fn is_active(&self) -> bool {
        each_filter!(self, filter => filter.is_active())
    }

    pub fn is_default(&self) -> bool {
        each_filter!(self, filter => filter.is_default())
    }

    pub fn is_completed(&self) -> bool {
        each_filter!(self, filter => filter.is_completed())
    }

    /// Current data in its parameter encoding.
    pub fn data_string(&self) -> String {
        each_filter!(self, filter => filter.data_string())
    }

    pub fn set_from_string(&self, value: &str) -> Result<(), StateError> {
        each_filter!(self, filter => filter.set_from_string(value))
    }

    pub fn set_to_value(&self, value: &Value) -> Result<bool, StateError> {
        each_filter!(self, filter => filter.set_to_value(value))
    }

    pub fn reset(&self) -> Result<(), StateError> {
        each_filter!(self, filter => filter.reset())
    }

    pub fn activate(&self) -> Result<(), StateError> {
        each_filter!(self, filter => filter.activate())
    }

    pub fn deactivate(&self) -> Result<(), StateError> {
        each_filter!(self, filter => filter.deactivate())
    }

    pub fn toggle(&self) -> Result<(), StateError> {
        each_filter!(self, filter => filter.toggle())
    }

    pub fn to_patch(&self) -> ParamPatch {
        each_filter!(self, filter => filter.to_patch())
    }

    pub fn to_backend_query(&self) -> Option<Value> {
        each_filter!(self, filter => filter.to_backend_query())
    }

    /// The parameter encoding of the data a backend clause selects, or
    /// `None` when the clause does not map onto this filter.
    pub fn encode_backend_clause(&self, clause: &Value) -> Option<String> {
        each_filter!(self, filter => {
            let variant = filter.variant();
            variant
                .data_from_backend_clause(filter.key(), clause)
                .map(|data| variant.normalize(data))
                .filter(|data| *data != filter.default_data())
                .map(|data| variant.data_to_string(&data))
        })
    }

    /// Register for transitions touching the active side.
    pub fn on_update<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&FilterEvent) + 'static,
    {
        each_filter!(self, filter => {
            let field = filter.key().to_string();
            filter.on_update(move |change| {
                listener(&FilterEvent {
                    field: field.clone(),
                    was_active: change.previous.active,
                    is_active: change.current.active,
                })
            })
        })
    }

    pub fn remove_update_listener(&self, id: ListenerId) -> bool {
        each_filter!(self, filter => filter.remove_update_listener(id))
    }

    pub fn complete(&self) {
        each_filter!(self, filter => filter.complete())
    }

    /// `true` when both handles refer to the same bound filter.
    pub fn same_filter(&self, other: &AnyFilter) -> bool {
        match (self, other) {
            (AnyFilter::Date(a), AnyFilter::Date(b)) => Rc::ptr_eq(a, b),
            (AnyFilter::Boolean(a), AnyFilter::Boolean(b)) => Rc::ptr_eq(a, b),
            (AnyFilter::MultipleChoice(a), AnyFilter::MultipleChoice(b)) => Rc::ptr_eq(a, b),
            (AnyFilter::Range(a), AnyFilter::Range(b)) => Rc::ptr_eq(a, b),
            (AnyFilter::AdHoc(a), AnyFilter::AdHoc(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_date(&self) -> Option<&Rc<Filter<DateFilter>>> {
        match self {
            AnyFilter::Date(filter) => Some(filter),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<&Rc<Filter<BooleanFilter>>> {
        match self {
            AnyFilter::Boolean(filter) => Some(filter),
            _ => None,
        }
    }

    pub fn as_multiple_choice(&self) -> Option<&Rc<Filter<MultipleChoiceFilter>>> {
        match self {
            AnyFilter::MultipleChoice(filter) => Some(filter),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&Rc<Filter<RangeFilter>>> {
        match self {
            AnyFilter::Range(filter) => Some(filter),
            _ => None,
        }
    }

    pub fn as_ad_hoc(&self) -> Option<&Rc<Filter<AdHocFilter>>> {
        match self {
            AnyFilter::AdHoc(filter) => Some(filter),
            _ => None,
        }
    }

    /// An independent copy of the same kind bound to `store`.
    pub(crate) fn fork(&self, store: Rc<dyn ParamStore>) -> AnyFilter {
        match self {
            AnyFilter::Date(filter) => AnyFilter::Date(Rc::new(filter.fork(store))),
            AnyFilter::Boolean(filter) => AnyFilter::Boolean(Rc::new(filter.fork(store))),
            AnyFilter::MultipleChoice(filter) => {
                AnyFilter::MultipleChoice(Rc::new(filter.fork(store)))
            }
            AnyFilter::Range(filter) => AnyFilter::Range(Rc::new(filter.fork(store))),
            AnyFilter::AdHoc(filter) => AnyFilter::AdHoc(Rc::new(filter.fork(store))),
        }
    }
}
