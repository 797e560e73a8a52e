use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A searchable field of the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Backend field name; also the parameter key of the field's filter.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Declared filter kind. Fields without one get an ad-hoc filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,
}

impl FieldDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            filter: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = Some(filter);
        self
    }

    /// The label, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

/// The closed set of declared filter kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterConfig {
    /// Inclusive date range bounded by the field's known extent.
    Date { lower: NaiveDate, upper: NaiveDate },
    Boolean,
    MultipleChoice,
    /// Inclusive numeric range bounded by the field's known extent.
    Range { lower: f64, upper: f64 },
}
