//! Search configuration: declared fields, reserved parameter keys and
//! store tuning, loadable from JSON.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::field::{FieldDefinition, FilterConfig};
use crate::params::{forward_legacy_params, LegacyKey, MemoryParamStore, ParamMap};

/// Parameter keys owned by the query aggregate and its extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamKeys {
    pub query: String,
    pub search_fields: String,
    pub sort: String,
    pub highlight: String,
    pub compare: String,
    /// Field id (and key) of the reserved tag filter.
    pub tags: String,
}

impl Default for ParamKeys {
    fn default() -> Self {
        Self {
            query: "q".to_string(),
            search_fields: "fields".to_string(),
            sort: "sort".to_string(),
            highlight: "highlight".to_string(),
            compare: "compare".to_string(),
            tags: "tags".to_string(),
        }
    }
}

impl ParamKeys {
    pub fn reserved(&self) -> [&str; 6] {
        [
            self.query.as_str(),
            self.search_fields.as_str(),
            self.sort.as_str(),
            self.highlight.as_str(),
            self.compare.as_str(),
            self.tags.as_str(),
        ]
    }
}

/// Access-control capabilities of the current user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Whether the reserved tag filter is available.
    #[serde(default)]
    pub tags: bool,
}

impl Capabilities {
    pub fn with_tags() -> Self {
        Self { tags: true }
    }
}

fn default_flush_debounce_ms() -> u64 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub keys: ParamKeys,
    #[serde(default = "default_flush_debounce_ms")]
    pub flush_debounce_ms: u64,
    #[serde(default)]
    pub legacy_keys: Vec<LegacyKey>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            keys: ParamKeys::default(),
            flush_debounce_ms: default_flush_debounce_ms(),
            legacy_keys: Vec::new(),
        }
    }
}

impl SearchConfig {
    pub fn new(fields: Vec<FieldDefinition>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SearchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let reserved = self.keys.reserved();
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(field.id.as_str()) {
                return Err(ConfigError::DuplicateField(field.id.clone()));
            }
            if let Some(key) = reserved.iter().find(|key| **key == field.id) {
                return Err(ConfigError::ReservedKey {
                    field: field.id.clone(),
                    key: key.to_string(),
                });
            }
            let inverted = match &field.filter {
                Some(FilterConfig::Date { lower, upper }) => lower > upper,
                Some(FilterConfig::Range { lower, upper }) => lower > upper,
                _ => false,
            };
            if inverted {
                return Err(ConfigError::InvertedBounds(field.id.clone()));
            }
        }
        Ok(())
    }

    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn flush_debounce(&self) -> Duration {
        Duration::from_millis(self.flush_debounce_ms)
    }

    /// The reserved tag field, bound only for users with the capability.
    pub fn tag_field(&self) -> FieldDefinition {
        FieldDefinition::new(self.keys.tags.clone())
            .with_label("Tags")
            .with_filter(FilterConfig::MultipleChoice)
    }

    /// A store seeded from an initial query string, with legacy keys
    /// forwarded and the configured debounce applied.
    pub fn memory_store(&self, query: &str) -> MemoryParamStore {
        let params = forward_legacy_params(&ParamMap::from_query_string(query), &self.legacy_keys);
        MemoryParamStore::with_params(params).with_debounce(self.flush_debounce())
    }
}
