use thiserror::Error;

/// Usage errors raised by state containers.
///
/// These signal a broken caller contract, never a recoverable runtime
/// condition. Malformed parameters coming from the store are not errors:
/// they decode to safe defaults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A mutation was attempted on a container after `complete()`.
    #[error("state container owning [{}] was completed and can no longer be mutated", keys.join(", "))]
    Completed { keys: Vec<String> },
    /// No filter is bound to the requested field.
    #[error("no filter bound to field {0}")]
    UnknownField(String),
}

/// Errors raised while loading a [`SearchConfig`](crate::SearchConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid search config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("field {0} is declared more than once")]
    DuplicateField(String),
    #[error("field {field} uses the reserved parameter key {key}")]
    ReservedKey { field: String, key: String },
    #[error("field {0} has a lower bound greater than its upper bound")]
    InvertedBounds(String),
}
