//! Error types for rule management.

use rerouter_core::RuleId;
use rerouter_storage::StorageError;

use crate::engine::EngineError;

/// Errors surfaced by the rule store, service and converters.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// A mutation referenced an id that is not in the store.
    #[error("rule not found: {0}")]
    NotFound(RuleId),

    /// Import input is neither the native array nor a third-party export.
    #[error("invalid import format: {0}")]
    InvalidFormat(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The engine refused the rebuilt rule set.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
