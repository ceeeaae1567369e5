//! Declarative rule engine interface.
//!
//! The engine owns the active dynamic rule set and evaluates requests against
//! it. Callers never patch individual rules: they hand over a
//! [`RuleSetUpdate`] that removes and adds in one atomic step.

mod memory;
mod pattern;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rerouter_core::{ResourceType, RuleId};

use crate::dnr::DnrRule;

pub use self::memory::InMemoryEngine;
pub use self::pattern::{substitution_template, url_filter_to_regex};

/// Errors reported by an engine when an update is rejected.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A rule could not be compiled. The previous rule set stays active.
    #[error("rule {id} rejected: {reason}")]
    InvalidRule { id: RuleId, reason: String },

    /// Two rules in the resulting set share an id.
    #[error("duplicate rule id {0}")]
    DuplicateRuleId(RuleId),
}

/// Replacement of part or all of the dynamic rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetUpdate {
    pub remove_rule_ids: Vec<RuleId>,
    pub add_rules: Vec<DnrRule>,
}

/// Outcome of evaluating a request: which rule fired and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub rule_id: RuleId,
    pub url: String,
}

#[async_trait]
pub trait DeclarativeEngine: Send + Sync {
    /// The currently active dynamic rules, ordered by id.
    async fn dynamic_rules(&self) -> Result<Vec<DnrRule>, EngineError>;

    /// Apply removals then additions atomically. On error nothing changes.
    async fn update_dynamic_rules(&self, update: RuleSetUpdate) -> Result<(), EngineError>;

    /// Evaluate a request URL against the active rules without side effects.
    async fn test_match_outcome(
        &self,
        url: &str,
        resource_type: ResourceType,
    ) -> Result<Option<Redirect>, EngineError>;
}
