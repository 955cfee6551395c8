//! Error types for the dispatching engine.
//!
//! Rule elements report failures through [`RuleError`]. The calculator never
//! catches them; they are wrapped with the rule key into [`DispatchError`] and
//! propagated to whoever drives the simulation, which aborts the pass.

use thiserror::Error;

use crate::models::{ActivityId, ResourceId};

/// Failure raised by a rule element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("invalid rule settings: {0}")]
    Configuration(String),
}

/// The crate-level error type.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("rule '{key}' failed: {source}")]
    Rule {
        key: String,
        #[source]
        source: RuleError,
    },

    #[error("rule '{key}' rejected its settings: {source}")]
    RuleConfiguration {
        key: String,
        #[source]
        source: RuleError,
    },

    #[error("rule '{0}' registered more than once")]
    DuplicateRule(String),

    #[error("activity {0} not found")]
    UnknownActivity(ActivityId),

    #[error("resource {0} not found")]
    UnknownResource(ResourceId),

    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Shorthand result type for the crate.
pub type DispatchResult<T> = Result<T, DispatchError>;
