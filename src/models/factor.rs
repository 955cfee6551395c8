//! Factor scores: the per-rule breakdown of a composite.
//!
//! Attached to the activity after each composite evaluation so reporting
//! layers can show why an activity ranked where it did.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ResourceId;

/// One rule's share of a composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    /// Key of the rule that produced this factor.
    pub rule_key: String,
    /// Display name of the rule.
    pub rule_name: String,
    /// Rule score after adjustment, penalty and clamping, before weighting.
    pub raw_score: Decimal,
    /// Weighted amount added to the composite.
    pub score: Decimal,
    /// `|score| / sum(|score|)` over all factors of the composite (0..=1).
    pub contribution: Decimal,
    /// Resource the score was computed against.
    pub resource_id: ResourceId,
}

impl FactorScore {
    /// Creates a factor with no contribution assigned yet.
    pub fn new(
        rule_key: impl Into<String>,
        rule_name: impl Into<String>,
        raw_score: Decimal,
        score: Decimal,
        resource_id: ResourceId,
    ) -> Self {
        Self {
            rule_key: rule_key.into(),
            rule_name: rule_name.into(),
            raw_score,
            score,
            contribution: Decimal::ZERO,
            resource_id,
        }
    }

    /// Contribution as a percentage (0..=100).
    pub fn contribution_percent(&self) -> Decimal {
        self.contribution * Decimal::ONE_HUNDRED
    }
}
