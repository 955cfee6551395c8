//! Rule weight table.
//!
//! Maps a rule key to its configured weight, category scaling, minimum-score
//! gate, resource multiplier and early-window penalty. Every field of a
//! [`WeightEntry`] is independently "set" or "unset", so a delta merges into
//! the live table without disturbing fields it does not mention.
//!
//! A key with no entry (or a field left unset) resolves to a neutral
//! default: zero points, no category scaling, no gate, no adjustment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Score;

/// Shape of the early-window penalty as a function of how deep into the
/// window the candidate start sits (`fraction` in `0..=1`, 1 = window start).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PenaltyCurve {
    /// Penalty proportional to the fraction.
    #[default]
    Linear,
    /// Penalty grows with the square of the fraction.
    Quadratic,
    /// Full penalty anywhere inside the window.
    Step,
}

impl PenaltyCurve {
    /// Maps a window fraction to a penalty share in `0..=1`.
    pub fn shape(self, fraction: Decimal) -> Decimal {
        let f = fraction.clamp(Decimal::ZERO, Decimal::ONE);
        match self {
            PenaltyCurve::Linear => f,
            PenaltyCurve::Quadratic => f * f,
            PenaltyCurve::Step => {
                if f.is_zero() {
                    Decimal::ZERO
                } else {
                    Decimal::ONE
                }
            }
        }
    }
}

/// Configuration of one rule. `None` = not set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Score>,
    /// 0 disables alternate-resource adjustment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_multiplier: Option<Score>,
    /// 0 disables the rule unless category scaling is prevented.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_multiplier: Option<Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevent_category_scaling: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_score: Option<Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_minimum_score: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_penalty: Option<Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_penalty: Option<Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalty_curve: Option<PenaltyCurve>,
}

impl WeightEntry {
    /// Creates an entry with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_points(mut self, points: Score) -> Self {
        self.points = Some(points);
        self
    }

    pub fn with_resource_multiplier(mut self, multiplier: Score) -> Self {
        self.resource_multiplier = Some(multiplier);
        self
    }

    pub fn with_category_multiplier(mut self, multiplier: Score) -> Self {
        self.category_multiplier = Some(multiplier);
        self
    }

    pub fn with_prevent_category_scaling(mut self, prevent: bool) -> Self {
        self.prevent_category_scaling = Some(prevent);
        self
    }

    /// Sets and enables a minimum-score gate.
    pub fn with_minimum_score(mut self, minimum: Score) -> Self {
        self.minimum_score = Some(minimum);
        self.use_minimum_score = Some(true);
        self
    }

    pub fn with_use_minimum_score(mut self, enabled: bool) -> Self {
        self.use_minimum_score = Some(enabled);
        self
    }

    /// Sets the early-window penalty bounds and curve.
    pub fn with_penalty(mut self, min: Score, max: Score, curve: PenaltyCurve) -> Self {
        self.min_penalty = Some(min);
        self.max_penalty = Some(max);
        self.penalty_curve = Some(curve);
        self
    }

    /// Overwrites the fields set in `delta`, keeping all others.
    pub fn merge(&mut self, delta: &WeightEntry) {
        fn take<T: Copy>(slot: &mut Option<T>, incoming: Option<T>) {
            if incoming.is_some() {
                *slot = incoming;
            }
        }
        take(&mut self.points, delta.points);
        take(&mut self.resource_multiplier, delta.resource_multiplier);
        take(&mut self.category_multiplier, delta.category_multiplier);
        take(&mut self.prevent_category_scaling, delta.prevent_category_scaling);
        take(&mut self.minimum_score, delta.minimum_score);
        take(&mut self.use_minimum_score, delta.use_minimum_score);
        take(&mut self.min_penalty, delta.min_penalty);
        take(&mut self.max_penalty, delta.max_penalty);
        take(&mut self.penalty_curve, delta.penalty_curve);
    }

    /// Resolves unset fields to their neutral defaults.
    pub fn resolve(&self) -> ResolvedWeight {
        let prevent = self.prevent_category_scaling.unwrap_or(false);
        let category_multiplier = if prevent {
            Decimal::ONE
        } else {
            self.category_multiplier.unwrap_or(Decimal::ONE)
        };
        let minimum_score = match (self.use_minimum_score, self.minimum_score) {
            (Some(true), Some(min)) => Some(min),
            _ => None,
        };
        ResolvedWeight {
            points: self.points.unwrap_or(Decimal::ZERO),
            category_multiplier,
            resource_multiplier: self.resource_multiplier.unwrap_or(Decimal::ZERO),
            minimum_score,
            min_penalty: self.min_penalty.unwrap_or(Decimal::ZERO),
            max_penalty: self.max_penalty.unwrap_or(Decimal::ZERO),
            penalty_curve: self.penalty_curve.unwrap_or_default(),
        }
    }
}

/// A weight entry with every field resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWeight {
    pub points: Score,
    pub category_multiplier: Score,
    pub resource_multiplier: Score,
    /// Gate threshold, present only when the gate is enabled.
    pub minimum_score: Option<Score>,
    pub min_penalty: Score,
    pub max_penalty: Score,
    pub penalty_curve: PenaltyCurve,
}

impl ResolvedWeight {
    /// Factor applied to a weighted rule's score.
    pub fn factor(&self) -> Score {
        self.points.saturating_mul(self.category_multiplier)
    }

    /// Whether a weighted rule with this weight can affect a composite.
    pub fn calculate_scores(&self) -> bool {
        !self.factor().is_zero()
    }
}

impl Default for ResolvedWeight {
    fn default() -> Self {
        WeightEntry::default().resolve()
    }
}

/// Rule key → weight entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable {
    entries: BTreeMap<String, WeightEntry>,
}

/// A partial update: only the entries and fields it sets are applied.
pub type WeightDelta = WeightTable;

impl WeightTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert (replaces any existing entry).
    pub fn with_entry(mut self, key: impl Into<String>, entry: WeightEntry) -> Self {
        self.set(key, entry);
        self
    }

    /// Replaces the entry for `key`.
    pub fn set(&mut self, key: impl Into<String>, entry: WeightEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn get(&self, key: &str) -> Option<&WeightEntry> {
        self.entries.get(key)
    }

    /// Resolved weight for `key`; neutral defaults when absent.
    pub fn resolve(&self, key: &str) -> ResolvedWeight {
        self.get(key).map(WeightEntry::resolve).unwrap_or_default()
    }

    /// Merges a delta field by field. Entries absent from the delta are
    /// untouched; keys new to the table are added.
    pub fn apply_delta(&mut self, delta: &WeightDelta) {
        for (key, incoming) in &delta.entries {
            self.entries
                .entry(key.clone())
                .or_default()
                .merge(incoming);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
