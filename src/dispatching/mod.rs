//! Rule elements, composite scoring and dispatch lists.
//!
//! A resource asks its [`SortedDispatchList`] for the next activity. The list
//! builds a [`DispatchKey`] for every ready activity through the
//! [`CompositeCalculator`], which runs the registered [`RuleElement`]s,
//! serves resource-independent scores from its cache, applies the
//! alternate-resource adjustment and early-window penalties, and enforces
//! minimum-score gates.
//!
//! # Usage
//!
//! ```
//! use u_dispatch::dispatching::{
//!     rules, CompositeCalculator, DispatchSettings, RuleRegistry, SimulationContext,
//!     SimulationMode, WeightEntry, WeightTable,
//! };
//! use u_dispatch::models::{Activity, Resource};
//! use rust_decimal::Decimal;
//!
//! let registry = RuleRegistry::new().with_rule(rules::Priority);
//! let weights = WeightTable::new().with_entry(
//!     rules::Priority::KEY,
//!     WeightEntry::new().with_points(Decimal::from(2)),
//! );
//! let mut calculator =
//!     CompositeCalculator::initialize(registry, weights, &DispatchSettings::default()).unwrap();
//!
//! let context = SimulationContext::at_time(0)
//!     .with_mode(SimulationMode::Optimize)
//!     .with_resource(Resource::new(1));
//! let mut activity = Activity::new(7).with_priority(5).with_eligible(1);
//! let resource = context.resource(1).unwrap();
//! let composite = calculator.compute_composite(resource, &mut activity, &context).unwrap();
//! assert_eq!(composite, Decimal::from(10));
//! ```
//!
//! # Score Convention
//! **Higher composite = higher priority.** Rules return larger values for
//! activities that should run first.

mod cache;
mod calculator;
mod context;
mod key;
mod list;
mod registry;
pub mod rules;
mod settings;
mod weights;

pub use cache::{CachedScore, ScoreCache, Validity};
pub use calculator::CompositeCalculator;
pub use context::{SimulationContext, SimulationMode};
pub use key::DispatchKey;
pub use list::{DispatchState, SortedDispatchList};
pub use registry::RuleRegistry;
pub use settings::DispatchSettings;
pub use weights::{PenaltyCurve, ResolvedWeight, WeightDelta, WeightEntry, WeightTable};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::RuleError;
use crate::models::{Activity, Resource};

/// Score returned by a rule element and accumulated into composites.
pub type Score = Decimal;

/// Lower clamp bound for a single rule contribution.
pub const MIN_OPTIMIZE_RULE_SCORE: Score = Decimal::from_parts(1_000_000, 0, 0, true, 0);

/// Upper clamp bound for a single rule contribution.
pub const MAX_OPTIMIZE_RULE_SCORE: Score = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Clamps a non-zero score into the engine-wide rule bounds.
pub fn clamp_rule_score(score: Score) -> Score {
    if score.is_zero() {
        score
    } else {
        score.clamp(MIN_OPTIMIZE_RULE_SCORE, MAX_OPTIMIZE_RULE_SCORE)
    }
}

/// What a rule's output depends on. Governs how long a score may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DependencyClass {
    /// Never changes for an activity during a run.
    Constant,
    /// Depends on the simulated clock only, not on the resource.
    TimeBased,
    /// Depends on the resource; recomputed on every call.
    ResourceBased,
}

/// The optional capabilities a rule element declares.
///
/// A rule is exactly the union of the capabilities it sets here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// Scaled by points and category multiplier; only runs in optimize passes.
    pub weighted: bool,
    /// Subject to a minimum-score gate from the weight table.
    pub minimum_score: bool,
    /// Receives a settings blob at initialization.
    pub configurable: bool,
    /// Re-centered against the other eligible resources.
    pub alternate_resource: bool,
    /// Penalized inside the activity's early window.
    pub early_window: bool,
    /// A non-zero result replaces the whole composite.
    pub overriding: bool,
}

impl Capabilities {
    /// No optional capability.
    pub const NONE: Self = Self {
        weighted: false,
        minimum_score: false,
        configurable: false,
        alternate_resource: false,
        early_window: false,
        overriding: false,
    };

    pub const fn weighted(mut self) -> Self {
        self.weighted = true;
        self
    }

    pub const fn minimum_score(mut self) -> Self {
        self.minimum_score = true;
        self
    }

    pub const fn configurable(mut self) -> Self {
        self.configurable = true;
        self
    }

    pub const fn alternate_resource(mut self) -> Self {
        self.alternate_resource = true;
        self
    }

    pub const fn early_window(mut self) -> Self {
        self.early_window = true;
        self
    }

    pub const fn overriding(mut self) -> Self {
        self.overriding = true;
        self
    }
}

/// A pluggable rule computing one dimension of desirability for a
/// (resource, activity) pair.
///
/// # Purity
/// `evaluate` must be a pure function of its inputs unless the rule is
/// classified [`DependencyClass::ResourceBased`]; only such rules may keep
/// state between calls, since their results are never cached. A rule
/// reporting the wrong class will be served stale scores.
///
/// # Errors
/// An `Err` from `evaluate` is not recovered from: it aborts the current
/// dispatch computation.
pub trait RuleElement: Send + Sync + Debug {
    /// Stable identity used to look up weights and settings.
    fn key(&self) -> &str;

    /// Display name (defaults to the key).
    fn name(&self) -> &str {
        self.key()
    }

    /// Cache partition of this rule's scores.
    fn dependency(&self) -> DependencyClass;

    /// Declared optional capabilities.
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Scores `activity` on `resource` at the context's clock.
    fn evaluate(
        &self,
        activity: &Activity,
        resource: &Resource,
        context: &SimulationContext,
    ) -> Result<Score, RuleError>;

    /// Earliest clock at which `evaluate` would reach `minimum` for
    /// `activity`, when the rule's score only moves with time. Lets a
    /// simulation wake up for a gate no other event would reopen.
    fn reaches_minimum_at(
        &self,
        _activity: &Activity,
        _minimum: Score,
        _context: &SimulationContext,
    ) -> Option<i64> {
        None
    }

    /// Applies a settings blob. Called once at initialization, before any
    /// evaluation, for rules declaring [`Capabilities::configurable`].
    fn configure(&mut self, _settings: &serde_json::Value) -> Result<(), RuleError> {
        Ok(())
    }
}
