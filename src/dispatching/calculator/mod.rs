//! Composite score calculator.
//!
//! Aggregates the output of every applicable rule element into one score per
//! (resource, activity) pair and records the per-rule breakdown on the
//! activity.
//!
//! # Algorithm
//!
//! 1. Sequenced activities score 0 without further work.
//! 2. Cached scores still valid at the current clock (and resource, for
//!    alternate-adjusted scores) are applied; stale ones are pruned.
//! 3. If any overriding rule returns non-zero, the largest such value is the
//!    composite and nothing else runs.
//! 4. Every remaining rule is evaluated (weighted rules only in optimize
//!    passes), adjusted against alternate resources, penalized inside the
//!    early window, clamped, weighted, accumulated and written back to the
//!    cache according to its dependency class.
//! 5. In optimize passes a violated minimum-score gate, or a composite below
//!    the global minimum, disqualifies the activity (composite 0).
//! 6. Contribution percentages are finalized and attached to the activity.
//!
//! Rule failures are not caught here; they propagate to the caller.

mod alternate;
mod early_window;

use rust_decimal::Decimal;
use std::collections::HashSet;

use super::{
    clamp_rule_score, CachedScore, Capabilities, DependencyClass, DispatchSettings,
    ResolvedWeight, RuleElement, RuleRegistry, Score, ScoreCache, SimulationContext, Validity,
    WeightDelta, WeightTable,
};
use crate::error::{DispatchError, DispatchResult};
use crate::models::{Activity, ActivityId, FactorScore, Resource};

/// A rule element bound to its resolved weight.
#[derive(Debug)]
struct BoundRule {
    rule: Box<dyn RuleElement>,
    capabilities: Capabilities,
    /// Effective cache class (early-window rules are at least time-based).
    class: DependencyClass,
    weight: ResolvedWeight,
    /// Whether the rule can contribute at all. Computed once per binding.
    active: bool,
}

impl BoundRule {
    fn bind(rule: Box<dyn RuleElement>, weights: &WeightTable) -> Self {
        let capabilities = rule.capabilities();
        let class = match rule.dependency() {
            DependencyClass::Constant if capabilities.early_window => DependencyClass::TimeBased,
            class => class,
        };
        let mut bound = Self {
            rule,
            capabilities,
            class,
            weight: ResolvedWeight::default(),
            active: true,
        };
        bound.rebind(weights);
        bound
    }

    fn rebind(&mut self, weights: &WeightTable) {
        self.weight = weights.resolve(self.rule.key());
        self.active = !self.capabilities.weighted || self.weight.calculate_scores();
    }

    fn key(&self) -> &str {
        self.rule.key()
    }

    fn evaluate(
        &self,
        activity: &Activity,
        resource: &Resource,
        context: &SimulationContext,
    ) -> DispatchResult<Score> {
        self.rule
            .evaluate(activity, resource, context)
            .map_err(|source| DispatchError::Rule {
                key: self.key().to_string(),
                source,
            })
    }

    fn applies_in(&self, optimizing: bool) -> bool {
        self.active && (optimizing || !self.capabilities.weighted)
    }

    fn weight_factor(&self) -> Score {
        if self.capabilities.weighted {
            self.weight.factor()
        } else {
            Decimal::ONE
        }
    }

    fn violates_gate(&self, unweighted: Score) -> bool {
        self.capabilities.minimum_score
            && self.weight.minimum_score.is_some_and(|min| unweighted < min)
    }

    fn resource_multiplier(&self) -> Option<Score> {
        (self.capabilities.alternate_resource && !self.weight.resource_multiplier.is_zero())
            .then_some(self.weight.resource_multiplier)
    }

    fn validity(&self, clock: i64) -> Option<Validity> {
        match self.class {
            DependencyClass::Constant => Some(Validity::Forever),
            DependencyClass::TimeBased => Some(Validity::AtClock(clock)),
            DependencyClass::ResourceBased => None,
        }
    }
}

/// Running sums of one composite evaluation.
#[derive(Debug, Default)]
struct Tally {
    composite: Score,
    divisor: Score,
    factors: Vec<FactorScore>,
    gate_violated: bool,
}

impl Tally {
    fn add(&mut self, score: Score, factor: FactorScore) {
        self.composite = self.composite.saturating_add(score);
        self.divisor = self.divisor.saturating_add(score.abs());
        self.factors.push(factor);
    }

    fn into_factors(self) -> Vec<FactorScore> {
        if self.divisor.is_zero() {
            return Vec::new();
        }
        let divisor = self.divisor;
        self.factors
            .into_iter()
            .map(|mut f| {
                f.contribution = f.score.abs() / divisor;
                f
            })
            .collect()
    }
}

/// Computes composite dispatch scores and owns the score cache.
///
/// Built once per run by [`CompositeCalculator::initialize`]; the cache is
/// cleared with [`CompositeCalculator::reset`] at the start of each run.
/// Single-threaded: all evaluation happens on the caller's thread.
#[derive(Debug)]
pub struct CompositeCalculator {
    rules: Vec<BoundRule>,
    weights: WeightTable,
    cache: ScoreCache,
    global_min_score: Option<Score>,
}

impl CompositeCalculator {
    /// Configures the registered rules, binds them to their weights and
    /// decides once which weighted rules can contribute at all.
    ///
    /// # Errors
    /// Duplicate rule keys, or a configurable rule rejecting its settings.
    pub fn initialize(
        registry: RuleRegistry,
        weights: WeightTable,
        settings: &DispatchSettings,
    ) -> DispatchResult<Self> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(registry.len());

        for mut rule in registry.into_rules() {
            let key = rule.key().to_string();
            if !seen.insert(key.clone()) {
                return Err(DispatchError::DuplicateRule(key));
            }
            if rule.capabilities().configurable {
                let blob = settings
                    .rule_settings(&key)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                rule.configure(&blob)
                    .map_err(|source| DispatchError::RuleConfiguration {
                        key: key.clone(),
                        source,
                    })?;
            }
            rules.push(BoundRule::bind(rule, &weights));
        }

        let active = rules.iter().filter(|r| r.active).count();
        tracing::debug!(rules = rules.len(), active, "composite calculator initialized");

        Ok(Self {
            rules,
            weights,
            cache: ScoreCache::new(),
            global_min_score: settings.global_min_score,
        })
    }

    /// Clears the score cache. Call at the start of every run.
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    /// Merges a partial weight update into the live table, rebinds every
    /// rule and drops cached scores computed under the old weights.
    ///
    /// Keys without a registered rule are kept in the table but otherwise
    /// ignored.
    pub fn update_weights(&mut self, delta: &WeightDelta) {
        self.weights.apply_delta(delta);
        for rule in &mut self.rules {
            rule.rebind(&self.weights);
        }
        self.cache.clear();
        tracing::debug!(entries = delta.len(), "weights updated");
    }

    /// Drops every cached score of `activity`. Call after changing its
    /// eligible resources or any other input a cached rule reads.
    pub fn invalidate(&mut self, activity: ActivityId) {
        self.cache.evict(activity);
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Whether the rule with `key` can contribute under the current weights.
    pub fn is_active(&self, key: &str) -> bool {
        self.rules.iter().any(|r| r.key() == key && r.active)
    }

    /// Computes the composite score of `activity` on `resource`.
    ///
    /// Side effects: updates `activity.minimum_score_not_met` and replaces
    /// `activity.factor_scores`.
    ///
    /// # Errors
    /// The first rule failure, wrapped with the rule key.
    pub fn compute_composite(
        &mut self,
        resource: &Resource,
        activity: &mut Activity,
        context: &SimulationContext,
    ) -> DispatchResult<Score> {
        if activity.sequenced {
            return Ok(Decimal::ZERO);
        }

        let optimizing = context.is_optimizing();
        let clock = context.clock;
        let mut tally = Tally::default();
        let mut served = vec![false; self.rules.len()];

        for cached in self.cache.valid_entries(activity.id, clock, resource.id) {
            let Some(bound) = self.rules.get(cached.rule) else {
                continue;
            };
            // Lock state flipped since the score was cached: the adjustment
            // no longer matches.
            if bound.resource_multiplier().is_some() && cached.adjusted == activity.locked {
                self.cache.discard(activity.id, cached.rule);
                continue;
            }
            served[cached.rule] = true;
            if !bound.applies_in(optimizing) {
                continue;
            }
            if optimizing && bound.violates_gate(cached.unweighted) {
                tally.gate_violated = true;
            }
            tracing::trace!(activity = activity.id, rule = bound.key(), "cached score served");
            let mut factor = cached.factor;
            factor.resource_id = resource.id;
            tally.add(cached.score, factor);
        }

        if let Some((index, score)) = self.overriding_score(activity, resource, context)? {
            let bound = &self.rules[index];
            tracing::debug!(
                activity = activity.id,
                resource = resource.id,
                rule = bound.key(),
                score = %score,
                "overriding rule fired"
            );
            let mut factor =
                FactorScore::new(bound.key(), bound.rule.name(), score, score, resource.id);
            factor.contribution = Decimal::ONE;
            activity.minimum_score_not_met = false;
            activity.factor_scores = vec![factor];
            return Ok(score);
        }

        for (index, bound) in self.rules.iter().enumerate() {
            if bound.capabilities.overriding || served[index] || !bound.applies_in(optimizing) {
                continue;
            }

            let unweighted = bound.evaluate(activity, resource, context)?;
            if optimizing && bound.violates_gate(unweighted) {
                tracing::debug!(
                    activity = activity.id,
                    rule = bound.key(),
                    score = %unweighted,
                    "minimum score gate violated"
                );
                tally.gate_violated = true;
            }

            let mut score = unweighted;
            let mut adjusted = false;
            let bound_to_resource = bound.resource_multiplier().map(|_| resource.id);
            if let Some(multiplier) = bound.resource_multiplier() {
                if let Some(centered) =
                    alternate::adjust(bound, unweighted, multiplier, activity, resource, context)?
                {
                    score = centered;
                    adjusted = true;
                }
            }
            if bound.capabilities.early_window {
                score = score.saturating_sub(early_window::penalty(activity, clock, &bound.weight));
            }

            let raw = clamp_rule_score(score);
            let weighted = raw.saturating_mul(bound.weight_factor());
            let factor = FactorScore::new(bound.key(), bound.rule.name(), raw, weighted, resource.id);

            if let Some(validity) = bound.validity(clock) {
                self.cache.store(
                    activity.id,
                    CachedScore {
                        rule: index,
                        score: weighted,
                        unweighted,
                        validity,
                        resource: bound_to_resource,
                        adjusted,
                        factor: factor.clone(),
                    },
                );
            }
            tally.add(weighted, factor);
        }

        if optimizing {
            let below_global = self
                .global_min_score
                .is_some_and(|min| tally.composite < min);
            if tally.gate_violated || below_global {
                tracing::debug!(
                    activity = activity.id,
                    resource = resource.id,
                    composite = %tally.composite,
                    gate_violated = tally.gate_violated,
                    "minimum score not met"
                );
                activity.minimum_score_not_met = true;
                activity.factor_scores.clear();
                return Ok(Decimal::ZERO);
            }
        }

        let composite = tally.composite;
        activity.minimum_score_not_met = false;
        activity.factor_scores = tally.into_factors();
        tracing::trace!(
            activity = activity.id,
            resource = resource.id,
            clock,
            composite = %composite,
            "composite computed"
        );
        Ok(composite)
    }

    /// Earliest clock after `context.clock` at which every minimum-score gate
    /// now holding `activity` back on `resource` would open.
    ///
    /// `None` when no gate is violated, when a violated gate cannot predict
    /// its opening, or outside optimize passes.
    ///
    /// # Errors
    /// The first rule failure, wrapped with the rule key.
    pub fn next_gate_opening(
        &self,
        activity: &Activity,
        resource: &Resource,
        context: &SimulationContext,
    ) -> DispatchResult<Option<i64>> {
        if !context.is_optimizing() || activity.sequenced {
            return Ok(None);
        }
        let mut opening: Option<i64> = None;
        for bound in &self.rules {
            let Some(minimum) = bound.weight.minimum_score else {
                continue;
            };
            if !bound.capabilities.minimum_score || !bound.applies_in(true) {
                continue;
            }
            if !bound.violates_gate(bound.evaluate(activity, resource, context)?) {
                continue;
            }
            match bound.rule.reaches_minimum_at(activity, minimum, context) {
                Some(at) if at > context.clock => {
                    opening = Some(opening.map_or(at, |o| o.max(at)));
                }
                _ => return Ok(None),
            }
        }
        Ok(opening)
    }

    /// Largest non-zero score among the overriding rules, with its rule index.
    fn overriding_score(
        &self,
        activity: &Activity,
        resource: &Resource,
        context: &SimulationContext,
    ) -> DispatchResult<Option<(usize, Score)>> {
        let optimizing = context.is_optimizing();
        let mut best: Option<(usize, Score)> = None;
        for (index, bound) in self.rules.iter().enumerate() {
            if !bound.capabilities.overriding || !bound.applies_in(optimizing) {
                continue;
            }
            let score = bound.evaluate(activity, resource, context)?;
            if score.is_zero() {
                continue;
            }
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((index, score));
            }
        }
        Ok(best)
    }
}
