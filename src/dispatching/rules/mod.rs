//! Built-in rule elements.
//!
//! # Catalogue
//!
//! | Rule | Class | Capabilities |
//! |------|-------|--------------|
//! | [`Priority`] | Constant | weighted |
//! | [`DueDateUrgency`] | TimeBased | weighted, minimum score |
//! | [`WaitingTime`] | TimeBased | - |
//! | [`ShortestSetup`] | ResourceBased | weighted, alternate resource |
//! | [`EarlyStart`] | TimeBased | weighted, early window |
//! | [`FixedSequence`] | Constant | overriding |
//! | [`AttributeMatch`] | Constant | weighted, configurable |
//!
//! # Score Convention
//! All rules return higher scores for activities that should run first.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{
    Capabilities, DependencyClass, RuleElement, RuleRegistry, Score, SimulationContext,
    MAX_OPTIMIZE_RULE_SCORE,
};
use crate::error::RuleError;
use crate::models::{Activity, Resource};

// ======================== Constant rules ========================

/// Business priority.
///
/// Score = `activity.priority`.
#[derive(Debug, Clone, Copy)]
pub struct Priority;

impl Priority {
    pub const KEY: &'static str = "priority";
}

impl RuleElement for Priority {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "Priority"
    }

    fn dependency(&self) -> DependencyClass {
        DependencyClass::Constant
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.weighted()
    }

    fn evaluate(
        &self,
        activity: &Activity,
        _resource: &Resource,
        _context: &SimulationContext,
    ) -> Result<Score, RuleError> {
        Ok(Decimal::from(activity.priority))
    }
}

/// Forces a fixed dispatch order.
///
/// Reads the `fixed_order` attribute (1 = first). Activities carrying it
/// score `MAX_OPTIMIZE_RULE_SCORE - order` and override every other rule;
/// activities without it score 0 and are ranked normally.
#[derive(Debug, Clone, Copy)]
pub struct FixedSequence;

impl FixedSequence {
    pub const KEY: &'static str = "fixed_sequence";
    pub const ATTRIBUTE: &'static str = "fixed_order";
}

impl RuleElement for FixedSequence {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "Fixed Sequence"
    }

    fn dependency(&self) -> DependencyClass {
        DependencyClass::Constant
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.overriding()
    }

    fn evaluate(
        &self,
        activity: &Activity,
        _resource: &Resource,
        _context: &SimulationContext,
    ) -> Result<Score, RuleError> {
        let Some(raw) = activity.attributes.get(Self::ATTRIBUTE) else {
            return Ok(Decimal::ZERO);
        };
        let order: i64 = raw.trim().parse().map_err(|_| {
            RuleError::Evaluation(format!(
                "activity {} has non-numeric {}: '{raw}'",
                activity.id,
                Self::ATTRIBUTE
            ))
        })?;
        Ok(MAX_OPTIMIZE_RULE_SCORE - Decimal::from(order.max(0)))
    }
}

/// Settings of [`AttributeMatch`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct AttributeMatchSettings {
    attribute: String,
    value: String,
    #[serde(default = "default_match_score")]
    score: Score,
}

fn default_match_score() -> Score {
    Decimal::ONE
}

/// Rewards activities whose attribute matches a configured value.
///
/// Settings: `{ "attribute": "colour", "value": "red", "score": 10 }`
/// (`score` defaults to 1). Without settings the rule never matches.
#[derive(Debug, Clone, Default)]
pub struct AttributeMatch {
    target: Option<AttributeMatchSettings>,
}

impl AttributeMatch {
    pub const KEY: &'static str = "attribute_match";

    pub fn new() -> Self {
        Self::default()
    }
}

impl RuleElement for AttributeMatch {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "Attribute Match"
    }

    fn dependency(&self) -> DependencyClass {
        DependencyClass::Constant
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.weighted().configurable()
    }

    fn evaluate(
        &self,
        activity: &Activity,
        _resource: &Resource,
        _context: &SimulationContext,
    ) -> Result<Score, RuleError> {
        let Some(target) = &self.target else {
            return Ok(Decimal::ZERO);
        };
        let matched = activity
            .attributes
            .get(&target.attribute)
            .is_some_and(|v| *v == target.value);
        Ok(if matched { target.score } else { Decimal::ZERO })
    }

    fn configure(&mut self, settings: &serde_json::Value) -> Result<(), RuleError> {
        self.target = if settings.is_null() {
            None
        } else {
            let parsed = serde_json::from_value(settings.clone())
                .map_err(|e| RuleError::Configuration(e.to_string()))?;
            Some(parsed)
        };
        Ok(())
    }
}

// ======================== Time-based rules ========================

/// Due-date urgency.
///
/// Score = `clock - due_date`: rises as the due date approaches and keeps
/// rising once it has passed. Activities without a due date score 0.
/// A minimum-score gate of `-h` keeps activities due more than `h` ticks
/// out from being dispatched in optimize passes.
#[derive(Debug, Clone, Copy)]
pub struct DueDateUrgency;

impl DueDateUrgency {
    pub const KEY: &'static str = "due_date";
}

impl RuleElement for DueDateUrgency {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "Due Date Urgency"
    }

    fn dependency(&self) -> DependencyClass {
        DependencyClass::TimeBased
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.weighted().minimum_score()
    }

    fn evaluate(
        &self,
        activity: &Activity,
        _resource: &Resource,
        context: &SimulationContext,
    ) -> Result<Score, RuleError> {
        Ok(activity
            .due_date
            .map_or(Decimal::ZERO, |due| Decimal::from(context.clock - due)))
    }

    fn reaches_minimum_at(
        &self,
        activity: &Activity,
        minimum: Score,
        _context: &SimulationContext,
    ) -> Option<i64> {
        let due = activity.due_date?;
        Decimal::from(due).checked_add(minimum)?.ceil().to_i64()
    }
}

/// Time waited since release (first in, first out).
///
/// Unweighted, so it also ranks activities in plain simulation passes.
#[derive(Debug, Clone, Copy)]
pub struct WaitingTime;

impl WaitingTime {
    pub const KEY: &'static str = "waiting_time";
}

impl RuleElement for WaitingTime {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "Waiting Time"
    }

    fn dependency(&self) -> DependencyClass {
        DependencyClass::TimeBased
    }

    fn evaluate(
        &self,
        activity: &Activity,
        _resource: &Resource,
        context: &SimulationContext,
    ) -> Result<Score, RuleError> {
        let released = activity.release_time.unwrap_or(0);
        Ok(Decimal::from((context.clock - released).max(0)))
    }
}

/// Discourages starting inside the early window.
///
/// Base score 0; the calculator subtracts the configured early-window
/// penalty while the clock is inside `[release_time, head_start_end)`.
#[derive(Debug, Clone, Copy)]
pub struct EarlyStart;

impl EarlyStart {
    pub const KEY: &'static str = "early_start";
}

impl RuleElement for EarlyStart {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "Early Start"
    }

    fn dependency(&self) -> DependencyClass {
        DependencyClass::TimeBased
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.weighted().early_window()
    }

    fn evaluate(
        &self,
        _activity: &Activity,
        _resource: &Resource,
        _context: &SimulationContext,
    ) -> Result<Score, RuleError> {
        Ok(Decimal::ZERO)
    }
}

// ======================== Resource-based rules ========================

/// Shortest setup on the candidate resource.
///
/// Score = `-setup_ticks(resource)`. With a resource multiplier, rewards a
/// resource by how much better its setup is than the alternatives'.
#[derive(Debug, Clone, Copy)]
pub struct ShortestSetup;

impl ShortestSetup {
    pub const KEY: &'static str = "shortest_setup";
}

impl RuleElement for ShortestSetup {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn name(&self) -> &str {
        "Shortest Setup"
    }

    fn dependency(&self) -> DependencyClass {
        DependencyClass::ResourceBased
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE.weighted().alternate_resource()
    }

    fn evaluate(
        &self,
        activity: &Activity,
        resource: &Resource,
        _context: &SimulationContext,
    ) -> Result<Score, RuleError> {
        Ok(-Decimal::from(activity.setup_on(resource.id)))
    }
}

/// Every built-in rule, in catalogue order.
pub fn standard_registry() -> RuleRegistry {
    RuleRegistry::new()
        .with_rule(FixedSequence)
        .with_rule(Priority)
        .with_rule(DueDateUrgency)
        .with_rule(WaitingTime)
        .with_rule(ShortestSetup)
        .with_rule(EarlyStart)
        .with_rule(AttributeMatch::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::{
        CompositeCalculator, DispatchSettings, RuleRegistry, SimulationMode, WeightEntry,
        WeightTable,
    };

    fn ctx(clock: i64) -> SimulationContext {
        SimulationContext::at_time(clock).with_resource(Resource::new(1))
    }

    fn res() -> Resource {
        Resource::new(1)
    }

    #[test]
    fn test_priority() {
        let high = Activity::new(1).with_priority(100);
        let low = Activity::new(2).with_priority(1);
        assert!(
            Priority.evaluate(&high, &res(), &ctx(0)).unwrap()
                > Priority.evaluate(&low, &res(), &ctx(0)).unwrap()
        );
    }

    #[test]
    fn test_due_date_urgency() {
        let soon = Activity::new(1).with_due_date(1_000);
        let later = Activity::new(2).with_due_date(50_000);
        let none = Activity::new(3);
        let c = ctx(500);
        assert_eq!(DueDateUrgency.evaluate(&soon, &res(), &c).unwrap(), Decimal::from(-500));
        assert!(
            DueDateUrgency.evaluate(&soon, &res(), &c).unwrap()
                > DueDateUrgency.evaluate(&later, &res(), &c).unwrap()
        );
        assert_eq!(DueDateUrgency.evaluate(&none, &res(), &c).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_due_date_gate_opening() {
        let act = Activity::new(1).with_due_date(1_000);
        let c = ctx(0);
        assert_eq!(DueDateUrgency.reaches_minimum_at(&act, Decimal::from(-100), &c), Some(900));
        assert_eq!(DueDateUrgency.reaches_minimum_at(&act, Decimal::new(-995, 1), &c), Some(901));
        assert_eq!(DueDateUrgency.reaches_minimum_at(&Activity::new(2), Decimal::ZERO, &c), None);
        assert_eq!(Priority.reaches_minimum_at(&act, Decimal::ZERO, &c), None);
    }

    #[test]
    fn test_waiting_time() {
        let early = Activity::new(1).with_release_time(100);
        let late = Activity::new(2).with_release_time(400);
        let c = ctx(300);
        assert_eq!(WaitingTime.evaluate(&early, &res(), &c).unwrap(), Decimal::from(200));
        assert_eq!(WaitingTime.evaluate(&late, &res(), &c).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_shortest_setup() {
        let act = Activity::new(1).with_setup(1, 30).with_setup(2, 5);
        let c = ctx(0);
        assert_eq!(ShortestSetup.evaluate(&act, &Resource::new(1), &c).unwrap(), Decimal::from(-30));
        assert_eq!(ShortestSetup.evaluate(&act, &Resource::new(2), &c).unwrap(), Decimal::from(-5));
        assert_eq!(ShortestSetup.evaluate(&act, &Resource::new(3), &c).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_fixed_sequence() {
        let first = Activity::new(1).with_attribute(FixedSequence::ATTRIBUTE, "1");
        let second = Activity::new(2).with_attribute(FixedSequence::ATTRIBUTE, "2");
        let free = Activity::new(3);
        let c = ctx(0);
        let s1 = FixedSequence.evaluate(&first, &res(), &c).unwrap();
        let s2 = FixedSequence.evaluate(&second, &res(), &c).unwrap();
        assert!(s1 > s2);
        assert_eq!(FixedSequence.evaluate(&free, &res(), &c).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_fixed_sequence_bad_attribute() {
        let bad = Activity::new(1).with_attribute(FixedSequence::ATTRIBUTE, "soon");
        let err = FixedSequence.evaluate(&bad, &res(), &ctx(0)).unwrap_err();
        assert!(matches!(err, RuleError::Evaluation(_)));
    }

    #[test]
    fn test_attribute_match_configuration() {
        let mut rule = AttributeMatch::new();
        let red = Activity::new(1).with_attribute("colour", "red");
        let blue = Activity::new(2).with_attribute("colour", "blue");
        assert_eq!(rule.evaluate(&red, &res(), &ctx(0)).unwrap(), Decimal::ZERO);

        rule.configure(&serde_json::json!({ "attribute": "colour", "value": "red", "score": 10 }))
            .unwrap();
        assert_eq!(rule.evaluate(&red, &res(), &ctx(0)).unwrap(), Decimal::from(10));
        assert_eq!(rule.evaluate(&blue, &res(), &ctx(0)).unwrap(), Decimal::ZERO);

        rule.configure(&serde_json::json!({ "attribute": "colour", "value": "blue" }))
            .unwrap();
        assert_eq!(rule.evaluate(&blue, &res(), &ctx(0)).unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_attribute_match_rejects_bad_settings() {
        let mut rule = AttributeMatch::new();
        let err = rule.configure(&serde_json::json!({ "value": 3 })).unwrap_err();
        assert!(matches!(err, RuleError::Configuration(_)));
    }

    #[test]
    fn test_calculator_configures_attribute_match() {
        let settings = DispatchSettings::default().with_rule_settings(
            AttributeMatch::KEY,
            serde_json::json!({ "attribute": "colour", "value": "red", "score": 4 }),
        );
        let weights = WeightTable::new().with_entry(
            AttributeMatch::KEY,
            WeightEntry::new().with_points(Decimal::from(2)),
        );
        let registry = RuleRegistry::new().with_rule(AttributeMatch::new());
        let mut calc = CompositeCalculator::initialize(registry, weights, &settings).unwrap();

        let context = ctx(0).with_mode(SimulationMode::Optimize);
        let mut act = Activity::new(1).with_attribute("colour", "red");
        let composite = calc.compute_composite(&res(), &mut act, &context).unwrap();
        assert_eq!(composite, Decimal::from(8));
    }

    #[test]
    fn test_standard_registry() {
        let registry = standard_registry();
        assert_eq!(registry.len(), 7);
        assert!(registry.get(ShortestSetup::KEY).is_some());
    }
}
