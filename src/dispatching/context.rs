//! Simulation context for rule evaluation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Resource, ResourceId};

/// Whether the current pass is a true optimization or a plain simulation.
///
/// Weighted rules and minimum-score gates only take part in
/// [`SimulationMode::Optimize`] passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationMode {
    /// Plain simulation: unweighted rules only.
    #[default]
    Simulate,
    /// Optimization pass: weighted rules and gates active.
    Optimize,
}

/// Runtime simulation state passed to rule elements.
///
/// Holds the simulated clock, the active mode and the resources known to
/// the run. Resources are kept in id order so alternate-resource scans are
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct SimulationContext {
    /// Current simulated clock (ticks).
    pub clock: i64,
    /// Active simulation mode.
    pub mode: SimulationMode,
    /// Resources by identity.
    pub resources: BTreeMap<ResourceId, Resource>,
}

impl SimulationContext {
    /// Creates a context at the given clock.
    pub fn at_time(clock: i64) -> Self {
        Self {
            clock,
            ..Default::default()
        }
    }

    /// Sets the simulation mode.
    pub fn with_mode(mut self, mode: SimulationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Registers a resource.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.insert(resource.id, resource);
        self
    }

    /// Registers several resources.
    pub fn with_resources(mut self, resources: impl IntoIterator<Item = Resource>) -> Self {
        for resource in resources {
            self.resources.insert(resource.id, resource);
        }
        self
    }

    /// Whether this is an optimize pass.
    pub fn is_optimizing(&self) -> bool {
        self.mode == SimulationMode::Optimize
    }

    /// Looks up a resource.
    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(&id)
    }

    /// Moves the clock forward (or back, for replays).
    pub fn advance_to(&mut self, clock: i64) {
        self.clock = clock;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let ctx = SimulationContext::at_time(30)
            .with_mode(SimulationMode::Optimize)
            .with_resources(vec![Resource::new(2), Resource::new(1)]);
        assert_eq!(ctx.clock, 30);
        assert!(ctx.is_optimizing());
        assert_eq!(ctx.resources.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert!(ctx.resource(3).is_none());
    }

    #[test]
    fn test_default_mode_is_simulate() {
        let mut ctx = SimulationContext::at_time(0);
        assert!(!ctx.is_optimizing());
        ctx.advance_to(15);
        assert_eq!(ctx.clock, 15);
    }
}
