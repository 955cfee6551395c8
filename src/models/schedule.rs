//! Schedule (simulation output) model.
//!
//! A schedule records which activity ran on which resource, when, and with
//! which composite score it won the dispatch decision.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ActivityId, ResourceId};

/// Dispatch decisions produced by a simulation run, in dispatch order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    /// Activity assignments (activity → resource × time).
    pub assignments: Vec<Assignment>,
}

/// An activity-resource-time assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Assigned activity.
    pub activity_id: ActivityId,
    /// Resource it was dispatched onto.
    pub resource_id: ResourceId,
    /// Start tick.
    pub start: i64,
    /// End tick.
    pub end: i64,
    /// Setup portion, included in `[start, start + setup)`.
    pub setup: i64,
    /// Composite score at the moment of dispatch.
    pub composite: Decimal,
}

impl Assignment {
    /// Creates a new assignment.
    pub fn new(activity_id: ActivityId, resource_id: ResourceId, start: i64, end: i64) -> Self {
        Self {
            activity_id,
            resource_id,
            start,
            end,
            setup: 0,
            composite: Decimal::ZERO,
        }
    }

    /// Sets the setup time.
    pub fn with_setup(mut self, setup: i64) -> Self {
        self.setup = setup;
        self
    }

    /// Sets the winning composite.
    pub fn with_composite(mut self, composite: Decimal) -> Self {
        self.composite = composite;
        self
    }

    /// Total duration (end - start).
    #[inline]
    pub fn duration(&self) -> i64 {
        self.end - self.start
    }
}

impl Schedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an assignment.
    pub fn add_assignment(&mut self, assignment: Assignment) {
        self.assignments.push(assignment);
    }

    /// Number of assignments.
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// Latest end tick across all assignments.
    pub fn makespan(&self) -> i64 {
        self.assignments.iter().map(|a| a.end).max().unwrap_or(0)
    }

    /// Finds the assignment for a given activity.
    pub fn assignment_for_activity(&self, activity_id: ActivityId) -> Option<&Assignment> {
        self.assignments
            .iter()
            .find(|a| a.activity_id == activity_id)
    }

    /// Assignments on one resource, in dispatch order.
    pub fn assignments_for_resource(&self, resource_id: ResourceId) -> Vec<&Assignment> {
        self.assignments
            .iter()
            .filter(|a| a.resource_id == resource_id)
            .collect()
    }

    /// Activity ids on one resource, in dispatch order.
    pub fn sequence_on(&self, resource_id: ResourceId) -> Vec<ActivityId> {
        self.assignments_for_resource(resource_id)
            .into_iter()
            .map(|a| a.activity_id)
            .collect()
    }
}
