//! Input validation for dispatch simulations.
//!
//! Checks structural integrity of activities and resources before they are
//! loaded into an [`ActivityPool`](crate::models::ActivityPool). Detects:
//! - Duplicate IDs
//! - Eligible resources that don't exist
//! - Activities no resource can run
//! - Unknown predecessors
//! - Circular precedence dependencies (DAG validation)
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::models::{Activity, ActivityId, Resource};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// An activity lists an eligible resource that doesn't exist.
    InvalidResourceReference,
    /// An activity has no eligible resource.
    NoEligibleResource,
    /// An activity references a predecessor that doesn't exist.
    InvalidPredecessor,
    /// Precedence graph contains a cycle.
    CyclicDependency,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates activities and resources of a simulation.
///
/// Checks:
/// 1. No duplicate resource IDs
/// 2. No duplicate activity IDs
/// 3. Every activity has at least one eligible resource
/// 4. Every eligible resource exists
/// 5. Every predecessor exists
/// 6. No circular precedence dependencies
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(activities: &[Activity], resources: &[Resource]) -> ValidationResult {
    let mut errors = Vec::new();

    let mut resource_ids = HashSet::new();
    for r in resources {
        if !resource_ids.insert(r.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate resource ID: {}", r.id),
            ));
        }
    }

    let mut activity_ids = HashSet::new();
    for act in activities {
        if !activity_ids.insert(act.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate activity ID: {}", act.id),
            ));
        }
    }

    for act in activities {
        if act.eligible_resources.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::NoEligibleResource,
                format!("Activity {} has no eligible resource", act.id),
            ));
        }
        for res in &act.eligible_resources {
            if !resource_ids.contains(res) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidResourceReference,
                    format!("Activity {} references unknown resource {res}", act.id),
                ));
            }
        }
        for pred in &act.predecessors {
            if !activity_ids.contains(pred) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidPredecessor,
                    format!("Activity {} references unknown predecessor {pred}", act.id),
                ));
            }
        }
    }

    if let Some(cycle_err) = detect_cycles(activities) {
        errors.push(cycle_err);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(errors = errors.len(), "input validation failed");
        Err(errors)
    }
}

/// Detects cycles in the precedence graph using DFS.
///
/// A back-edge (reaching a node still on the recursion stack) means a cycle.
fn detect_cycles(activities: &[Activity]) -> Option<ValidationError> {
    // predecessor -> successors; BTree keeps the reported node deterministic
    let mut adj: BTreeMap<ActivityId, Vec<ActivityId>> = BTreeMap::new();
    let mut all_ids: BTreeSet<ActivityId> = BTreeSet::new();

    for act in activities {
        all_ids.insert(act.id);
        for &pred in &act.predecessors {
            adj.entry(pred).or_default().push(act.id);
        }
    }

    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();

    for &node in &all_ids {
        if !visited.contains(&node) && has_cycle_dfs(node, &adj, &mut visited, &mut in_stack) {
            return Some(ValidationError::new(
                ValidationErrorKind::CyclicDependency,
                format!("Circular dependency detected involving activity {node}"),
            ));
        }
    }

    None
}

fn has_cycle_dfs(
    node: ActivityId,
    adj: &BTreeMap<ActivityId, Vec<ActivityId>>,
    visited: &mut HashSet<ActivityId>,
    in_stack: &mut HashSet<ActivityId>,
) -> bool {
    visited.insert(node);
    in_stack.insert(node);

    if let Some(successors) = adj.get(&node) {
        for &next in successors {
            if in_stack.contains(&next) {
                return true;
            }
            if !visited.contains(&next) && has_cycle_dfs(next, adj, visited, in_stack) {
                return true;
            }
        }
    }

    in_stack.remove(&node);
    false
}
