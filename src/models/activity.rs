//! Activity model.
//!
//! An activity is the atomic unit of work the dispatcher places on a
//! resource. Besides its static data (durations, eligible resources,
//! precedence, time windows) it carries the mutable per-pass state the
//! scoring engine reads and writes: the locked and sequenced flags, the
//! "minimum score not met" verdict and the factor scores of the last
//! composite evaluation.
//!
//! # Time Model
//! All times are integer simulation ticks relative to the run epoch.
//! The early window spans `[release_time, head_start_end)`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::{FactorScore, ResourceId};

/// Object identity of an activity.
pub type ActivityId = i64;

/// An activity waiting to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Unique object identity (final dispatch tie-break).
    pub id: ActivityId,
    /// Human-readable name.
    pub name: String,
    /// Core processing time (ticks).
    pub process_ticks: i64,
    /// Resource-specific setup time (ticks). Missing = no setup.
    pub setup_ticks: BTreeMap<ResourceId, i64>,
    /// Resources currently able to run this activity.
    pub eligible_resources: Vec<ResourceId>,
    /// Activities that must finish before this one may start.
    pub predecessors: Vec<ActivityId>,
    /// Earliest allowed start (ticks). `None` = available immediately.
    pub release_time: Option<i64>,
    /// End of the head-start window (ticks).
    pub head_start_end: Option<i64>,
    /// Due date (ticks).
    pub due_date: Option<i64>,
    /// Business priority (higher = more important).
    pub priority: i32,
    /// Position within a simultaneous batch (lower = earlier).
    pub simultaneous_sequence: i64,
    /// Locked to its current resource.
    pub locked: bool,
    /// Already fixed in execution order; never re-ranked.
    pub sequenced: bool,
    /// Set when the last optimize pass disqualified this activity.
    pub minimum_score_not_met: bool,
    /// Per-rule breakdown of the last composite evaluation.
    pub factor_scores: Vec<FactorScore>,
    /// Domain-specific metadata.
    pub attributes: HashMap<String, String>,
}

impl Activity {
    /// Creates a new activity with the given identity.
    pub fn new(id: ActivityId) -> Self {
        Self {
            id,
            name: String::new(),
            process_ticks: 0,
            setup_ticks: BTreeMap::new(),
            eligible_resources: Vec::new(),
            predecessors: Vec::new(),
            release_time: None,
            head_start_end: None,
            due_date: None,
            priority: 0,
            simultaneous_sequence: 0,
            locked: false,
            sequenced: false,
            minimum_score_not_met: false,
            factor_scores: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the processing time.
    pub fn with_process_ticks(mut self, ticks: i64) -> Self {
        self.process_ticks = ticks;
        self
    }

    /// Sets the setup time on one resource.
    pub fn with_setup(mut self, resource_id: ResourceId, ticks: i64) -> Self {
        self.setup_ticks.insert(resource_id, ticks);
        self
    }

    /// Adds an eligible resource.
    pub fn with_eligible(mut self, resource_id: ResourceId) -> Self {
        if !self.eligible_resources.contains(&resource_id) {
            self.eligible_resources.push(resource_id);
        }
        self
    }

    /// Adds a predecessor.
    pub fn with_predecessor(mut self, predecessor: ActivityId) -> Self {
        self.predecessors.push(predecessor);
        self
    }

    /// Sets the release time.
    pub fn with_release_time(mut self, tick: i64) -> Self {
        self.release_time = Some(tick);
        self
    }

    /// Sets the end of the head-start window.
    pub fn with_head_start_end(mut self, tick: i64) -> Self {
        self.head_start_end = Some(tick);
        self
    }

    /// Sets the due date.
    pub fn with_due_date(mut self, tick: i64) -> Self {
        self.due_date = Some(tick);
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the simultaneous-sequence tie-break.
    pub fn with_simultaneous_sequence(mut self, sequence: i64) -> Self {
        self.simultaneous_sequence = sequence;
        self
    }

    /// Locks the activity to its resource.
    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Marks the activity as already sequenced.
    pub fn sequenced(mut self) -> Self {
        self.sequenced = true;
        self
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Whether `resource_id` may run this activity.
    pub fn is_eligible_on(&self, resource_id: ResourceId) -> bool {
        self.eligible_resources.contains(&resource_id)
    }

    /// Setup time on a resource (0 when not configured).
    pub fn setup_on(&self, resource_id: ResourceId) -> i64 {
        self.setup_ticks.get(&resource_id).copied().unwrap_or(0)
    }

    /// Total occupation of `resource_id` (setup + processing).
    pub fn duration_on(&self, resource_id: ResourceId) -> i64 {
        self.setup_on(resource_id) + self.process_ticks
    }

    /// Whether the activity has been released at `clock`.
    pub fn is_released(&self, clock: i64) -> bool {
        self.release_time.map_or(true, |r| r <= clock)
    }
}

/// Ordered collection of activities keyed by identity.
///
/// Iteration is by ascending id so every pass over the pool is
/// deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityPool {
    activities: BTreeMap<ActivityId, Activity>,
}

impl ActivityPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an activity, returning the one it replaced.
    pub fn insert(&mut self, activity: Activity) -> Option<Activity> {
        self.activities.insert(activity.id, activity)
    }

    /// Builder-style insert.
    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.insert(activity);
        self
    }

    pub fn get(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.get(&id)
    }

    pub fn get_mut(&mut self, id: ActivityId) -> Option<&mut Activity> {
        self.activities.get_mut(&id)
    }

    pub fn contains(&self, id: ActivityId) -> bool {
        self.activities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Iterates activities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Activity> {
        self.activities.values()
    }

    /// Activity ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ActivityId> + '_ {
        self.activities.keys().copied()
    }
}

impl FromIterator<Activity> for ActivityPool {
    fn from_iter<I: IntoIterator<Item = Activity>>(iter: I) -> Self {
        let mut pool = Self::new();
        for activity in iter {
            pool.insert(activity);
        }
        pool
    }
}
