//! Per-resource sorted dispatch list.
//!
//! # States
//!
//! ```text
//! Empty --begin_dispatch--> Built --pop_next--> Consumed --(exhausted)--> Empty
//! ```
//!
//! `begin_dispatch` scores every ready activity through the calculator,
//! drops the ones disqualified by a minimum-score gate and sorts the rest by
//! [`DispatchKey`]. In best-only mode the list is then cut down to the
//! activities tied for the best composite.

use std::collections::BTreeSet;

use super::{CompositeCalculator, DispatchKey, DispatchSettings, SimulationContext};
use crate::error::{DispatchError, DispatchResult};
use crate::models::{ActivityId, ActivityPool, ResourceId};

/// Lifecycle of a dispatch list within one simulated time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Nothing built, or everything consumed.
    Empty,
    /// Keys built, none taken yet.
    Built,
    /// At least one key taken, some remain.
    Consumed,
}

/// Ready activities of one resource, ordered for dispatch.
#[derive(Debug, Clone)]
pub struct SortedDispatchList {
    resource_id: ResourceId,
    only_best: bool,
    ready: BTreeSet<ActivityId>,
    keys: Vec<DispatchKey>,
    cursor: usize,
    state: DispatchState,
    enforce_successor: bool,
    built_at: Option<i64>,
}

impl SortedDispatchList {
    /// Creates an empty list for `resource_id`.
    pub fn new(resource_id: ResourceId) -> Self {
        Self {
            resource_id,
            only_best: false,
            ready: BTreeSet::new(),
            keys: Vec::new(),
            cursor: 0,
            state: DispatchState::Empty,
            enforce_successor: false,
            built_at: None,
        }
    }

    /// Creates a list configured from the engine settings.
    pub fn from_settings(resource_id: ResourceId, settings: &DispatchSettings) -> Self {
        Self::new(resource_id).with_only_best_composites(settings.only_dispatch_best_composites)
    }

    /// Restricts built lists to the activities tied for the best composite.
    pub fn with_only_best_composites(mut self, enabled: bool) -> Self {
        self.only_best = enabled;
        self
    }

    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Clock of the last build.
    pub fn built_at(&self) -> Option<i64> {
        self.built_at
    }

    /// Effective successor constraint of the last build.
    pub fn enforces_successor(&self) -> bool {
        self.enforce_successor
    }

    /// Marks an activity as ready on this resource.
    pub fn insert_ready(&mut self, activity: ActivityId) -> bool {
        self.ready.insert(activity)
    }

    /// Removes an activity from the ready set and from the built keys.
    pub fn remove_ready(&mut self, activity: ActivityId) -> bool {
        self.take(activity);
        self.ready.remove(&activity)
    }

    /// Replaces the ready set.
    pub fn sync_ready(&mut self, activities: impl IntoIterator<Item = ActivityId>) {
        self.ready = activities.into_iter().collect();
    }

    pub fn is_ready(&self, activity: ActivityId) -> bool {
        self.ready.contains(&activity)
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Scores and sorts every ready activity.
    ///
    /// Returns the effective successor constraint, which is always `false`
    /// in best-only mode.
    ///
    /// # Errors
    /// Unknown resource or activity ids, and any rule failure. The list is
    /// left empty on error.
    pub fn begin_dispatch(
        &mut self,
        calculator: &mut CompositeCalculator,
        pool: &mut ActivityPool,
        context: &SimulationContext,
        enforce_successor: bool,
    ) -> DispatchResult<bool> {
        self.clear_keys();
        self.enforce_successor = enforce_successor && !self.only_best;

        let resource = context
            .resource(self.resource_id)
            .ok_or(DispatchError::UnknownResource(self.resource_id))?;

        let mut keys = Vec::with_capacity(self.ready.len());
        for &id in &self.ready {
            let activity = pool.get_mut(id).ok_or(DispatchError::UnknownActivity(id))?;
            let composite = calculator.compute_composite(resource, activity, context)?;
            if activity.minimum_score_not_met {
                continue;
            }
            keys.push(DispatchKey::new(composite, id, activity.simultaneous_sequence));
        }
        keys.sort_unstable();

        if self.only_best {
            if let Some(best) = keys.first().map(|k| k.composite) {
                let tied = keys.iter().take_while(|k| k.composite == best).count();
                keys.truncate(tied);
            }
        }

        tracing::debug!(
            resource = self.resource_id,
            clock = context.clock,
            ready = self.ready.len(),
            keys = keys.len(),
            "dispatch list built"
        );

        self.keys = keys;
        self.built_at = Some(context.clock);
        self.state = if self.keys.is_empty() {
            DispatchState::Empty
        } else {
            DispatchState::Built
        };
        Ok(self.enforce_successor)
    }

    /// Takes the highest-priority remaining key.
    pub fn pop_next(&mut self) -> Option<DispatchKey> {
        let key = self.keys.get(self.cursor).copied()?;
        self.cursor += 1;
        self.after_take();
        Some(key)
    }

    /// Takes the key of a specific activity, if it is still in the list.
    pub fn take(&mut self, activity: ActivityId) -> Option<DispatchKey> {
        let offset = self.keys[self.cursor..]
            .iter()
            .position(|k| k.activity_id == activity)?;
        let key = self.keys.remove(self.cursor + offset);
        self.after_take();
        Some(key)
    }

    /// Remaining keys in dispatch order.
    pub fn keys(&self) -> &[DispatchKey] {
        &self.keys[self.cursor..]
    }

    /// Remaining keys tied for the best composite.
    pub fn best(&self) -> &[DispatchKey] {
        let remaining = self.keys();
        let Some(first) = remaining.first() else {
            return remaining;
        };
        let tied = remaining
            .iter()
            .take_while(|k| k.composite == first.composite)
            .count();
        &remaining[..tied]
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    fn after_take(&mut self) {
        if self.cursor >= self.keys.len() {
            self.clear_keys();
        } else {
            self.state = DispatchState::Consumed;
        }
    }

    fn clear_keys(&mut self) {
        self.keys.clear();
        self.cursor = 0;
        self.state = DispatchState::Empty;
    }
}
