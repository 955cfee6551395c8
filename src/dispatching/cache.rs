//! Per-activity score cache.
//!
//! Each activity owns an ordered list of cached rule scores. An entry is
//! either valid forever (constant rules) or only at the clock it was
//! computed at (time-based rules). Resource-based scores are never stored.
//! Scores that were re-centered against alternate resources also remember
//! the resource they were computed for.
//!
//! Stale entries are pruned on read, so a lookup only ever returns scores
//! that are valid for the requested clock and resource.

use std::collections::HashMap;

use super::Score;
use crate::models::{ActivityId, FactorScore, ResourceId};

/// How long a cached score stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// For the whole run.
    Forever,
    /// Only while the simulated clock equals this value.
    AtClock(i64),
}

impl Validity {
    /// Whether the entry may be served at `clock`.
    pub fn is_valid_at(self, clock: i64) -> bool {
        match self {
            Validity::Forever => true,
            Validity::AtClock(t) => t == clock,
        }
    }
}

/// One cached rule result.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedScore {
    /// Index of the rule in the calculator's rule list.
    pub rule: usize,
    /// Weighted amount added to the composite.
    pub score: Score,
    /// Rule score before adjustment, used to re-check minimum-score gates.
    pub unweighted: Score,
    pub validity: Validity,
    /// Set for rules re-centered against alternate resources, whether or
    /// not the adjustment applied.
    pub resource: Option<ResourceId>,
    /// Whether the alternate-resource adjustment was applied.
    pub adjusted: bool,
    pub factor: FactorScore,
}

impl CachedScore {
    fn is_valid_for(&self, clock: i64, resource: ResourceId) -> bool {
        self.validity.is_valid_at(clock) && self.resource.map_or(true, |r| r == resource)
    }
}

/// Activity id → cached rule results.
#[derive(Debug, Clone, Default)]
pub struct ScoreCache {
    entries: HashMap<ActivityId, Vec<CachedScore>>,
}

impl ScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything. Called at the start of each run and on weight changes.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops one activity's entries.
    pub fn evict(&mut self, activity: ActivityId) {
        self.entries.remove(&activity);
    }

    /// Prunes entries that are stale for `clock` / `resource` and returns
    /// the remaining ones.
    pub fn valid_entries(
        &mut self,
        activity: ActivityId,
        clock: i64,
        resource: ResourceId,
    ) -> Vec<CachedScore> {
        let Some(list) = self.entries.get_mut(&activity) else {
            return Vec::new();
        };
        let before = list.len();
        list.retain(|e| e.is_valid_for(clock, resource));
        if list.len() != before {
            tracing::debug!(
                activity,
                clock,
                pruned = before - list.len(),
                "pruned stale cached scores"
            );
        }
        if list.is_empty() {
            self.entries.remove(&activity);
            return Vec::new();
        }
        list.clone()
    }

    /// Drops the entries of one rule for `activity`.
    pub fn discard(&mut self, activity: ActivityId, rule: usize) {
        if let Some(list) = self.entries.get_mut(&activity) {
            list.retain(|e| e.rule != rule);
            if list.is_empty() {
                self.entries.remove(&activity);
            }
        }
    }

    /// Appends an entry for `activity`.
    pub fn store(&mut self, activity: ActivityId, entry: CachedScore) {
        self.entries.entry(activity).or_default().push(entry);
    }

    /// Raw entries for inspection.
    pub fn entries_for(&self, activity: ActivityId) -> &[CachedScore] {
        self.entries.get(&activity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of activities with cached scores.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn entry(rule: usize, validity: Validity, resource: Option<ResourceId>) -> CachedScore {
        CachedScore {
            rule,
            score: Decimal::from(rule as i64),
            unweighted: Decimal::from(rule as i64),
            validity,
            resource,
            adjusted: false,
            factor: FactorScore::new("r", "r", Decimal::ONE, Decimal::ONE, 1),
        }
    }

    #[test]
    fn test_forever_survives_clock_change() {
        let mut cache = ScoreCache::new();
        cache.store(1, entry(0, Validity::Forever, None));
        assert_eq!(cache.valid_entries(1, 0, 5).len(), 1);
        assert_eq!(cache.valid_entries(1, 99, 6).len(), 1);
    }

    #[test]
    fn test_time_entry_pruned_on_clock_change() {
        let mut cache = ScoreCache::new();
        cache.store(1, entry(0, Validity::Forever, None));
        cache.store(1, entry(1, Validity::AtClock(10), None));
        assert_eq!(cache.valid_entries(1, 10, 5).len(), 2);

        let valid = cache.valid_entries(1, 11, 5);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].rule, 0);
        assert_eq!(cache.entries_for(1).len(), 1);
    }

    #[test]
    fn test_resource_bound_entry_pruned_on_other_resource() {
        let mut cache = ScoreCache::new();
        cache.store(1, entry(0, Validity::Forever, Some(5)));
        assert_eq!(cache.valid_entries(1, 0, 5).len(), 1);
        assert!(cache.valid_entries(1, 0, 6).is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_discard_drops_one_rule() {
        let mut cache = ScoreCache::new();
        cache.store(1, entry(0, Validity::Forever, None));
        cache.store(1, entry(1, Validity::Forever, Some(5)));
        cache.discard(1, 1);
        let left = cache.entries_for(1);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].rule, 0);
        cache.discard(1, 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_and_evict() {
        let mut cache = ScoreCache::new();
        cache.store(1, entry(0, Validity::Forever, None));
        cache.store(2, entry(0, Validity::Forever, None));
        cache.evict(1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
