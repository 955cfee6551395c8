//! Discrete-event dispatch simulator.
//!
//! # Algorithm
//!
//! 1. Clear the calculator's cache; activities already sequenced count as
//!    finished at the start clock.
//! 2. At the current clock, every idle resource (in id order) rebuilds its
//!    dispatch list from the ready activities (released, predecessors
//!    finished, eligible) and takes the next one, or the successor of the
//!    activity it ran last when the successor constraint is in effect.
//! 3. Sweeps repeat at the same clock until nothing more can start.
//! 4. The clock advances to the next resource-free or release event, or to
//!    the tick a minimum-score gate holding a pending activity would open.
//!
//! Runs stop when every activity is placed or no further event exists;
//! activities never dispatched are reported as unscheduled. A rule failure
//! aborts the run.
//!
//! # Complexity
//! O(e * r * n * k) where e=events, r=resources, n=pending activities,
//! k=rules per composite (less with cache hits).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::dispatching::{
    CompositeCalculator, DispatchKey, DispatchSettings, SimulationContext, SortedDispatchList,
};
use crate::error::{DispatchError, DispatchResult};
use crate::models::{ActivityId, ActivityPool, Assignment, ResourceId, Schedule};

/// Result of a simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimulationOutcome {
    /// Dispatch decisions in the order they were made.
    pub schedule: Schedule,
    /// Activities that could not be dispatched.
    pub unscheduled: Vec<ActivityId>,
    /// Clock when the run stopped.
    pub final_clock: i64,
}

impl SimulationOutcome {
    /// Whether every activity was dispatched.
    pub fn is_complete(&self) -> bool {
        self.unscheduled.is_empty()
    }
}

/// Mutable bookkeeping of one run.
#[derive(Debug, Default)]
struct RunState {
    pending: BTreeSet<ActivityId>,
    finished_at: HashMap<ActivityId, i64>,
    available_at: BTreeMap<ResourceId, i64>,
    last_on: BTreeMap<ResourceId, ActivityId>,
    successors: HashMap<ActivityId, Vec<ActivityId>>,
    lists: BTreeMap<ResourceId, SortedDispatchList>,
    schedule: Schedule,
}

/// Drives the dispatching core over simulated time.
///
/// # Example
///
/// ```
/// use u_dispatch::dispatching::{rules, CompositeCalculator, DispatchSettings, SimulationContext, WeightTable};
/// use u_dispatch::models::{Activity, ActivityPool, Resource};
/// use u_dispatch::scheduler::DispatchSimulator;
///
/// let settings = DispatchSettings::default();
/// let calculator = CompositeCalculator::initialize(
///     rules::standard_registry(),
///     WeightTable::new(),
///     &settings,
/// )
/// .unwrap();
/// let mut simulator = DispatchSimulator::new(calculator, settings);
///
/// let mut pool: ActivityPool = vec![
///     Activity::new(1).with_process_ticks(10).with_eligible(1),
///     Activity::new(2).with_process_ticks(5).with_eligible(1).with_release_time(3),
/// ]
/// .into_iter()
/// .collect();
/// let mut context = SimulationContext::at_time(0).with_resource(Resource::new(1));
///
/// let outcome = simulator.run(&mut pool, &mut context).unwrap();
/// assert!(outcome.is_complete());
/// assert_eq!(outcome.schedule.makespan(), 15);
/// ```
#[derive(Debug)]
pub struct DispatchSimulator {
    calculator: CompositeCalculator,
    settings: DispatchSettings,
}

impl DispatchSimulator {
    /// Creates a simulator around an initialized calculator.
    pub fn new(calculator: CompositeCalculator, settings: DispatchSettings) -> Self {
        Self {
            calculator,
            settings,
        }
    }

    pub fn calculator(&self) -> &CompositeCalculator {
        &self.calculator
    }

    /// Mutable access, e.g. to apply weight deltas between runs.
    pub fn calculator_mut(&mut self) -> &mut CompositeCalculator {
        &mut self.calculator
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Runs the simulation from `context.clock`, dispatching the activities
    /// in `pool` onto the resources of `context`.
    ///
    /// Dispatched activities are marked sequenced; the context clock is left
    /// at the last event.
    ///
    /// # Errors
    /// The first rule failure, or an inconsistent pool/context.
    pub fn run(
        &mut self,
        pool: &mut ActivityPool,
        context: &mut SimulationContext,
    ) -> DispatchResult<SimulationOutcome> {
        self.calculator.reset();
        let mut state = self.prepare(pool, context);

        tracing::info!(
            activities = state.pending.len(),
            resources = state.lists.len(),
            start = context.clock,
            mode = ?context.mode,
            "dispatch simulation started"
        );

        while !state.pending.is_empty() {
            while self.sweep(&mut state, pool, context)? {}
            if state.pending.is_empty() {
                break;
            }
            let event = next_event(&state, pool, context.clock);
            let gate = self.next_gate_opening(&state, pool, context)?;
            let next = match (event, gate) {
                (Some(e), Some(g)) => Some(e.min(g)),
                (e, g) => e.or(g),
            };
            match next {
                Some(next) => context.advance_to(next),
                None => break,
            }
        }

        let unscheduled: Vec<ActivityId> = state.pending.iter().copied().collect();
        if !unscheduled.is_empty() {
            tracing::warn!(
                count = unscheduled.len(),
                clock = context.clock,
                "activities left unscheduled"
            );
        }
        tracing::info!(
            dispatched = state.schedule.assignment_count(),
            makespan = state.schedule.makespan(),
            "dispatch simulation finished"
        );

        Ok(SimulationOutcome {
            schedule: state.schedule,
            unscheduled,
            final_clock: context.clock,
        })
    }

    fn prepare(&self, pool: &ActivityPool, context: &SimulationContext) -> RunState {
        let mut state = RunState::default();
        for activity in pool.iter() {
            if activity.sequenced {
                state.finished_at.insert(activity.id, context.clock);
            } else {
                state.pending.insert(activity.id);
            }
            for &pred in &activity.predecessors {
                state.successors.entry(pred).or_default().push(activity.id);
            }
        }
        for &id in context.resources.keys() {
            state.available_at.insert(id, context.clock);
            state
                .lists
                .insert(id, SortedDispatchList::from_settings(id, &self.settings));
        }
        state
    }

    /// Earliest clock at which a pending activity held back by a
    /// minimum-score gate could pass it on one of its resources.
    fn next_gate_opening(
        &self,
        state: &RunState,
        pool: &ActivityPool,
        context: &SimulationContext,
    ) -> DispatchResult<Option<i64>> {
        let mut earliest: Option<i64> = None;
        for &id in &state.pending {
            let Some(activity) = pool.get(id) else {
                continue;
            };
            if !activity.minimum_score_not_met {
                continue;
            }
            for &resource_id in &activity.eligible_resources {
                let Some(resource) = context.resource(resource_id) else {
                    continue;
                };
                if let Some(at) = self.calculator.next_gate_opening(activity, resource, context)? {
                    earliest = Some(earliest.map_or(at, |e| e.min(at)));
                }
            }
        }
        if let Some(at) = earliest {
            tracing::debug!(clock = context.clock, wake = at, "waiting for minimum-score gate");
        }
        Ok(earliest)
    }

    /// One pass over the idle resources at the current clock.
    /// Returns whether anything was dispatched.
    fn sweep(
        &mut self,
        state: &mut RunState,
        pool: &mut ActivityPool,
        context: &SimulationContext,
    ) -> DispatchResult<bool> {
        let clock = context.clock;
        let mut dispatched = false;
        let resource_ids: Vec<ResourceId> = state.lists.keys().copied().collect();

        for resource_id in resource_ids {
            if state.available_at.get(&resource_id).is_some_and(|&t| t > clock) {
                continue;
            }
            let ready = ready_on(state, pool, resource_id, clock);
            let Some(list) = state.lists.get_mut(&resource_id) else {
                continue;
            };
            list.sync_ready(ready);
            if list.ready_len() == 0 {
                continue;
            }

            let enforce = list.begin_dispatch(
                &mut self.calculator,
                pool,
                context,
                self.settings.enforce_successor_constraint,
            )?;
            let forced = if enforce {
                state
                    .last_on
                    .get(&resource_id)
                    .and_then(|prev| state.successors.get(prev))
                    .and_then(|succ| succ.iter().find_map(|&s| list.take(s)))
            } else {
                None
            };
            let Some(key) = forced.or_else(|| list.pop_next()) else {
                continue;
            };

            assign(state, pool, resource_id, clock, key)?;
            dispatched = true;
        }
        Ok(dispatched)
    }
}

/// Pending activities that can start on `resource_id` at `clock`.
fn ready_on(
    state: &RunState,
    pool: &ActivityPool,
    resource_id: ResourceId,
    clock: i64,
) -> Vec<ActivityId> {
    state
        .pending
        .iter()
        .copied()
        .filter(|&id| {
            pool.get(id).is_some_and(|a| {
                a.is_eligible_on(resource_id)
                    && a.is_released(clock)
                    && a.predecessors.iter().all(|p| {
                        state.finished_at.get(p).is_some_and(|&end| end <= clock)
                    })
            })
        })
        .collect()
}

fn assign(
    state: &mut RunState,
    pool: &mut ActivityPool,
    resource_id: ResourceId,
    clock: i64,
    key: DispatchKey,
) -> DispatchResult<()> {
    let id = key.activity_id;
    let activity = pool.get_mut(id).ok_or(DispatchError::UnknownActivity(id))?;
    let setup = activity.setup_on(resource_id);
    let end = clock + setup + activity.process_ticks;
    activity.sequenced = true;

    tracing::trace!(
        activity = id,
        resource = resource_id,
        start = clock,
        end,
        composite = %key.composite,
        "activity dispatched"
    );

    state.schedule.add_assignment(
        Assignment::new(id, resource_id, clock, end)
            .with_setup(setup)
            .with_composite(key.composite),
    );
    state.pending.remove(&id);
    state.finished_at.insert(id, end);
    state.available_at.insert(resource_id, end);
    state.last_on.insert(resource_id, id);
    Ok(())
}

/// Earliest resource-free or release time after `clock`.
fn next_event(state: &RunState, pool: &ActivityPool, clock: i64) -> Option<i64> {
    let frees = state.available_at.values().copied();
    let releases = state
        .pending
        .iter()
        .filter_map(|&id| pool.get(id).and_then(|a| a.release_time));
    frees.chain(releases).filter(|&t| t > clock).min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::{
        rules, RuleRegistry, SimulationMode, WeightEntry, WeightTable,
    };
    use crate::models::{Activity, Resource};
    use rust_decimal::Decimal;

    fn simulator(registry: RuleRegistry, weights: WeightTable, settings: DispatchSettings) -> DispatchSimulator {
        let calculator = CompositeCalculator::initialize(registry, weights, &settings).unwrap();
        DispatchSimulator::new(calculator, settings)
    }

    fn priority_simulator(settings: DispatchSettings) -> DispatchSimulator {
        simulator(
            RuleRegistry::new()
                .with_rule(rules::FixedSequence)
                .with_rule(rules::Priority),
            WeightTable::new().with_entry(
                rules::Priority::KEY,
                WeightEntry::new().with_points(Decimal::ONE),
            ),
            settings,
        )
    }

    fn optimize(resources: &[i64]) -> SimulationContext {
        SimulationContext::at_time(0)
            .with_mode(SimulationMode::Optimize)
            .with_resources(resources.iter().map(|&id| Resource::new(id)))
    }

    fn job(id: i64, priority: i32, ticks: i64) -> Activity {
        Activity::new(id)
            .with_priority(priority)
            .with_process_ticks(ticks)
            .with_eligible(1)
    }

    #[test]
    fn test_priority_order_on_single_resource() {
        let mut sim = priority_simulator(DispatchSettings::default());
        let mut pool: ActivityPool = vec![job(1, 1, 10), job(2, 9, 10), job(3, 5, 10)]
            .into_iter()
            .collect();
        let mut ctx = optimize(&[1]);

        let outcome = sim.run(&mut pool, &mut ctx).unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.schedule.sequence_on(1), vec![2, 3, 1]);
        assert_eq!(outcome.schedule.makespan(), 30);
        assert!(pool.iter().all(|a| a.sequenced));
    }

    #[test]
    fn test_fixed_sequence_overrides_priority() {
        let mut sim = priority_simulator(DispatchSettings::default());
        let mut pool: ActivityPool = vec![
            job(1, 1, 10).with_attribute(rules::FixedSequence::ATTRIBUTE, "1"),
            job(2, 9, 10),
            job(3, 5, 10).with_attribute(rules::FixedSequence::ATTRIBUTE, "2"),
        ]
        .into_iter()
        .collect();
        let mut ctx = optimize(&[1]);

        let outcome = sim.run(&mut pool, &mut ctx).unwrap();
        assert_eq!(outcome.schedule.sequence_on(1), vec![1, 3, 2]);
    }

    #[test]
    fn test_alternate_setup_balances_resources() {
        let mut sim = simulator(
            RuleRegistry::new().with_rule(rules::ShortestSetup),
            WeightTable::new().with_entry(
                rules::ShortestSetup::KEY,
                WeightEntry::new()
                    .with_points(Decimal::ONE)
                    .with_resource_multiplier(Decimal::ONE),
            ),
            DispatchSettings::default(),
        );
        let mut pool: ActivityPool = vec![
            Activity::new(1)
                .with_process_ticks(10)
                .with_eligible(1)
                .with_eligible(2)
                .with_setup(1, 50),
            Activity::new(2)
                .with_process_ticks(10)
                .with_eligible(1)
                .with_eligible(2)
                .with_setup(2, 50),
        ]
        .into_iter()
        .collect();
        let mut ctx = optimize(&[1, 2]);

        let outcome = sim.run(&mut pool, &mut ctx).unwrap();
        assert_eq!(outcome.schedule.sequence_on(1), vec![2]);
        assert_eq!(outcome.schedule.sequence_on(2), vec![1]);
        assert_eq!(outcome.schedule.makespan(), 10);
    }

    #[test]
    fn test_precedence_and_release() {
        let mut sim = priority_simulator(DispatchSettings::default());
        let mut pool: ActivityPool = vec![
            job(1, 0, 20),
            job(2, 100, 5).with_predecessor(1),
            job(3, 0, 5).with_release_time(100),
        ]
        .into_iter()
        .collect();
        let mut ctx = optimize(&[1]);

        let outcome = sim.run(&mut pool, &mut ctx).unwrap();
        let s = &outcome.schedule;
        assert_eq!(s.assignment_for_activity(1).unwrap().start, 0);
        assert_eq!(s.assignment_for_activity(2).unwrap().start, 20);
        assert_eq!(s.assignment_for_activity(3).unwrap().start, 100);
        assert_eq!(outcome.final_clock, 100);
    }

    #[test]
    fn test_setup_extends_assignment() {
        let mut sim = priority_simulator(DispatchSettings::default());
        let mut pool: ActivityPool = vec![job(1, 0, 20).with_setup(1, 5)].into_iter().collect();
        let mut ctx = optimize(&[1]);

        let outcome = sim.run(&mut pool, &mut ctx).unwrap();
        let a = outcome.schedule.assignment_for_activity(1).unwrap();
        assert_eq!(a.setup, 5);
        assert_eq!(a.end, 25);
    }

    fn successor_pool() -> ActivityPool {
        vec![
            job(1, 10, 10),
            job(2, 0, 10).with_predecessor(1),
            job(3, 5, 10),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_successor_constraint() {
        let mut free = priority_simulator(DispatchSettings::default());
        let outcome = free.run(&mut successor_pool(), &mut optimize(&[1])).unwrap();
        assert_eq!(outcome.schedule.sequence_on(1), vec![1, 3, 2]);

        let mut chained =
            priority_simulator(DispatchSettings::default().with_successor_constraint(true));
        let outcome = chained.run(&mut successor_pool(), &mut optimize(&[1])).unwrap();
        assert_eq!(outcome.schedule.sequence_on(1), vec![1, 2, 3]);
    }

    #[test]
    fn test_best_only_ignores_successor_constraint() {
        let settings = DispatchSettings::default()
            .with_successor_constraint(true)
            .with_only_best_composites(true);
        let mut sim = priority_simulator(settings);
        let outcome = sim.run(&mut successor_pool(), &mut optimize(&[1])).unwrap();
        assert_eq!(outcome.schedule.sequence_on(1), vec![1, 3, 2]);
    }

    #[test]
    fn test_minimum_score_leaves_activity_unscheduled() {
        let mut sim = priority_simulator(
            DispatchSettings::default().with_global_min_score(Decimal::from(3)),
        );
        let mut pool: ActivityPool = vec![job(1, 5, 10), job(2, 1, 10)].into_iter().collect();
        let mut ctx = optimize(&[1]);

        let outcome = sim.run(&mut pool, &mut ctx).unwrap();
        assert_eq!(outcome.schedule.sequence_on(1), vec![1]);
        assert_eq!(outcome.unscheduled, vec![2]);
        assert!(!outcome.is_complete());
        assert!(pool.get(2).unwrap().minimum_score_not_met);
    }

    #[test]
    fn test_waits_for_due_date_gate() {
        let mut sim = simulator(
            RuleRegistry::new().with_rule(rules::DueDateUrgency),
            WeightTable::new().with_entry(
                rules::DueDateUrgency::KEY,
                WeightEntry::new()
                    .with_points(Decimal::ONE)
                    .with_minimum_score(Decimal::from(-100)),
            ),
            DispatchSettings::default(),
        );
        let mut pool: ActivityPool = vec![job(1, 0, 10).with_due_date(1_000)].into_iter().collect();
        let mut ctx = optimize(&[1]);

        let outcome = sim.run(&mut pool, &mut ctx).unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.schedule.assignment_for_activity(1).unwrap().start, 900);
        assert_eq!(outcome.final_clock, 900);
        assert!(!pool.get(1).unwrap().minimum_score_not_met);
    }

    #[test]
    fn test_unpredictable_gate_still_stops() {
        let mut sim = simulator(
            RuleRegistry::new().with_rule(rules::Priority),
            WeightTable::new().with_entry(
                rules::Priority::KEY,
                WeightEntry::new().with_points(Decimal::ONE),
            ),
            DispatchSettings::default().with_global_min_score(Decimal::from(10)),
        );
        let mut pool: ActivityPool = vec![job(1, 1, 10)].into_iter().collect();
        let outcome = sim.run(&mut pool, &mut optimize(&[1])).unwrap();
        assert_eq!(outcome.unscheduled, vec![1]);
        assert_eq!(outcome.final_clock, 0);
    }

    #[test]
    fn test_presequenced_activity_counts_as_finished() {
        let mut sim = priority_simulator(DispatchSettings::default());
        let mut pool: ActivityPool = vec![job(1, 0, 10).sequenced(), job(2, 0, 10).with_predecessor(1)]
            .into_iter()
            .collect();
        let outcome = sim.run(&mut pool, &mut optimize(&[1])).unwrap();
        assert_eq!(outcome.schedule.sequence_on(1), vec![2]);
    }

    #[test]
    fn test_zero_duration_chain_completes() {
        let mut sim = priority_simulator(DispatchSettings::default());
        let mut pool: ActivityPool = vec![
            job(1, 0, 0),
            job(2, 0, 0).with_predecessor(1),
            job(3, 0, 0).with_predecessor(2),
        ]
        .into_iter()
        .collect();
        let outcome = sim.run(&mut pool, &mut optimize(&[1])).unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.schedule.sequence_on(1), vec![1, 2, 3]);
    }

    #[test]
    fn test_rule_failure_aborts_run() {
        let mut sim = priority_simulator(DispatchSettings::default());
        let mut pool: ActivityPool = vec![job(1, 0, 10).with_attribute(rules::FixedSequence::ATTRIBUTE, "x")]
            .into_iter()
            .collect();
        let err = sim.run(&mut pool, &mut optimize(&[1])).unwrap_err();
        assert!(matches!(err, DispatchError::Rule { ref key, .. } if key == rules::FixedSequence::KEY));
    }

    #[test]
    fn test_runs_are_reproducible() {
        let build = || -> ActivityPool {
            (1..=12)
                .map(|id| {
                    Activity::new(id)
                        .with_priority((id % 3) as i32)
                        .with_process_ticks(5 + id % 4)
                        .with_eligible(1)
                        .with_eligible(2)
                        .with_setup(1, id % 5)
                        .with_setup(2, (id + 2) % 5)
                        .with_release_time(id % 6)
                })
                .collect()
        };
        let weights = WeightTable::new()
            .with_entry(rules::Priority::KEY, WeightEntry::new().with_points(Decimal::from(3)))
            .with_entry(
                rules::ShortestSetup::KEY,
                WeightEntry::new()
                    .with_points(Decimal::ONE)
                    .with_resource_multiplier(Decimal::new(5, 1)),
            );

        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let mut sim = simulator(
                rules::standard_registry(),
                weights.clone(),
                DispatchSettings::default(),
            );
            let outcome = sim.run(&mut build(), &mut optimize(&[1, 2])).unwrap();
            outcomes.push(outcome.schedule.assignments);
        }
        assert_eq!(outcomes[0], outcomes[1]);
        assert_eq!(outcomes[0].len(), 12);
    }
}
