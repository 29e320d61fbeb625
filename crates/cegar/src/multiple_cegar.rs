//!
//! Multiple-CEGAR (spec.md §4.12): repeatedly runs [`crate::single_cegar::run`]
//! restricted to one randomly drawn goal variable at a time, accumulating
//! patterns across runs under a shared time and collection-size budget, with
//! idle-duration stagnation detection that blacklists a variable when a run
//! stops contributing anything new.
//!

use std::time::Duration;

use ahash::AHashSet;
use log::debug;
use planner_pdb::Pdb;
use planner_task::Clock;
use planner_task::OperatorId;
use planner_task::Result;
use planner_task::Rng;
use planner_task::TaskView;
use planner_task::VarId;

use crate::single_cegar;
use crate::single_cegar::CegarConfig;

/// Budgets shared across every inner Single-CEGAR run (spec.md §4.12).
#[derive(Debug, Clone, Copy)]
pub struct MultipleCegarConfig {
    pub max_pdb_size: usize,
    pub total_collection_max_size: usize,
    pub total_time_limit: Duration,
    /// How long a run must go without growing the collection before a
    /// goal variable is blacklisted to force diversity.
    pub stagnation_limit: Duration,
    pub wildcard_plans: bool,
}

pub struct MultipleCegarResult {
    pub patterns: Vec<Vec<VarId>>,
    pub pdbs: Vec<Pdb>,
    pub concrete_plan: Option<Vec<Vec<OperatorId>>>,
}

pub fn run(task: &impl TaskView, config: &MultipleCegarConfig, clock: &impl Clock, rng: &mut impl Rng) -> Result<MultipleCegarResult> {
    let goal_vars: Vec<VarId> = task.goals().iter().map(|&(var, _)| var).collect();
    debug_assert!(!goal_vars.is_empty(), "a task with no goal has nothing for multiple-CEGAR to cover");

    let mut blacklisted: AHashSet<VarId> = AHashSet::default();
    let mut seen_patterns: AHashSet<Vec<VarId>> = AHashSet::default();
    let mut patterns = Vec::new();
    let mut pdbs = Vec::new();
    let mut collection_size: usize = 0;
    let mut last_progress = clock.now();

    loop {
        if clock.now() >= config.total_time_limit {
            debug!("multiple-CEGAR total time limit reached with {} patterns", patterns.len());
            break;
        }

        let candidates: Vec<VarId> = goal_vars.iter().copied().filter(|var| !blacklisted.contains(var)).collect();
        if candidates.is_empty() {
            debug!("multiple-CEGAR has blacklisted every goal variable");
            break;
        }

        let remaining_size = config.total_collection_max_size.saturating_sub(collection_size);
        if remaining_size == 0 {
            debug!("multiple-CEGAR collection size budget exhausted");
            break;
        }

        let goal_var = candidates[rng.next_uint(candidates.len())];
        let goal_value = task.goal_on(goal_var).expect("goal_var is drawn from the task's own goal set");

        let run_config = CegarConfig {
            max_pdb_size: config.max_pdb_size.min(remaining_size),
            max_collection_size: remaining_size,
            max_time: Some(config.total_time_limit.saturating_sub(clock.now())),
            wildcard_plans: config.wildcard_plans,
        };

        let outcome = single_cegar::run(task, &[(goal_var, goal_value)], &run_config, clock, rng, blacklisted.clone())?;

        if let Some(plan) = outcome.concrete_plan {
            return Ok(MultipleCegarResult { patterns: outcome.patterns, pdbs: outcome.pdbs, concrete_plan: Some(plan) });
        }

        let mut grew = false;
        for (pattern, pdb) in outcome.patterns.into_iter().zip(outcome.pdbs.into_iter()) {
            if seen_patterns.insert(pattern.clone()) {
                collection_size += pdb.hash().size();
                patterns.push(pattern);
                pdbs.push(pdb);
                grew = true;
            }
        }

        if grew {
            last_progress = clock.now();
        } else if clock.now().saturating_sub(last_progress) >= config.stagnation_limit {
            let victim = candidates[rng.next_uint(candidates.len())];
            debug!("multiple-CEGAR stagnated, blacklisting variable {victim}");
            blacklisted.insert(victim);
            last_progress = clock.now();
        }
    }

    Ok(MultipleCegarResult { patterns, pdbs, concrete_plan: None })
}

#[cfg(test)]
mod tests {
    use planner_task::FakeClock;
    use planner_task::RawEffect;
    use planner_task::RawOperator;
    use planner_task::RawTask;
    use planner_task::SasTask;
    use test_log::test;

    use super::*;

    /// Returns indices `0, 1, 2, ...` (mod the requested bound) in turn, so
    /// successive draws visit every candidate instead of sticking to one.
    struct CyclingRng {
        next: usize,
    }
    impl Rng for CyclingRng {
        fn next_uint(&mut self, bound: usize) -> usize {
            assert!(bound > 0);
            let value = self.next % bound;
            self.next += 1;
            value
        }
        fn shuffle<T>(&mut self, _slice: &mut [T]) {}
    }

    fn two_independent_flips_task() -> SasTask {
        SasTask::try_from_raw(RawTask {
            domains: vec![2, 2],
            initial_state: vec![0, 0],
            goals: vec![(0, 1), (1, 1)],
            operators: vec![
                RawOperator {
                    name: "flip0".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                    cost: 1,
                },
                RawOperator {
                    name: "flip1".into(),
                    preconditions: vec![(1, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 1, value: 1 }],
                    cost: 1,
                },
            ],
            axioms: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn accumulates_one_singleton_pattern_per_goal_variable() {
        let task = two_independent_flips_task();
        let clock = FakeClock::new();
        let mut rng = CyclingRng { next: 0 };
        let config = MultipleCegarConfig {
            max_pdb_size: 1_000_000,
            total_collection_max_size: 1_000_000,
            total_time_limit: Duration::from_secs(1),
            stagnation_limit: Duration::ZERO,
            wildcard_plans: true,
        };

        let result = run(&task, &config, &clock, &mut rng).unwrap();

        assert!(result.concrete_plan.is_none(), "neither singleton pattern alone satisfies both goal variables");
        let mut patterns = result.patterns;
        patterns.sort();
        assert_eq!(patterns, vec![vec![0], vec![1]]);
    }

    #[test]
    fn stagnation_blacklists_repeat_draws_until_the_loop_runs_dry() {
        let task = two_independent_flips_task();
        let clock = FakeClock::new();
        // Always draws candidate slot 0: with the FakeClock never advancing
        // and a zero stagnation limit, every run that fails to contribute a
        // new pattern blacklists its goal variable immediately. The loop
        // must still terminate (every goal variable eventually blacklisted
        // or already collected) rather than spin forever on a degenerate RNG.
        struct StuckRng;
        impl Rng for StuckRng {
            fn next_uint(&mut self, _bound: usize) -> usize {
                0
            }
            fn shuffle<T>(&mut self, _slice: &mut [T]) {}
        }
        let mut rng = StuckRng;
        let config = MultipleCegarConfig {
            max_pdb_size: 1_000_000,
            total_collection_max_size: 1_000_000,
            total_time_limit: Duration::from_secs(1),
            stagnation_limit: Duration::ZERO,
            wildcard_plans: true,
        };

        let result = run(&task, &config, &clock, &mut rng).unwrap();

        assert!(result.concrete_plan.is_none());
        let mut patterns = result.patterns;
        patterns.sort();
        assert_eq!(patterns, vec![vec![0], vec![1]]);
    }
}
