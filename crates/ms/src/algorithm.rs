use log::debug;
use planner_task::Clock;
use planner_task::PlannerError;
use planner_task::Result;
use planner_task::Rng;
use planner_task::TaskView;
use planner_transition_system::to_be_pruned;
use planner_transition_system::FactoredSystem;
use planner_transition_system::INFINITE_COST;

use crate::config::LabelReduction;
use crate::config::MSConfig;
use crate::label_reduction;

/// Runs the merge-and-shrink main loop (spec.md §4.9): builds the atomic
/// factors, then repeatedly asks the merge strategy for a pair, optionally
/// reduces labels, shrinks each side to fit the size budget, merges, and
/// checks the result for unsolvability.
///
/// A wall-clock timeout is not an error: the loop stops early and the
/// current (possibly multi-factor) system is returned, per spec.md §4.9's
/// "timer expiry ⇒ return current FactoredSystem" failure semantics.
/// Unsolvability, on the other hand, is propagated and the loop never
/// returns a partial result past that point.
pub fn run(task: &impl TaskView, config: &mut MSConfig, clock: &impl Clock, rng: &mut impl Rng) -> Result<FactoredSystem> {
    let mut factored = FactoredSystem::atomic(task);

    let atomic_indices: Vec<usize> = factored.active_indices().collect();
    for index in atomic_indices {
        if prune_and_check_unsolvable(&mut factored, index, config) {
            return Err(PlannerError::Unsolvable);
        }
    }

    while factored.num_active() > 1 {
        if let Some(max_time) = config.main_loop_max_time {
            if clock.now() >= max_time {
                debug!("main loop timer expired with {} active factors remaining", factored.num_active());
                break;
            }
        }

        let Some((i, j)) = config.merge_strategy.next(&factored, rng) else {
            break;
        };
        debug!("merging factors {i} and {j} ({} and {} states)", factored.factor(i).num_states(), factored.factor(j).num_states());

        if let LabelReduction::Exact(lr) = &config.label_reduction {
            if lr.before_shrinking {
                label_reduction::reduce(&mut factored, lr, (i, j), rng);
            }
        }

        let (target_i, target_j) = shrink_targets(factored.factor(i).num_states(), factored.factor(j).num_states(), config);
        maybe_shrink(&mut factored, i, target_i, config, rng);
        maybe_shrink(&mut factored, j, target_j, config, rng);

        if let LabelReduction::Exact(lr) = &config.label_reduction {
            if lr.before_merging {
                label_reduction::reduce(&mut factored, lr, (i, j), rng);
            }
        }

        let size_i = factored.factor(i).num_states() as u64;
        let size_j = factored.factor(j).num_states() as u64;
        if size_i.saturating_mul(size_j) > config.max_states_after_merge {
            return Err(PlannerError::SizeLimitExceeded(format!(
                "product of factors {i} ({size_i} states) and {j} ({size_j} states) would exceed max_states_after_merge={}",
                config.max_states_after_merge
            )));
        }

        let merged = factored.merge(i, j);
        config.merge_strategy.notify_merged(i, j, merged);

        if prune_and_check_unsolvable(&mut factored, merged, config) {
            return Err(PlannerError::Unsolvable);
        }
    }

    Ok(factored)
}

/// Recomputes the factor's distances, reports whether its init state turned
/// out unreachable-to-goal (INF distance), and otherwise prunes it in place
/// per the configured flags.
fn prune_and_check_unsolvable(factored: &mut FactoredSystem, index: usize, config: &MSConfig) -> bool {
    factored.recompute_factor_distances(index);

    let factor = factored.factor(index);
    let init_state = factor.init_state().expect("a freshly (re)computed factor always has an init state");
    let distances = factor.distances().expect("distances were just computed");
    if distances.goal_d[init_state] == INFINITE_COST {
        return true;
    }

    if config.prune_unreachable || config.prune_irrelevant {
        let drop = to_be_pruned(distances, config.prune_unreachable, config.prune_irrelevant);
        factored.prune_factor(index, &drop);
    }

    false
}

/// Per-factor shrink target sizes: clamp each to `max_states_before_merge`,
/// then redistribute toward a balanced split if their product would still
/// exceed `max_states_after_merge` (spec.md §4.9c).
fn shrink_targets(size_i: usize, size_j: usize, config: &MSConfig) -> (usize, usize) {
    let max_before = config.max_states_before_merge as usize;
    let max_after = config.max_states_after_merge as usize;

    let mut target_i = size_i.min(max_before).max(1);
    let mut target_j = size_j.min(max_before).max(1);

    if target_i.saturating_mul(target_j) > max_after {
        let balanced = (max_after as f64).sqrt().floor().max(1.0) as usize;

        if target_i <= balanced {
            target_j = (max_after / target_i).max(1);
        } else if target_j <= balanced {
            target_i = (max_after / target_j).max(1);
        } else {
            target_i = balanced;
            target_j = balanced;
        }
    }

    (target_i, target_j)
}

fn maybe_shrink(factored: &mut FactoredSystem, index: usize, target: usize, config: &MSConfig, rng: &mut impl Rng) {
    let threshold = config.shrink_threshold as usize;
    let partition = {
        let ts = factored.factor(index);
        planner_shrink::shrink(&config.shrink_strategy, ts, target, threshold, rng)
    };

    if let Some(partition) = partition {
        factored.shrink_factor(index, &partition);
    }
}

#[cfg(test)]
mod tests {
    use planner_merge::LinearOrder;
    use planner_merge::MergeStrategy;
    use planner_shrink::ShrinkStrategy;
    use planner_task::FakeClock;
    use planner_task::RawEffect;
    use planner_task::RawOperator;
    use planner_task::RawTask;
    use planner_task::SasTask;
    use test_log::test;

    use super::*;

    struct NullRng;
    impl Rng for NullRng {
        fn next_uint(&mut self, bound: usize) -> usize {
            assert!(bound > 0);
            0
        }
        fn shuffle<T>(&mut self, _slice: &mut [T]) {}
    }

    fn unsolvable_task() -> SasTask {
        SasTask::try_from_raw(RawTask {
            domains: vec![2],
            initial_state: vec![0],
            goals: vec![(0, 1)],
            operators: Vec::new(),
            axioms: Vec::new(),
        })
        .unwrap()
    }

    fn three_variable_task() -> SasTask {
        SasTask::try_from_raw(RawTask {
            domains: vec![2, 2, 2],
            initial_state: vec![0, 0, 0],
            goals: vec![(0, 1), (1, 1), (2, 1)],
            operators: vec![
                RawOperator {
                    name: "a".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                    cost: 1,
                },
                RawOperator {
                    name: "b".into(),
                    preconditions: vec![(1, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 1, value: 1 }],
                    cost: 1,
                },
                RawOperator {
                    name: "c".into(),
                    preconditions: vec![(2, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 2, value: 1 }],
                    cost: 1,
                },
            ],
            axioms: Vec::new(),
        })
        .unwrap()
    }

    fn base_config(task: &SasTask, rng: &mut impl Rng) -> MSConfig {
        MSConfig {
            max_states_after_merge: 1_000,
            max_states_before_merge: 1_000,
            shrink_threshold: 1_000,
            prune_unreachable: true,
            prune_irrelevant: true,
            shrink_strategy: ShrinkStrategy::Random,
            merge_strategy: MergeStrategy::precomputed_tree(LinearOrder::Level, task, rng),
            label_reduction: LabelReduction::None,
            main_loop_max_time: None,
        }
    }

    #[test]
    fn unsolvable_atomic_factor_is_reported() {
        let task = unsolvable_task();
        let mut rng = NullRng;
        let mut config = base_config(&task, &mut rng);
        let clock = FakeClock::new();

        let result = run(&task, &mut config, &clock, &mut rng);
        assert_eq!(result, Err(PlannerError::Unsolvable));
    }

    #[test]
    fn three_variable_task_merges_down_to_one_factor() {
        let task = three_variable_task();
        let mut rng = NullRng;
        let mut config = base_config(&task, &mut rng);
        let clock = FakeClock::new();

        let factored = run(&task, &mut config, &clock, &mut rng).expect("task is solvable");
        assert_eq!(factored.num_active(), 1);
    }

    #[test]
    fn expired_timer_returns_partial_result_not_an_error() {
        use std::time::Duration;

        let task = three_variable_task();
        let mut rng = NullRng;
        let mut config = base_config(&task, &mut rng);
        config.main_loop_max_time = Some(Duration::ZERO);
        let clock = FakeClock::new();
        clock.advance(Duration::from_secs(1));

        let factored = run(&task, &mut config, &clock, &mut rng).expect("a timeout is not an error");
        assert_eq!(factored.num_active(), 3, "no merge should have run past an already-expired timer");
    }
}
