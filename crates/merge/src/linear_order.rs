use std::collections::VecDeque;

use ahash::AHashSet;
use planner_task::Rng;
use planner_task::TaskView;
use planner_task::VarId;

/// A total order over a task's variables, used to seed the leaves of a
/// precomputed merge tree (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearOrder {
    /// Ascending by causal-graph distance to a goal-mentioning variable.
    CausalGraphGoalLevel,
    /// Variable index, highest first.
    ReverseLevel,
    /// Variable index, lowest first.
    Level,
    Random,
}

/// Builds the ordered sequence of variable indices for `order`.
pub fn build_order(order: LinearOrder, task: &impl TaskView, rng: &mut impl Rng) -> Vec<VarId> {
    let num_variables = task.num_variables();
    match order {
        LinearOrder::Level => (0..num_variables).collect(),
        LinearOrder::ReverseLevel => (0..num_variables).rev().collect(),
        LinearOrder::Random => {
            let mut order: Vec<VarId> = (0..num_variables).collect();
            rng.shuffle(&mut order);
            order
        }
        LinearOrder::CausalGraphGoalLevel => causal_graph_goal_level(task),
    }
}

/// Orders variables by ascending causal-graph distance to the nearest
/// goal-mentioning variable: an operator that has `a` in its precondition
/// and `b` in its effect contributes an undirected causal edge `a - b`.
fn causal_graph_goal_level(task: &impl TaskView) -> Vec<VarId> {
    let num_variables = task.num_variables();
    let mut adjacency: Vec<AHashSet<VarId>> = vec![AHashSet::default(); num_variables];

    for op in task.operators() {
        for &(pre_var, _) in &op.preconditions {
            for &(eff_var, _) in &op.effects {
                if pre_var != eff_var {
                    adjacency[pre_var].insert(eff_var);
                    adjacency[eff_var].insert(pre_var);
                }
            }
        }
    }

    let goal_vars: Vec<VarId> = task.goals().iter().map(|&(var, _)| var).collect();

    let mut level = vec![usize::MAX; num_variables];
    let mut queue = VecDeque::new();
    for &var in &goal_vars {
        if level[var] == usize::MAX {
            level[var] = 0;
            queue.push_back(var);
        }
    }
    while let Some(var) = queue.pop_front() {
        for &neighbour in &adjacency[var] {
            if level[neighbour] == usize::MAX {
                level[neighbour] = level[var] + 1;
                queue.push_back(neighbour);
            }
        }
    }

    let mut order: Vec<VarId> = (0..num_variables).collect();
    order.sort_by_key(|&var| (level[var], var));
    order
}

#[cfg(test)]
mod tests {
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

    fn chained_task() -> SasTask {
        // var0 -> var1 -> var2 (goal), via operators whose precondition is
        // on one variable and effect on the next.
        SasTask::try_from_raw(RawTask {
            domains: vec![2, 2, 2],
            initial_state: vec![0, 0, 0],
            goals: vec![(2, 1)],
            operators: vec![
                RawOperator {
                    name: "step01".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 1, value: 1 }],
                    cost: 1,
                },
                RawOperator {
                    name: "step12".into(),
                    preconditions: vec![(1, 1)],
                    effects: vec![RawEffect { conditions: vec![], var: 2, value: 1 }],
                    cost: 1,
                },
            ],
            axioms: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn goal_level_orders_goal_variable_first() {
        let task = chained_task();
        let mut rng = NullRng;
        let order = build_order(LinearOrder::CausalGraphGoalLevel, &task, &mut rng);
        assert_eq!(order[0], 2);
        assert_eq!(order[2], 0);
    }

    #[test]
    fn level_is_identity_order() {
        let task = chained_task();
        let mut rng = NullRng;
        assert_eq!(build_order(LinearOrder::Level, &task, &mut rng), vec![0, 1, 2]);
        assert_eq!(build_order(LinearOrder::ReverseLevel, &task, &mut rng), vec![2, 1, 0]);
    }
}
