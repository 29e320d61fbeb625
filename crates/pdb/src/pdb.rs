use std::collections::VecDeque;

use planner_hash::PerfectHash;
use planner_queue::AdaptivePriorityQueue;
use planner_task::OperatorId;
use planner_task::PlannerError;
use planner_task::Result;
use planner_task::TaskView;
use planner_task::Value;

use crate::abstract_operator::build_abstract_operators;
use crate::abstract_operator::AbstractOperator;
use crate::match_tree::MatchTree;
use crate::Cost;
use crate::INFINITE_COST;

/// A projection table (spec.md §3 "PDB"): a perfect hash over a pattern's
/// assignments, a shortest-path distance for every rank, and optionally a
/// wildcard plan for the concrete initial state. Immutable after
/// construction.
pub struct Pdb {
    hash: PerfectHash,
    distances: Vec<Cost>,
    plan: Option<Vec<Vec<OperatorId>>>,
}

impl Pdb {
    /// Builds the PDB for `pattern` over `task` (spec.md §4.3).
    ///
    /// Fails with [`PlannerError::Unsolvable`] if the concrete initial
    /// state's projection has infinite distance, i.e. no concrete plan can
    /// reach the goal on this pattern's variables alone.
    pub fn build(task: &impl TaskView, pattern: Vec<usize>, wildcard_plan: bool) -> Result<Pdb> {
        let hash = PerfectHash::new(pattern, task)?;
        let operators = build_abstract_operators(task, &hash);
        let goal_states = abstract_goal_states(task, &hash);

        let (distances, generator) = regression_shortest_paths(&hash, &operators, &goal_states);

        let init_assignment: Vec<Value> = hash.pattern().iter().map(|&var| task.initial_value(var)).collect();
        let init_rank = hash.rank(&init_assignment);

        if distances[init_rank] == INFINITE_COST {
            return Err(PlannerError::Unsolvable);
        }

        let plan = if wildcard_plan {
            Some(extract_wildcard_plan(&hash, &operators, &distances, &generator, init_rank))
        } else {
            None
        };

        Ok(Pdb { hash, distances, plan })
    }

    pub fn hash(&self) -> &PerfectHash {
        &self.hash
    }

    /// The admissible distance-to-goal estimate at an abstract `rank`, or
    /// `None` if the rank is unreachable from any abstract goal state.
    pub fn value(&self, rank: usize) -> Option<Cost> {
        match self.distances[rank] {
            INFINITE_COST => None,
            cost => Some(cost),
        }
    }

    /// The value at the rank induced by projecting a full concrete state.
    pub fn concrete_value(&self, concrete_state: &[Value]) -> Option<Cost> {
        self.value(self.hash.rank_state(concrete_state))
    }

    pub fn plan(&self) -> Option<&[Vec<OperatorId>]> {
        self.plan.as_deref()
    }
}

/// Every rank whose unranking satisfies the goal assignment on every
/// pattern variable that has one; pattern variables with no goal fact are
/// free (spec.md §4.3 step 3).
fn abstract_goal_states(task: &impl TaskView, hash: &PerfectHash) -> Vec<usize> {
    let choices: Vec<Vec<usize>> = hash
        .pattern()
        .iter()
        .enumerate()
        .map(|(i, &var)| match task.goal_on(var) {
            Some(goal_value) => vec![goal_value],
            None => (0..hash.domain_at(i)).collect(),
        })
        .collect();

    let mut assignments: Vec<Vec<usize>> = vec![Vec::new()];
    for choice in choices {
        let mut next = Vec::with_capacity(assignments.len() * choice.len());
        for partial in &assignments {
            for &value in &choice {
                let mut extended = partial.clone();
                extended.push(value);
                next.push(extended);
            }
        }
        assignments = next;
    }

    assignments.into_iter().map(|assignment| hash.rank(&assignment)).collect()
}

/// Dijkstra (BFS when every abstract operator has unit cost) over the
/// regression graph, seeded from `goal_states`. Returns the distance vector
/// and, for each rank, the operator whose forward application reaches a
/// strictly closer-to-goal rank (used for wildcard plan extraction).
fn regression_shortest_paths(
    hash: &PerfectHash,
    operators: &[AbstractOperator],
    goal_states: &[usize],
) -> (Vec<Cost>, Vec<Option<usize>>) {
    let size = hash.size();
    let tree = MatchTree::build(operators);

    let mut distances = vec![INFINITE_COST; size];
    let mut generator: Vec<Option<usize>> = vec![None; size];
    let unit_cost = operators.iter().all(|op| op.cost == 1);

    if unit_cost {
        let mut queue = VecDeque::new();
        for &goal in goal_states {
            if distances[goal] == INFINITE_COST {
                distances[goal] = 0;
                queue.push_back(goal);
            }
        }

        while let Some(rank) = queue.pop_front() {
            let assignment = hash.unrank(rank);
            for op_index in tree.matches(&assignment) {
                let predecessor = regress(rank, operators[op_index].hash_effect, size);
                if distances[predecessor] == INFINITE_COST {
                    distances[predecessor] = distances[rank] + 1;
                    generator[predecessor] = Some(op_index);
                    queue.push_back(predecessor);
                }
            }
        }
    } else {
        let mut queue = AdaptivePriorityQueue::new();
        for &goal in goal_states {
            if distances[goal] == INFINITE_COST {
                distances[goal] = 0;
                queue.push(0, goal);
            }
        }

        while let Some((key, rank)) = queue.pop() {
            if key as Cost > distances[rank] {
                continue;
            }

            let assignment = hash.unrank(rank);
            for op_index in tree.matches(&assignment) {
                let op = &operators[op_index];
                let predecessor = regress(rank, op.hash_effect, size);
                let candidate = distances[rank].saturating_add(op.cost);
                if candidate < distances[predecessor] {
                    distances[predecessor] = candidate;
                    generator[predecessor] = Some(op_index);
                    queue.push(candidate as usize, predecessor);
                }
            }
        }
    }

    (distances, generator)
}

/// The predecessor rank reached by regressing across an operator with the
/// given `hash_effect` (spec.md §3 "applied... by `s' = s + hash_effect`").
fn regress(rank: usize, hash_effect: i64, size: usize) -> usize {
    let predecessor = rank as i64 + hash_effect;
    debug_assert!(predecessor >= 0 && (predecessor as usize) < size, "hash_effect must stay within the pattern's rank space");
    predecessor as usize
}

/// Follows the generator chain from `init_rank` to a goal, emitting at each
/// step every operator that ties the chosen one on cost and successor —
/// not just the one the shortest-path search happened to settle on first
/// (spec.md §4.3 "Wildcard plan extraction").
fn extract_wildcard_plan(
    hash: &PerfectHash,
    operators: &[AbstractOperator],
    distances: &[Cost],
    generator: &[Option<usize>],
    init_rank: usize,
) -> Vec<Vec<OperatorId>> {
    let mut plan = Vec::new();
    let mut rank = init_rank;

    while distances[rank] != 0 {
        let op_index = generator[rank].expect("a reachable non-goal rank has a generator");
        let chosen = &operators[op_index];
        let next_rank = (rank as i64 - chosen.hash_effect) as usize;

        // `preconditions` stores regression (post-value) constraints, so an
        // operator's forward applicability at `rank` shows up as a match
        // against the state it would produce, `next_rank`.
        let mut parallel: Vec<OperatorId> = operators
            .iter()
            .filter(|candidate| candidate.cost == chosen.cost && candidate.hash_effect == chosen.hash_effect && candidate.applicable_at(hash, next_rank))
            .map(|candidate| candidate.concrete_operator)
            .collect();
        parallel.sort_unstable();
        parallel.dedup();

        plan.push(parallel);
        rank = next_rank;
    }

    plan
}

#[cfg(test)]
mod tests {
    use planner_task::RawEffect;
    use planner_task::RawOperator;
    use planner_task::RawTask;
    use planner_task::SasTask;
    use test_log::test;

    use super::*;

    fn chain_task() -> SasTask {
        SasTask::try_from_raw(RawTask {
            domains: vec![4],
            initial_state: vec![0],
            goals: vec![(0, 3)],
            operators: vec![
                RawOperator {
                    name: "a".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                    cost: 1,
                },
                RawOperator {
                    name: "b".into(),
                    preconditions: vec![(0, 1)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 2 }],
                    cost: 1,
                },
                RawOperator {
                    name: "c".into(),
                    preconditions: vec![(0, 2)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 3 }],
                    cost: 1,
                },
            ],
            axioms: Vec::new(),
        })
        .unwrap()
    }

    fn dead_end_task() -> SasTask {
        SasTask::try_from_raw(RawTask {
            domains: vec![2],
            initial_state: vec![0],
            goals: vec![(0, 1)],
            operators: Vec::new(),
            axioms: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn chain_distance_equals_number_of_steps_to_goal() {
        let task = chain_task();
        let pdb = Pdb::build(&task, vec![0], false).unwrap();

        assert_eq!(pdb.value(0), Some(3));
        assert_eq!(pdb.value(1), Some(2));
        assert_eq!(pdb.value(3), Some(0));
        assert_eq!(pdb.concrete_value(&[0]), Some(3));
    }

    #[test]
    fn unreachable_goal_is_unsolvable() {
        let task = dead_end_task();
        let result = Pdb::build(&task, vec![0], false);
        assert_eq!(result.err(), Some(PlannerError::Unsolvable));
    }

    #[test]
    fn wildcard_plan_reaches_goal_from_init() {
        let task = chain_task();
        let pdb = Pdb::build(&task, vec![0], true).unwrap();

        let plan = pdb.plan().expect("plan was requested");
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0], vec![0]);
        assert_eq!(plan[1], vec![1]);
        assert_eq!(plan[2], vec![2]);
    }

    #[test]
    fn wildcard_plan_groups_equal_cost_equal_effect_operators() {
        let task = SasTask::try_from_raw(RawTask {
            domains: vec![2],
            initial_state: vec![0],
            goals: vec![(0, 1)],
            operators: vec![
                RawOperator {
                    name: "flip-a".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                    cost: 1,
                },
                RawOperator {
                    name: "flip-b".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                    cost: 1,
                },
            ],
            axioms: Vec::new(),
        })
        .unwrap();

        let pdb = Pdb::build(&task, vec![0], true).unwrap();
        let plan = pdb.plan().expect("plan was requested");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0], vec![0, 1]);
    }
}
