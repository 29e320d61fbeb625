use ahash::AHashMap;

use planner_transition_system::Cost;
use planner_transition_system::IndexedPartition;
use planner_transition_system::TransitionSystem;
use planner_transition_system::INFINITE_COST;

/// How an exact bisimulation refinement behaves once the next split would
/// exceed the size budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtLimit {
    /// Stop immediately and return the coarser, pre-overflow partition.
    Return,
    /// Keep going, then coarsen the overflowing partition back down to
    /// exactly `target_size` (goal/non-goal separation is preserved).
    UseUp,
}

type Signature = (bool, Cost, Vec<(usize, usize)>);

/// Computes a bisimulation-based shrink of `ts` to at most `target_size`
/// classes.
///
/// Two states only ever end up in the same class if they agree on
/// goal-membership and `goal_d`; `greedy` additionally ignores transitions
/// that are not on any shortest path to the goal, which coarsens the
/// relation while remaining admissibility-preserving (spec.md §4.7).
pub fn shrink(ts: &TransitionSystem, target_size: usize, greedy: bool, at_limit: AtLimit) -> IndexedPartition {
    let num_states = ts.num_states();
    let goal_d = |s: usize| -> Cost { ts.distances().map_or(0, |d| d.goal_d[s]) };

    // Precompute each state's outgoing (group_id, target) edges once; under
    // `greedy` mode, only the ones lying on a shortest path to the goal.
    let mut outgoing: Vec<Vec<(usize, usize)>> = vec![Vec::new(); num_states];
    for (group_id, group) in ts.groups() {
        for transition in group.transitions() {
            if greedy {
                if let Some(distances) = ts.distances() {
                    let gd_src = distances.goal_d[transition.src];
                    let gd_target = distances.goal_d[transition.target];
                    let on_shortest_path =
                        gd_src != INFINITE_COST && gd_target != INFINITE_COST && gd_src == group.cost().saturating_add(gd_target);
                    if !on_shortest_path {
                        continue;
                    }
                }
            }
            outgoing[transition.src].push((group_id, transition.target));
        }
    }

    let mut blocks: Vec<usize> = (0..num_states)
        .map(|s| if ts.is_goal(s) { 1 } else { 0 })
        .collect();
    let mut num_blocks = if num_states == 0 {
        0
    } else {
        let has_goal = blocks.iter().any(|&b| b == 1);
        let has_non_goal = blocks.iter().any(|&b| b == 0);
        match (has_goal, has_non_goal) {
            (true, true) => 2,
            _ => 1,
        }
    };

    if num_blocks > target_size {
        // Can't even separate goal from non-goal within budget; there is no
        // coarser option that still respects the invariant.
        return IndexedPartition::from_blocks(blocks);
    }

    loop {
        let previous_blocks = blocks.clone();
        let previous_num_blocks = num_blocks;

        let mut signatures: Vec<Signature> = Vec::with_capacity(num_states);
        for s in 0..num_states {
            let mut entries: Vec<(usize, usize)> = outgoing[s].iter().map(|&(g, t)| (g, blocks[t])).collect();
            entries.sort_unstable();
            entries.dedup();
            signatures.push((ts.is_goal(s), goal_d(s), entries));
        }

        let mut class_of: AHashMap<Signature, usize> = AHashMap::new();
        let mut new_blocks = vec![0usize; num_states];
        for s in 0..num_states {
            let next_id = class_of.len();
            let id = *class_of.entry(signatures[s].clone()).or_insert(next_id);
            new_blocks[s] = id;
        }
        let new_num_blocks = class_of.len();

        if new_num_blocks == previous_num_blocks {
            // Refinement has stabilised: this is the coarsest bisimulation.
            blocks = new_blocks;
            break;
        }

        if new_num_blocks > target_size {
            return match at_limit {
                AtLimit::Return => IndexedPartition::from_blocks(previous_blocks),
                AtLimit::UseUp => coarsen_to_target(ts, new_blocks, new_num_blocks, target_size),
            };
        }

        blocks = new_blocks;
        num_blocks = new_num_blocks;
    }

    IndexedPartition::from_blocks(blocks)
}

/// Merges classes of an overflowing partition pairwise, only ever fusing two
/// classes that share the same goal status, until exactly `target_size`
/// classes remain (or no further same-status pair exists).
fn coarsen_to_target(ts: &TransitionSystem, blocks: Vec<usize>, num_blocks: usize, target_size: usize) -> IndexedPartition {
    let mut block_is_goal = vec![false; num_blocks];
    for (state, &block) in blocks.iter().enumerate() {
        block_is_goal[block] = ts.is_goal(state);
    }

    let mut remap: Vec<usize> = (0..num_blocks).collect();
    let mut alive: Vec<usize> = (0..num_blocks).collect();

    'merge: while alive.len() > target_size {
        for i in 0..alive.len() {
            for j in (i + 1)..alive.len() {
                if block_is_goal[alive[i]] == block_is_goal[alive[j]] {
                    remap[alive[j]] = alive[i];
                    alive.remove(j);
                    continue 'merge;
                }
            }
        }
        break;
    }

    let find_root = |mut block: usize| -> usize {
        while remap[block] != block {
            block = remap[block];
        }
        block
    };

    let mut compact: AHashMap<usize, usize> = AHashMap::new();
    let new_blocks: Vec<usize> = blocks
        .into_iter()
        .map(|b| {
            let target = find_root(b);
            let next_id = compact.len();
            *compact.entry(target).or_insert(next_id)
        })
        .collect();

    IndexedPartition::from_blocks(new_blocks)
}

#[cfg(test)]
mod tests {
    use planner_task::RawEffect;
    use planner_task::RawOperator;
    use planner_task::RawTask;
    use planner_task::SasTask;
    use planner_transition_system::compute_distances;
    use planner_transition_system::LabelSet;
    use planner_transition_system::StatePartition;
    use test_log::test;

    use super::*;

    fn unreachable_goal_with_two_dead_ends() -> SasTask {
        // 0 (init) branches to two dead-end states 1, 2; goal value 3 is
        // never produced by any operator.
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
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 2 }],
                    cost: 1,
                },
            ],
            axioms: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn never_merges_goal_with_non_goal() {
        let task = unreachable_goal_with_two_dead_ends();
        let label_set = LabelSet::from_task(&task);
        let mut ts = TransitionSystem::atomic(0, &task, &label_set);
        ts.set_distances(compute_distances(&ts));

        let partition = shrink(&ts, 2, false, AtLimit::Return);
        let goal_block = partition.block_number(3);
        for state in 0..3 {
            assert_ne!(partition.block_number(state), goal_block);
        }
    }

    #[test]
    fn indistinguishable_dead_ends_merge() {
        let task = unreachable_goal_with_two_dead_ends();
        let label_set = LabelSet::from_task(&task);
        let mut ts = TransitionSystem::atomic(0, &task, &label_set);
        ts.set_distances(compute_distances(&ts));

        // States 1 and 2 are both non-goal terminals with no outgoing
        // transitions, so their signatures coincide regardless of which
        // label reached them.
        let partition = shrink(&ts, 3, false, AtLimit::Return);
        assert_eq!(partition.block_number(1), partition.block_number(2));
        assert_ne!(partition.block_number(0), partition.block_number(1));
        assert_ne!(partition.block_number(3), partition.block_number(1));
    }

    #[test]
    fn use_up_reaches_exact_target_size() {
        let task = unreachable_goal_with_two_dead_ends();
        let label_set = LabelSet::from_task(&task);
        let mut ts = TransitionSystem::atomic(0, &task, &label_set);
        ts.set_distances(compute_distances(&ts));

        let partition = shrink(&ts, 2, false, AtLimit::UseUp);
        assert_eq!(partition.num_of_blocks(), 2);
    }
}
