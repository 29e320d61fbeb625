use ahash::AHashMap;

use planner_task::Rng;
use planner_transition_system::Cost;
use planner_transition_system::IndexedPartition;
use planner_transition_system::TransitionSystem;
use planner_transition_system::INFINITE_COST;

use crate::bucketed::bucket_merge;

/// Ordering preference for one of the two keys of an `(f, h)` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FPreference {
    High,
    Low,
}

fn order_key(value: Cost, preference: FPreference) -> i64 {
    match preference {
        FPreference::High => -(value as i64),
        FPreference::Low => value as i64,
    }
}

/// Buckets live states by `(f, h) = (g+h, h)`, ordered by the requested
/// preference, and feeds the result to the shared bucket-merging engine.
/// Dead states (unreachable from init, or unable to reach a goal) are
/// collected into a single lowest-priority bucket of their own rather than
/// being excluded outright, so they can still be compressed.
pub fn shrink(ts: &TransitionSystem, f_pref: FPreference, h_pref: FPreference, target_size: usize, rng: &mut impl Rng) -> IndexedPartition {
    let num_states = ts.num_states();
    let mut live: AHashMap<(Cost, Cost), Vec<usize>> = AHashMap::new();
    let mut dead = Vec::new();

    match ts.distances() {
        Some(distances) => {
            for state in 0..num_states {
                let g = distances.init_d[state];
                let h = distances.goal_d[state];
                if g == INFINITE_COST || h == INFINITE_COST {
                    dead.push(state);
                } else {
                    live.entry((g.saturating_add(h), h)).or_default().push(state);
                }
            }
        }
        None => {
            // No distances available: every state is treated as equally
            // important, degenerating to a single bucket.
            for state in 0..num_states {
                live.entry((0, 0)).or_default().push(state);
            }
        }
    }

    let mut keys: Vec<(Cost, Cost)> = live.keys().copied().collect();
    keys.sort_by_key(|&(f, h)| (order_key(f, f_pref), order_key(h, h_pref)));

    let mut buckets: Vec<Vec<usize>> = keys.into_iter().map(|k| live.remove(&k).unwrap()).collect();
    if !dead.is_empty() {
        buckets.push(dead);
    }

    bucket_merge(buckets, target_size, rng)
}
