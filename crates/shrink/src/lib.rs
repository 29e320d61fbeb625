//!
//! Shrink strategies: reduce a transition system's state count to fit a size
//! budget by computing a state-equivalence relation (spec.md §4.7).
//!

mod bisimulation;
mod bucketed;
mod f_preserving;

use planner_task::Rng;
use planner_transition_system::IndexedPartition;
use planner_transition_system::TransitionSystem;

pub use bisimulation::AtLimit;
pub use f_preserving::FPreference;

/// A configured shrink strategy variant.
pub enum ShrinkStrategy {
    FPreserving { f: FPreference, h: FPreference },
    Random,
    Bisimulation { greedy: bool, at_limit: AtLimit },
}

/// Computes a state-equivalence relation for `ts` with at most `target_size`
/// classes. A no-op (`None`) unless `ts.num_states() > min(target_size,
/// threshold)`, per the shared shrink-strategy contract.
pub fn shrink(strategy: &ShrinkStrategy, ts: &TransitionSystem, target_size: usize, threshold: usize, rng: &mut impl Rng) -> Option<IndexedPartition> {
    if ts.num_states() <= target_size.min(threshold) {
        return None;
    }

    let partition = match strategy {
        ShrinkStrategy::Random => {
            let all_states: Vec<usize> = (0..ts.num_states()).collect();
            bucketed::bucket_merge(vec![all_states], target_size, rng)
        }
        ShrinkStrategy::FPreserving { f, h } => f_preserving::shrink(ts, *f, *h, target_size, rng),
        ShrinkStrategy::Bisimulation { greedy, at_limit } => bisimulation::shrink(ts, target_size, *greedy, *at_limit),
    };

    Some(partition)
}
