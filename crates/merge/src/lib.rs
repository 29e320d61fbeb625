//!
//! Merge strategies: choose which pair of active factors to combine next
//! (spec.md §4.8).
//!

mod linear_order;
mod precomputed_tree;
mod score_based;

use planner_task::Rng;
use planner_task::TaskView;
use planner_transition_system::FactoredSystem;

pub use linear_order::build_order;
pub use linear_order::LinearOrder;
pub use precomputed_tree::PrecomputedTree;
pub use score_based::ScoringFunction;

/// A configured merge strategy.
pub enum MergeStrategy {
    PrecomputedTree(PrecomputedTree),
    ScoreBased(Vec<ScoringFunction>),
}

impl MergeStrategy {
    pub fn precomputed_tree(order: LinearOrder, task: &impl TaskView, rng: &mut impl Rng) -> MergeStrategy {
        MergeStrategy::PrecomputedTree(PrecomputedTree::new(order, task, rng))
    }

    pub fn score_based(scorers: Vec<ScoringFunction>) -> MergeStrategy {
        MergeStrategy::ScoreBased(scorers)
    }

    /// Returns the next pair of distinct active factor indices to merge, or
    /// `None` once only one factor remains.
    pub fn next(&mut self, factored: &FactoredSystem, rng: &mut impl Rng) -> Option<(usize, usize)> {
        match self {
            MergeStrategy::PrecomputedTree(tree) => tree.next(),
            MergeStrategy::ScoreBased(scorers) => score_based::next(scorers, factored, rng),
        }
    }

    /// Must be called exactly once after each pair returned by `next()` is
    /// actually merged, with the resulting factor's index. A no-op for
    /// stateless strategies.
    pub fn notify_merged(&mut self, _i: usize, _j: usize, new_factor_index: usize) {
        if let MergeStrategy::PrecomputedTree(tree) = self {
            tree.notify_merged(new_factor_index);
        }
    }
}
