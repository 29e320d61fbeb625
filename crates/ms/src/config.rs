use std::time::Duration;

use planner_merge::MergeStrategy;
use planner_shrink::ShrinkStrategy;

use crate::label_reduction::LabelReductionConfig;

/// Whether (and how) label reduction runs as part of the main loop (spec.md §6).
pub enum LabelReduction {
    None,
    Exact(LabelReductionConfig),
}

/// The full configuration of one [`crate::run`] invocation (spec.md §6).
pub struct MSConfig {
    pub max_states_after_merge: u64,
    pub max_states_before_merge: u64,
    pub shrink_threshold: u64,
    pub prune_unreachable: bool,
    pub prune_irrelevant: bool,
    pub shrink_strategy: ShrinkStrategy,
    pub merge_strategy: MergeStrategy,
    pub label_reduction: LabelReduction,
    pub main_loop_max_time: Option<Duration>,
}
