//!
//! The merge-and-shrink main loop (spec.md §4.9): drives a [`planner_merge::MergeStrategy`]
//! and a [`planner_shrink::ShrinkStrategy`] over a [`planner_transition_system::FactoredSystem`],
//! threading label reduction and unsolvability/size-limit checks through
//! every iteration.
//!

mod algorithm;
mod config;
mod label_reduction;

pub use algorithm::run;
pub use config::LabelReduction;
pub use config::MSConfig;
pub use label_reduction::LabelReductionConfig;
pub use label_reduction::LabelReductionMethod;
pub use label_reduction::LabelReductionOrder;
