//!
//! The central merge-and-shrink data objects: labels, transition systems and
//! factored collections thereof, plus shortest-path distance computation.
//!

mod distances;
mod factored_system;
mod label_reduction;
mod label_set;
mod partition;
mod transition_system;

/// Identifier of an abstract state within a single [`TransitionSystem`].
pub type StateId = usize;

/// Identifier of a label within the owning [`LabelSet`].
pub type LabelId = usize;

/// A non-negative operator/label cost.
pub type Cost = u32;

/// The distance sentinel for unreachable/irrelevant states.
pub const INFINITE_COST: Cost = Cost::MAX;

pub use distances::compute_distances;
pub use distances::to_be_pruned;
pub use distances::DistancesData;
pub use factored_system::FactoredSystem;
pub use label_reduction::apply_mapping;
pub use label_reduction::deactivate_reduced_labels;
pub use label_reduction::emit_label_mapping;
pub use label_reduction::f_combinable;
pub use label_reduction::is_equivalent_mode_applicable;
pub use label_reduction::outside_equivalence;
pub use label_reduction::LabelMapping;
pub use label_set::LabelSet;
pub use partition::IndexedPartition;
pub use partition::StatePartition;
pub use transition_system::LabelGroup;
pub use transition_system::Transition;
pub use transition_system::TransitionSystem;
