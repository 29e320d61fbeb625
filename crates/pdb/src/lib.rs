//!
//! Projection (pattern database) construction: perfect hashing, the
//! regression match tree, and shortest-path fill with optional wildcard
//! plan extraction (spec.md §4.1-§4.3).
//!

mod abstract_operator;
mod match_tree;
mod pdb;

pub use abstract_operator::AbstractOperator;
pub use match_tree::MatchTree;
pub use pdb::Pdb;

/// A non-negative operator/plan cost, shared with `planner-transition-system`
/// but kept as an independent alias: PDB construction has no dependency on
/// the M&S data objects (spec.md §2 "Parallel path: TaskView + Pattern → PDB").
pub type Cost = u32;

/// The distance sentinel for ranks unreachable from every abstract goal state.
pub const INFINITE_COST: Cost = Cost::MAX;
