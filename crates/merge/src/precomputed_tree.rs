use planner_task::TaskView;
use planner_task::VarId;

use crate::linear_order::build_order;
use crate::linear_order::LinearOrder;

#[derive(Debug, Clone, Copy)]
struct Node {
    left: Option<usize>,
    right: Option<usize>,
    /// The factor index this node's subtree currently collapses to, once its
    /// children (if any) have all been merged away.
    resolved_factor: Option<usize>,
}

/// A fixed binary tree over the task's variables (spec.md §4.8): `next()`
/// returns the pair of leaves under the deepest node both of whose children
/// are already resolved to a single active factor; [`PrecomputedTree::notify_merged`]
/// substitutes the merge's result back into that node.
pub struct PrecomputedTree {
    nodes: Vec<Node>,
    root: usize,
    pending: Option<usize>,
}

impl PrecomputedTree {
    pub fn new(order: LinearOrder, task: &impl TaskView, rng: &mut impl planner_task::Rng) -> PrecomputedTree {
        let sequence = build_order(order, task, rng);
        PrecomputedTree::from_sequence(&sequence)
    }

    fn from_sequence(sequence: &[VarId]) -> PrecomputedTree {
        let mut nodes = Vec::new();
        let mut level: Vec<usize> = sequence
            .iter()
            .map(|&var| {
                nodes.push(Node { left: None, right: None, resolved_factor: Some(var) });
                nodes.len() - 1
            })
            .collect();

        while level.len() > 1 {
            let mut next_level = Vec::new();
            let mut iter = level.into_iter();
            loop {
                match (iter.next(), iter.next()) {
                    (Some(a), Some(b)) => {
                        nodes.push(Node { left: Some(a), right: Some(b), resolved_factor: None });
                        next_level.push(nodes.len() - 1);
                    }
                    (Some(a), None) => {
                        // Odd one out: carried up unchanged to the next level.
                        next_level.push(a);
                    }
                    (None, _) => break,
                }
            }
            level = next_level;
        }

        let root = level.first().copied().unwrap_or(0);
        PrecomputedTree { nodes, root, pending: None }
    }

    /// Finds the deepest node whose children are both resolved but who
    /// itself is not, via post-order DFS (children are visited, hence
    /// resolved-or-not, before their parent).
    pub fn next(&mut self) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None; // (node index, depth)
        self.find_ready(self.root, 0, &mut best);

        let (node_index, _) = best?;
        self.pending = Some(node_index);
        let node = self.nodes[node_index];
        let left = self.nodes[node.left.expect("ready node has a left child")].resolved_factor.expect("ready");
        let right = self.nodes[node.right.expect("ready node has a right child")].resolved_factor.expect("ready");
        Some((left, right))
    }

    fn find_ready(&self, node_index: usize, depth: usize, best: &mut Option<(usize, usize)>) {
        let node = self.nodes[node_index];
        if node.resolved_factor.is_some() {
            return;
        }

        if let Some(left) = node.left {
            self.find_ready(left, depth + 1, best);
        }
        if let Some(right) = node.right {
            self.find_ready(right, depth + 1, best);
        }

        let ready = match (node.left, node.right) {
            (Some(l), Some(r)) => self.nodes[l].resolved_factor.is_some() && self.nodes[r].resolved_factor.is_some(),
            _ => false,
        };

        if ready {
            let better = match best {
                Some((_, best_depth)) => depth > *best_depth,
                None => true,
            };
            if better {
                *best = Some((node_index, depth));
            }
        }
    }

    /// Records that the pair most recently returned by `next()` was merged
    /// into `new_factor_index`.
    pub fn notify_merged(&mut self, new_factor_index: usize) {
        let node_index = self.pending.take().expect("notify_merged called without a pending next()");
        self.nodes[node_index].resolved_factor = Some(new_factor_index);
    }
}
