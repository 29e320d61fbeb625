use ahash::AHashMap;

use crate::abstract_operator::AbstractOperator;

/// A decision tree over `(pattern_index, value)` preconditions that
/// retrieves the abstract operators applicable in a given abstract state in
/// time proportional to the number of matches (spec.md §4.2).
///
/// Built once per PDB and never mutated afterwards: there is no removal
/// operation.
pub struct MatchTree {
    root: Node,
}

struct Node {
    /// Operators whose remaining preconditions were already satisfied by
    /// the path taken to reach this node: always applicable from here on.
    done: Vec<usize>,
    split: Option<Split>,
}

struct Split {
    pattern_index: usize,
    /// Operators requiring `state[pattern_index] == value`.
    children: AHashMap<usize, Node>,
    /// Operators with no precondition on `pattern_index`: descended into
    /// regardless of the query state's value there.
    wildcard: Box<Node>,
}

impl MatchTree {
    pub fn build(operators: &[AbstractOperator]) -> MatchTree {
        let entries: Vec<(usize, &[(usize, usize)])> = operators
            .iter()
            .enumerate()
            .map(|(index, op)| (index, op.preconditions.as_slice()))
            .collect();

        MatchTree { root: build_node(entries) }
    }

    /// Returns the indices (into the `operators` slice passed to
    /// [`MatchTree::build`]) of every operator applicable in the abstract
    /// state whose pattern-order assignment is `state`.
    pub fn matches(&self, state: &[usize]) -> Vec<usize> {
        let mut out = Vec::new();
        collect(&self.root, state, &mut out);
        out
    }
}

fn build_node(entries: Vec<(usize, &[(usize, usize)])>) -> Node {
    let mut done = Vec::new();
    let mut active = Vec::new();
    for (index, preconditions) in entries {
        if preconditions.is_empty() {
            done.push(index);
        } else {
            active.push((index, preconditions));
        }
    }

    if active.is_empty() {
        return Node { done, split: None };
    }

    // Splitting on the smallest remaining precondition keeps the tree's
    // depth bounded by the number of *constrained* pattern positions for
    // any one operator, rather than the full pattern length.
    let pattern_index = active.iter().map(|(_, p)| p[0].0).min().unwrap();

    let mut children: AHashMap<usize, Vec<(usize, &[(usize, usize)])>> = AHashMap::new();
    let mut wildcard = Vec::new();

    for (index, preconditions) in active {
        if preconditions[0].0 == pattern_index {
            children.entry(preconditions[0].1).or_default().push((index, &preconditions[1..]));
        } else {
            wildcard.push((index, preconditions));
        }
    }

    let children = children.into_iter().map(|(value, group)| (value, build_node(group))).collect();

    Node {
        done,
        split: Some(Split {
            pattern_index,
            children,
            wildcard: Box::new(build_node(wildcard)),
        }),
    }
}

fn collect(node: &Node, state: &[usize], out: &mut Vec<usize>) {
    out.extend_from_slice(&node.done);

    if let Some(split) = &node.split {
        if let Some(child) = split.children.get(&state[split.pattern_index]) {
            collect(child, state, out);
        }
        collect(&split.wildcard, state, out);
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn op(concrete_operator: usize, preconditions: Vec<(usize, usize)>) -> AbstractOperator {
        AbstractOperator {
            concrete_operator,
            cost: 1,
            preconditions,
            hash_effect: 0,
        }
    }

    #[test]
    fn matches_only_operators_whose_preconditions_hold() {
        let operators = vec![op(0, vec![(0, 1)]), op(1, vec![(0, 0)]), op(2, vec![])];
        let tree = MatchTree::build(&operators);

        let mut matched = tree.matches(&[1]);
        matched.sort_unstable();
        assert_eq!(matched, vec![0, 2]);
    }

    #[test]
    fn wildcard_operator_matches_regardless_of_untested_variable() {
        let operators = vec![op(0, vec![(1, 5)]), op(1, vec![(0, 3)])];
        let tree = MatchTree::build(&operators);

        // Split tests pattern_index 0 first (min over first preconditions,
        // here {1, 0} -> 0); operator 0 has no constraint there and must
        // still be reachable via the wildcard branch.
        let matched = tree.matches(&[3, 5]);
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn empty_precondition_operator_always_matches() {
        let operators = vec![op(0, vec![])];
        let tree = MatchTree::build(&operators);

        assert_eq!(tree.matches(&[0]), vec![0]);
        assert_eq!(tree.matches(&[7]), vec![0]);
    }
}
