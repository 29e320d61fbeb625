use planner_hash::PerfectHash;
use planner_task::OperatorId;
use planner_task::TaskView;

use crate::Cost;

/// A regression-form operator over a pattern's abstract states (spec.md §3
/// "AbstractOperator"): "applied" to an abstract state by adding
/// `hash_effect` to its rank.
///
/// Built once per PDB and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct AbstractOperator {
    pub concrete_operator: OperatorId,
    pub cost: Cost,
    /// Strictly increasing by pattern index (spec.md §3 invariant).
    pub preconditions: Vec<(usize, usize)>,
    pub hash_effect: i64,
}

impl AbstractOperator {
    /// Whether this operator is applicable in the abstract state at `rank`:
    /// every precondition's pattern-position value matches.
    pub fn applicable_at(&self, hash: &PerfectHash, rank: usize) -> bool {
        self.preconditions.iter().all(|&(i, value)| hash.unrank_var(rank, i) == value)
    }
}

/// Builds the regression form of every concrete operator that touches at
/// least one pattern variable (spec.md §4.3 step 2).
///
/// For each pattern position, a concrete operator contributes one of:
/// - an effect on it: a regression precondition fixing that position to the
///   effect's post-value, plus a hash-effect term derived from the pre-value
///   (multiplied out across every possible pre-value if the operator leaves
///   the precondition unspecified);
/// - a precondition but no effect on it: a regression precondition fixing
///   that position to the precondition's value (the variable never changes,
///   so the post- and pre-state agree and the hash-effect term is zero);
/// - neither: no constraint, the operator is irrelevant to that position.
pub fn build_abstract_operators(task: &impl TaskView, hash: &PerfectHash) -> Vec<AbstractOperator> {
    let pattern = hash.pattern().to_vec();
    let mut operators = Vec::new();

    for (op_id, op) in task.operators().enumerate() {
        if pattern.iter().all(|&var| op.effect_on(var).is_none()) {
            continue;
        }

        // Each in-progress variant accumulates (pattern_index, required_value, hash_delta)
        // triples; multiple variants arise only from multiplying out an
        // unspecified pre-value.
        let mut variants: Vec<Vec<(usize, usize, i64)>> = vec![Vec::new()];

        for (i, &var) in pattern.iter().enumerate() {
            match (op.precondition_on(var), op.effect_on(var)) {
                (pre, Some(eff)) => {
                    let multiplier = hash.multiplier(i) as i64;
                    let pre_values: Vec<usize> = match pre {
                        Some(p) => vec![p],
                        None => (0..hash.domain_at(i)).collect(),
                    };

                    let mut next = Vec::with_capacity(variants.len() * pre_values.len());
                    for variant in &variants {
                        for &pre_value in &pre_values {
                            let mut extended = variant.clone();
                            extended.push((i, eff, (pre_value as i64 - eff as i64) * multiplier));
                            next.push(extended);
                        }
                    }
                    variants = next;
                }
                (Some(pre), None) => {
                    for variant in &mut variants {
                        variant.push((i, pre, 0));
                    }
                }
                (None, None) => {}
            }
        }

        for variant in variants {
            let mut preconditions: Vec<(usize, usize)> = variant.iter().map(|&(i, value, _)| (i, value)).collect();
            preconditions.sort_unstable_by_key(|&(i, _)| i);
            let hash_effect = variant.iter().map(|&(_, _, delta)| delta).sum();

            operators.push(AbstractOperator {
                concrete_operator: op_id,
                cost: op.cost,
                preconditions,
                hash_effect,
            });
        }
    }

    operators
}
