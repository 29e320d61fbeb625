use ahash::AHashMap;

use crate::Cost;
use crate::LabelId;
use crate::LabelSet;
use crate::TransitionSystem;

/// Whether `l1` and `l2` are F-combinable in `ts`: they lie in the same
/// local-equivalence group and have equal individual cost (spec.md §4.6).
///
/// Note that group membership alone is not enough: a group's cost is the
/// *minimum* over its labels' costs (invariant I1), so two labels sharing a
/// group can still have different individual costs.
pub fn f_combinable(ts: &TransitionSystem, l1: LabelId, l2: LabelId, label_set: &LabelSet) -> bool {
    match (ts.group_of(l1), ts.group_of(l2)) {
        (Some(g1), Some(g2)) => g1 == g2 && label_set.cost(l1) == label_set.cost(l2),
        _ => false,
    }
}

/// Computes the outside-equivalence relation for the factor at `exclude_index`:
/// `l1 ~ l2` iff they are F-combinable for every factor other than the
/// excluded one.
///
/// Implementation: start from the single class of all active labels, then
/// refine by intersecting with every other factor's local equivalence
/// relation in turn.
pub fn outside_equivalence(factors: &[&TransitionSystem], exclude_index: usize, label_set: &LabelSet) -> Vec<Vec<LabelId>> {
    let mut classes: Vec<Vec<LabelId>> = vec![label_set.active_labels().collect()];

    for (index, factor) in factors.iter().enumerate() {
        if index == exclude_index {
            continue;
        }

        classes = refine(classes, |label| {
            factor.group_of(label).map(|group| (group, label_set.cost(label)))
        });
    }

    classes
}

fn refine<F>(classes: Vec<Vec<LabelId>>, key_fn: F) -> Vec<Vec<LabelId>>
where
    F: Fn(LabelId) -> Option<(usize, Cost)>,
{
    let mut refined = Vec::new();

    for class in classes {
        let mut buckets: AHashMap<Option<(usize, Cost)>, Vec<LabelId>> = AHashMap::new();
        for label in class {
            buckets.entry(key_fn(label)).or_default().push(label);
        }

        for (_, bucket) in buckets {
            refined.push(bucket);
        }
    }

    refined
}

/// A label mapping entry: a fresh composite label replacing a set of old
/// (now-to-be-deactivated) labels.
pub type LabelMapping = Vec<(LabelId, Vec<LabelId>)>;

/// Allocates one composite label per equivalence class of size > 1 (classes
/// of size 1 are left unchanged, spec.md §4.6).
pub fn emit_label_mapping(classes: Vec<Vec<LabelId>>, label_set: &mut LabelSet) -> LabelMapping {
    let mut mapping = Vec::new();

    for class in classes {
        if class.len() < 2 {
            continue;
        }

        let cost = class.iter().map(|&l| label_set.cost(l)).min().expect("class is non-empty");
        let new_label = label_set.add_composite(cost);
        mapping.push((new_label, class));
    }

    mapping
}

/// Whether every old label of a mapping entry lies in a single group of
/// `ts`, i.e. whether the entry can be applied in O(1) "equivalent" mode
/// rather than needing a full transition-set union.
pub fn is_equivalent_mode_applicable(ts: &TransitionSystem, old_labels: &[LabelId]) -> bool {
    let mut groups = old_labels.iter().filter_map(|&l| ts.group_of(l));
    match groups.next() {
        Some(first) => groups.all(|g| g == first),
        None => true,
    }
}

/// Applies a label mapping to one active factor, dispatching each entry to
/// equivalent or general mode depending on whether it actually qualifies.
pub fn apply_mapping(ts: &mut TransitionSystem, mapping: &LabelMapping, label_set: &LabelSet) {
    for (new_label, old_labels) in mapping {
        if is_equivalent_mode_applicable(ts, old_labels) {
            ts.apply_label_reduction_equivalent(*new_label, old_labels, label_set);
        } else {
            ts.apply_label_reduction_general(*new_label, old_labels, label_set);
        }
    }
}

/// Marks every label replaced by `mapping` inactive. Must be called exactly
/// once per mapping, after it has been applied to every active factor.
pub fn deactivate_reduced_labels(mapping: &LabelMapping, label_set: &mut LabelSet) {
    for (_, old_labels) in mapping {
        for &old in old_labels {
            label_set.deactivate(old);
        }
    }
}

#[cfg(test)]
mod tests {
    use planner_task::RawEffect;
    use planner_task::RawOperator;
    use planner_task::RawTask;
    use planner_task::SasTask;
    use test_log::test;

    use super::*;

    fn two_identical_operators() -> SasTask {
        SasTask::try_from_raw(RawTask {
            domains: vec![2],
            initial_state: vec![0],
            goals: vec![(0, 1)],
            operators: vec![
                RawOperator {
                    name: "a".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                    cost: 1,
                },
                RawOperator {
                    name: "b-same-as-a".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                    cost: 1,
                },
            ],
            axioms: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn identical_operators_end_up_in_one_group() {
        let task = two_identical_operators();
        let label_set = LabelSet::from_task(&task);
        let ts = TransitionSystem::atomic(0, &task, &label_set);

        assert_eq!(ts.group_of(0), ts.group_of(1));
        assert!(f_combinable(&ts, 0, 1, &label_set));
    }

    #[test]
    fn reduction_merges_f_combinable_labels() {
        let task = two_identical_operators();
        let mut label_set = LabelSet::from_task(&task);
        let mut ts = TransitionSystem::atomic(0, &task, &label_set);

        let factors = [&ts];
        let classes = outside_equivalence(&factors, 1, &label_set); // exclude a non-existent second factor
        drop(factors);

        let mapping = emit_label_mapping(classes, &mut label_set);
        assert_eq!(mapping.len(), 1);

        apply_mapping(&mut ts, &mapping, &label_set);
        deactivate_reduced_labels(&mapping, &mut label_set);

        let (new_label, _) = mapping[0];
        assert!(label_set.is_active(new_label));
        assert!(!label_set.is_active(0));
        assert!(!label_set.is_active(1));
        assert_eq!(ts.group_of(new_label), Some(ts.group_of(new_label).unwrap()));
    }
}
