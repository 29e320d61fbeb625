use planner_task::Rng;
use planner_transition_system::deactivate_reduced_labels;
use planner_transition_system::emit_label_mapping;
use planner_transition_system::outside_equivalence;
use planner_transition_system::FactoredSystem;
use planner_transition_system::TransitionSystem;

/// Which factors a label-reduction pass targets (spec.md §4.6 "Orchestrator options").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelReductionMethod {
    TwoFactor,
    AllFactors,
    AllFactorsFixpoint,
}

/// The order in which `AllFactors`/`AllFactorsFixpoint` visit the active factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelReductionOrder {
    Regular,
    Reverse,
    Random,
}

#[derive(Debug, Clone, Copy)]
pub struct LabelReductionConfig {
    pub before_shrinking: bool,
    pub before_merging: bool,
    pub method: LabelReductionMethod,
    pub order: LabelReductionOrder,
}

/// Runs one label-reduction orchestration step against the pair about to be
/// merged, per `config.method`.
pub fn reduce(factored: &mut FactoredSystem, config: &LabelReductionConfig, pair: (usize, usize), rng: &mut impl Rng) {
    match config.method {
        LabelReductionMethod::TwoFactor => {
            reduce_for_factor(factored, pair.0);
            reduce_for_factor(factored, pair.1);
        }
        LabelReductionMethod::AllFactors => {
            one_pass(factored, config.order, rng);
        }
        LabelReductionMethod::AllFactorsFixpoint => loop {
            if one_pass(factored, config.order, rng) == 0 {
                break;
            }
        },
    }
}

/// One sweep over the active factors in `order`, each excluded in turn from
/// its own outside-equivalence computation. Returns the total number of
/// composite labels emitted, so the fixpoint loop can detect convergence.
fn one_pass(factored: &mut FactoredSystem, order: LabelReductionOrder, rng: &mut impl Rng) -> usize {
    let mut targets: Vec<usize> = factored.active_indices().collect();
    match order {
        LabelReductionOrder::Regular => {}
        LabelReductionOrder::Reverse => targets.reverse(),
        LabelReductionOrder::Random => rng.shuffle(&mut targets),
    }

    targets.iter().map(|&index| reduce_for_factor(factored, index)).sum()
}

/// Computes the outside-equivalence relation excluding `target_index`, emits
/// a composite label per non-trivial class, and applies the mapping to every
/// active factor. Returns the number of composite labels emitted.
fn reduce_for_factor(factored: &mut FactoredSystem, target_index: usize) -> usize {
    let active: Vec<usize> = factored.active_indices().collect();
    let position = active
        .iter()
        .position(|&index| index == target_index)
        .expect("target factor must be active");

    let factors: Vec<&TransitionSystem> = active.iter().map(|&index| factored.factor(index)).collect();
    let classes = outside_equivalence(&factors, position, factored.label_set());
    drop(factors);

    let mapping = emit_label_mapping(classes, factored.label_set_mut());
    let emitted = mapping.len();
    if emitted == 0 {
        return 0;
    }

    for &index in &active {
        factored.apply_label_mapping_to_factor(index, &mapping);
    }
    deactivate_reduced_labels(&mapping, factored.label_set_mut());

    emitted
}

#[cfg(test)]
mod tests {
    use planner_task::RawEffect;
    use planner_task::RawOperator;
    use planner_task::RawTask;
    use planner_task::SasTask;
    use test_log::test;

    use super::*;

    struct NullRng;
    impl Rng for NullRng {
        fn next_uint(&mut self, bound: usize) -> usize {
            assert!(bound > 0);
            0
        }
        fn shuffle<T>(&mut self, _slice: &mut [T]) {}
    }

    fn two_variable_duplicate_operator_task() -> SasTask {
        SasTask::try_from_raw(RawTask {
            domains: vec![2, 2],
            initial_state: vec![0, 0],
            goals: vec![(0, 1), (1, 1)],
            operators: vec![
                RawOperator {
                    name: "flip0-a".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                    cost: 1,
                },
                RawOperator {
                    name: "flip0-b".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                    cost: 1,
                },
                RawOperator {
                    name: "flip1".into(),
                    preconditions: vec![(1, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 1, value: 1 }],
                    cost: 1,
                },
            ],
            axioms: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn all_factors_pass_merges_duplicate_operators_of_irrelevant_factor() {
        // flip0-a and flip0-b are indistinguishable in factor 1 (both leave
        // it untouched): w.r.t. factor 0, they are F-combinable.
        let task = two_variable_duplicate_operator_task();
        let mut factored = FactoredSystem::atomic(&task);
        let mut rng = NullRng;

        let config = LabelReductionConfig {
            before_shrinking: true,
            before_merging: false,
            method: LabelReductionMethod::AllFactors,
            order: LabelReductionOrder::Regular,
        };
        reduce(&mut factored, &config, (0, 1), &mut rng);

        assert_eq!(factored.factor(1).group_of(0), factored.factor(1).group_of(1));
    }

    #[test]
    fn fixpoint_terminates_when_no_new_reduction_is_found() {
        let task = two_variable_duplicate_operator_task();
        let mut factored = FactoredSystem::atomic(&task);
        let mut rng = NullRng;

        let config = LabelReductionConfig {
            before_shrinking: true,
            before_merging: false,
            method: LabelReductionMethod::AllFactorsFixpoint,
            order: LabelReductionOrder::Regular,
        };
        reduce(&mut factored, &config, (0, 1), &mut rng);

        assert_eq!(factored.factor(1).group_of(0), factored.factor(1).group_of(1));
    }
}
