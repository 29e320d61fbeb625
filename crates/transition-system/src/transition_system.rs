use ahash::AHashMap;

use planner_hash::Pattern;
use planner_task::TaskView;
use planner_task::VarId;

use crate::distances::DistancesData;
use crate::partition::StatePartition;
use crate::Cost;
use crate::LabelId;
use crate::LabelSet;
use crate::StateId;

/// A single directed, labelled edge between two abstract states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Transition {
    pub src: StateId,
    pub target: StateId,
}

impl Transition {
    pub fn new(src: StateId, target: StateId) -> Transition {
        Transition { src, target }
    }
}

/// The equivalence class of labels that are locally equivalent in one
/// [`TransitionSystem`]: identical transition set, identical cost (spec.md
/// §3, invariant I1).
#[derive(Debug, Clone, PartialEq)]
pub struct LabelGroup {
    labels: Vec<LabelId>,
    cost: Cost,
    transitions: Vec<Transition>,
}

impl LabelGroup {
    pub fn labels(&self) -> &[LabelId] {
        &self.labels
    }

    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    fn key(&self) -> (Cost, &[Transition]) {
        (self.cost, &self.transitions)
    }
}

/// The central merge-and-shrink data object: an explicit finite transition
/// system that abstracts (a projection of) the concrete planning task.
///
/// `groups` is an arena with tombstoned slots (Design Notes §9): merging two
/// label groups, or a label group dying out, leaves a `None` hole rather than
/// shifting every other group's index. [`TransitionSystem::recompute_label_equivalences`]
/// compacts the arena as part of restoring the (I1)-(I2) normal form.
#[derive(Debug, PartialEq)]
pub struct TransitionSystem {
    num_states: usize,
    init_state: Option<StateId>,
    goals: Vec<bool>,
    groups: Vec<Option<LabelGroup>>,
    label_to_group: Vec<Option<usize>>,
    pattern: Vec<VarId>,
    distances: Option<DistancesData>,
}

impl TransitionSystem {
    /// Builds the atomic transition system for a single SAS+ variable.
    pub fn atomic(var: VarId, task: &impl TaskView, label_set: &LabelSet) -> TransitionSystem {
        let num_states = task.domain(var);
        let init_state = Some(task.initial_value(var));

        let goals = match task.goal_on(var) {
            Some(value) => (0..num_states).map(|s| s == value).collect(),
            None => vec![true; num_states],
        };

        let mut label_transitions: Vec<Vec<Transition>> = vec![Vec::new(); label_set.num_labels()];

        for (op_id, op) in task.operators().enumerate() {
            match (op.precondition_on(var), op.effect_on(var)) {
                (Some(pre), Some(post)) => label_transitions[op_id].push(Transition::new(pre, post)),
                (None, Some(post)) => {
                    for pre in 0..num_states {
                        label_transitions[op_id].push(Transition::new(pre, post));
                    }
                }
                (Some(pre), None) => label_transitions[op_id].push(Transition::new(pre, pre)),
                (None, None) => {
                    for s in 0..num_states {
                        label_transitions[op_id].push(Transition::new(s, s));
                    }
                }
            }
        }

        let mut groups = Vec::with_capacity(label_set.num_labels());
        let mut label_to_group = vec![None; label_set.num_labels()];

        for (label, mut transitions) in label_transitions.into_iter().enumerate() {
            transitions.sort_unstable();
            transitions.dedup();

            label_to_group[label] = Some(groups.len());
            groups.push(Some(LabelGroup {
                labels: vec![label],
                cost: label_set.cost(label),
                transitions,
            }));
        }

        let mut ts = TransitionSystem {
            num_states,
            init_state,
            goals,
            groups,
            label_to_group,
            pattern: vec![var],
            distances: None,
        };

        ts.recompute_label_equivalences(label_set);
        ts
    }

    /// Builds the synchronised product of two factors.
    ///
    /// Both factors must be unpruned (`init_state.is_some()`); the caller
    /// (`FactoredSystem::merge`) is responsible for having already stopped
    /// the pipeline if either factor was found unsolvable.
    pub fn product(a: &TransitionSystem, b: &TransitionSystem, label_set: &LabelSet) -> TransitionSystem {
        debug_assert!(a.init_state.is_some() && b.init_state.is_some());

        let num_states = a.num_states * b.num_states;
        let index = |sa: StateId, sb: StateId| sa * b.num_states + sb;

        let init_state = Some(index(a.init_state.unwrap(), b.init_state.unwrap()));

        let mut goals = vec![false; num_states];
        for sa in 0..a.num_states {
            for sb in 0..b.num_states {
                goals[index(sa, sb)] = a.goals[sa] && b.goals[sb];
            }
        }

        // Bucket active labels by (groupA, groupB) so the cartesian product of
        // transitions is only built once per distinct pair (spec.md §4.4
        // "relevance optimisation").
        let mut buckets: AHashMap<(usize, usize), Vec<LabelId>> = AHashMap::new();
        for label in label_set.active_labels() {
            if let (Some(ga), Some(gb)) = (a.group_of(label), b.group_of(label)) {
                buckets.entry((ga, gb)).or_default().push(label);
            }
        }

        let mut groups = Vec::with_capacity(buckets.len());
        let mut label_to_group = vec![None; label_set.num_labels()];

        for ((ga, gb), labels) in buckets {
            let group_a = a.group(ga);
            let group_b = b.group(gb);

            let mut transitions = Vec::with_capacity(group_a.transitions.len() * group_b.transitions.len());
            for ta in &group_a.transitions {
                for tb in &group_b.transitions {
                    transitions.push(Transition::new(index(ta.src, tb.src), index(ta.target, tb.target)));
                }
            }
            transitions.sort_unstable();
            transitions.dedup();

            let cost = labels.iter().map(|&l| label_set.cost(l)).min().unwrap_or(0);
            let group_index = groups.len();
            for &label in &labels {
                label_to_group[label] = Some(group_index);
            }
            groups.push(Some(LabelGroup { labels, cost, transitions }));
        }

        let mut pattern = a.pattern.clone();
        pattern.extend(b.pattern.iter().copied());
        pattern.sort_unstable();

        let mut ts = TransitionSystem {
            num_states,
            init_state,
            goals,
            groups,
            label_to_group,
            pattern,
            distances: None,
        };

        ts.recompute_label_equivalences(label_set);
        ts
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn init_state(&self) -> Option<StateId> {
        self.init_state
    }

    pub fn is_goal(&self, state: StateId) -> bool {
        self.goals[state]
    }

    pub fn pattern(&self) -> &[VarId] {
        &self.pattern
    }

    pub fn pattern_as_hash_input(&self) -> Pattern {
        self.pattern.clone()
    }

    pub fn distances(&self) -> Option<&DistancesData> {
        self.distances.as_ref()
    }

    /// Invalidates the cached distances; the next call to
    /// [`crate::distances::compute_distances`] will recompute them.
    pub fn invalidate_distances(&mut self) {
        self.distances = None;
    }

    pub fn set_distances(&mut self, distances: DistancesData) {
        self.distances = Some(distances);
    }

    pub fn group_of(&self, label: LabelId) -> Option<usize> {
        self.label_to_group.get(label).copied().flatten()
    }

    pub fn group(&self, group_index: usize) -> &LabelGroup {
        self.groups[group_index].as_ref().expect("group index must be live")
    }

    /// Iterates over the live (non-tombstoned) groups.
    pub fn groups(&self) -> impl Iterator<Item = (usize, &LabelGroup)> {
        self.groups
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.as_ref().map(|g| (i, g)))
    }

    /// Removes states for which `drop[state]` is true, renumbering the
    /// survivors consecutively in their original relative order.
    pub fn prune(&mut self, drop: &[bool], label_set: &LabelSet) {
        debug_assert_eq!(drop.len(), self.num_states);

        let mut remap = vec![None; self.num_states];
        let mut next = 0;
        for state in 0..self.num_states {
            if !drop[state] {
                remap[state] = Some(next);
                next += 1;
            }
        }

        let new_num_states = next;
        let new_goals: Vec<bool> = (0..self.num_states)
            .filter(|&s| !drop[s])
            .map(|s| self.goals[s])
            .collect();

        let new_init = self.init_state.and_then(|s| remap[s]);

        for group in self.groups.iter_mut().flatten() {
            let mut transitions: Vec<Transition> = group
                .transitions
                .iter()
                .filter_map(|t| match (remap[t.src], remap[t.target]) {
                    (Some(src), Some(target)) => Some(Transition::new(src, target)),
                    _ => None,
                })
                .collect();
            transitions.sort_unstable();
            transitions.dedup();
            group.transitions = transitions;
        }

        self.num_states = new_num_states;
        self.goals = new_goals;
        self.init_state = new_init;

        if new_init.is_none() {
            debug_assert_eq!(self.num_states, 0, "an unreachable init implies an empty factor (I3)");
        }

        // Truncating transitions can make two previously-distinct groups
        // coincide; re-canonicalise to restore (I1)-(I2).
        self.recompute_label_equivalences(label_set);
    }

    /// Applies a state-equivalence relation, replacing each class by a
    /// single representative state (spec.md §4.4 "Shrink application").
    pub fn apply_shrink(&mut self, partition: &impl StatePartition, label_set: &LabelSet) {
        let new_num_states = partition.num_of_blocks();

        let distances_survive = match &self.distances {
            None => false,
            Some(distances) => {
                let mut representative_g = vec![None; new_num_states];
                let mut representative_h = vec![None; new_num_states];
                let mut survives = true;

                for state in 0..self.num_states {
                    let block = partition.block_number(state);
                    let g = distances.init_d[state];
                    let h = distances.goal_d[state];

                    match representative_g[block] {
                        None => {
                            representative_g[block] = Some(g);
                            representative_h[block] = Some(h);
                        }
                        Some(rg) if rg == g && representative_h[block] == Some(h) => {}
                        _ => survives = false,
                    }
                }

                survives
            }
        };

        let mut new_goals = vec![false; new_num_states];
        for state in 0..self.num_states {
            let block = partition.block_number(state);
            new_goals[block] |= self.goals[state];
        }

        let new_init = self.init_state.map(|s| partition.block_number(s));

        for group in self.groups.iter_mut().flatten() {
            let mut transitions: Vec<Transition> = group
                .transitions
                .iter()
                .map(|t| Transition::new(partition.block_number(t.src), partition.block_number(t.target)))
                .collect();
            transitions.sort_unstable();
            transitions.dedup();
            group.transitions = transitions;
        }

        self.num_states = new_num_states;
        self.goals = new_goals;
        self.init_state = new_init;

        if !distances_survive {
            self.distances = None;
        }

        self.recompute_label_equivalences(label_set);
    }

    /// Replaces `old_labels` by `new_label` in `equivalent` mode: the caller
    /// guarantees every label in `old_labels` currently occupies the same
    /// group, so the new label is spliced into that group without touching
    /// its transitions.
    pub fn apply_label_reduction_equivalent(&mut self, new_label: LabelId, old_labels: &[LabelId], label_set: &LabelSet) {
        let group_index = old_labels
            .iter()
            .map(|&l| self.group_of(l).expect("reduced label must be active"))
            .reduce(|a, b| {
                debug_assert_eq!(a, b, "equivalent-mode reduction requires a single shared group");
                b
            })
            .expect("old_labels must be non-empty");

        debug_assert_eq!(
            label_set.cost(new_label),
            self.group(group_index).cost,
            "equivalent-mode reduction must not change the group's cost"
        );

        let group = self.groups[group_index].as_mut().expect("group index must be live");
        group.labels.retain(|l| !old_labels.contains(l));
        group.labels.push(new_label);
        group.labels.sort_unstable();

        for &old in old_labels {
            self.label_to_group[old] = None;
        }
        self.label_to_group[new_label] = Some(group_index);
    }

    /// Replaces `old_labels` by `new_label` in `general` mode: old labels may
    /// come from different groups, so their transitions are unioned and the
    /// result is folded into a matching existing group or becomes a new one.
    pub fn apply_label_reduction_general(&mut self, new_label: LabelId, old_labels: &[LabelId], label_set: &LabelSet) {
        let mut union: Vec<Transition> = Vec::new();
        let mut touched_groups = Vec::new();

        for &old in old_labels {
            if let Some(group_index) = self.group_of(old) {
                touched_groups.push(group_index);
                union.extend_from_slice(&self.groups[group_index].as_ref().unwrap().transitions);
            }
        }
        union.sort_unstable();
        union.dedup();

        touched_groups.sort_unstable();
        touched_groups.dedup();
        for group_index in touched_groups {
            self.remove_labels_from_group(group_index, old_labels);
        }

        let cost = label_set.cost(new_label);
        let existing = self
            .groups()
            .find(|(_, g)| g.cost == cost && g.transitions == union.as_slice())
            .map(|(i, _)| i);

        match existing {
            Some(group_index) => {
                self.label_to_group[new_label] = Some(group_index);
                self.groups[group_index]
                    .as_mut()
                    .unwrap()
                    .labels
                    .push(new_label);
                self.groups[group_index].as_mut().unwrap().labels.sort_unstable();
            }
            None => {
                let group_index = self.groups.len();
                self.label_to_group[new_label] = Some(group_index);
                self.groups.push(Some(LabelGroup {
                    labels: vec![new_label],
                    cost,
                    transitions: union,
                }));
            }
        }
    }

    fn remove_labels_from_group(&mut self, group_index: usize, labels: &[LabelId]) {
        let group = self.groups[group_index].as_mut().expect("group index must be live");
        group.labels.retain(|l| !labels.contains(l));
        if group.labels.is_empty() {
            self.groups[group_index] = None;
        }
        for &label in labels {
            self.label_to_group[label] = None;
        }
    }

    /// Merges groups that share an identical (cost, transitions) key and
    /// drops empty groups, restoring invariants (I1)-(I2). Also compacts the
    /// arena: always, rather than periodically, since this workspace does
    /// not optimise for amortised mutation cost.
    pub fn recompute_label_equivalences(&mut self, _label_set: &LabelSet) {
        let mut canonical: AHashMap<(Cost, Vec<Transition>), usize> = AHashMap::new();
        let mut compacted: Vec<LabelGroup> = Vec::new();

        for group in self.groups.drain(..).flatten() {
            let key = (group.cost, group.transitions.clone());
            match canonical.get(&key) {
                Some(&target) => {
                    compacted[target].labels.extend_from_slice(&group.labels);
                    compacted[target].labels.sort_unstable();
                }
                None => {
                    canonical.insert(key, compacted.len());
                    compacted.push(group);
                }
            }
        }

        let mut label_to_group = vec![None; self.label_to_group.len()];
        for (index, group) in compacted.iter().enumerate() {
            for &label in &group.labels {
                label_to_group[label] = Some(index);
            }
        }

        self.groups = compacted.into_iter().map(Some).collect();
        self.label_to_group = label_to_group;

        debug_assert!(self.is_valid(), "recompute_label_equivalences must restore (I1)-(I2)");
    }

    fn is_valid(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        for (_, group) in self.groups() {
            let key = (group.cost, group.transitions.clone());
            if !seen.insert(key) {
                return false;
            }
            if group.transitions.windows(2).any(|w| w[0] >= w[1]) {
                return false;
            }
        }
        true
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

    fn two_room_task() -> SasTask {
        SasTask::try_from_raw(RawTask {
            domains: vec![2],
            initial_state: vec![0],
            goals: vec![(0, 1)],
            operators: vec![
                RawOperator {
                    name: "move-a-b".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                    cost: 1,
                },
                RawOperator {
                    name: "move-b-a".into(),
                    preconditions: vec![(0, 1)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 0 }],
                    cost: 1,
                },
            ],
            axioms: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn atomic_construction_produces_expected_transitions() {
        let task = two_room_task();
        let label_set = LabelSet::from_task(&task);
        let ts = TransitionSystem::atomic(0, &task, &label_set);

        assert_eq!(ts.num_states(), 2);
        assert_eq!(ts.init_state(), Some(0));
        assert!(ts.is_goal(1) && !ts.is_goal(0));

        let all_transitions: Vec<Transition> = ts.groups().flat_map(|(_, g)| g.transitions().to_vec()).collect();
        assert!(all_transitions.contains(&Transition::new(0, 1)));
        assert!(all_transitions.contains(&Transition::new(1, 0)));
    }

    #[test]
    fn product_state_count_multiplies() {
        let task = two_room_task();
        let label_set = LabelSet::from_task(&task);
        let a = TransitionSystem::atomic(0, &task, &label_set);
        let b = TransitionSystem::atomic(0, &task, &label_set);

        let product = TransitionSystem::product(&a, &b, &label_set);
        assert_eq!(product.num_states(), a.num_states() * b.num_states());
        assert_eq!(product.init_state(), Some(0));
    }

    #[test]
    fn prune_renumbers_surviving_states() {
        let task = two_room_task();
        let label_set = LabelSet::from_task(&task);
        let mut ts = TransitionSystem::atomic(0, &task, &label_set);

        // Pretend state 1 is unreachable; pruning it should leave a
        // single-state factor.
        ts.prune(&[false, true], &label_set);
        assert_eq!(ts.num_states(), 1);
        assert_eq!(ts.init_state(), Some(0));
    }
}
