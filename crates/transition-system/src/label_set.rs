use planner_task::TaskView;

use crate::Cost;
use crate::LabelId;

#[derive(Debug, Clone, PartialEq)]
struct LabelInfo {
    cost: Cost,
    active: bool,
}

/// The evolving operator alphabet of one merge-and-shrink pipeline run.
///
/// Initially one label per concrete operator. A label reduction step
/// allocates one or more composite labels and marks the reduced originals
/// inactive (spec.md §3); reductions are irreversible within a run, but an
/// inactive label's cost is kept around so historical groups can still be
/// rebuilt before they are discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    labels: Vec<LabelInfo>,
}

impl LabelSet {
    /// One label per operator of `task`, all active.
    pub fn from_task(task: &impl TaskView) -> LabelSet {
        let labels = task
            .operators()
            .map(|op| LabelInfo {
                cost: op.cost,
                active: true,
            })
            .collect();

        LabelSet { labels }
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn cost(&self, label: LabelId) -> Cost {
        self.labels[label].cost
    }

    pub fn is_active(&self, label: LabelId) -> bool {
        self.labels[label].active
    }

    pub fn active_labels(&self) -> impl Iterator<Item = LabelId> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, info)| info.active)
            .map(|(id, _)| id)
    }

    /// Marks `label` inactive. Its cost remains readable via [`Self::cost`].
    pub fn deactivate(&mut self, label: LabelId) {
        self.labels[label].active = false;
    }

    /// Allocates a new active composite label with the given cost, returning
    /// its id.
    pub fn add_composite(&mut self, cost: Cost) -> LabelId {
        self.labels.push(LabelInfo { cost, active: true });
        self.labels.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use planner_task::RawTask;
    use planner_task::SasTask;
    use test_log::test;

    use super::*;

    fn task() -> SasTask {
        SasTask::try_from_raw(RawTask {
            domains: vec![2],
            initial_state: vec![0],
            goals: vec![(0, 1)],
            operators: vec![
                planner_task::RawOperator {
                    name: "a".into(),
                    preconditions: vec![(0, 0)],
                    effects: vec![planner_task::RawEffect {
                        conditions: Vec::new(),
                        var: 0,
                        value: 1,
                    }],
                    cost: 3,
                },
                planner_task::RawOperator {
                    name: "b".into(),
                    preconditions: vec![(0, 1)],
                    effects: vec![planner_task::RawEffect {
                        conditions: Vec::new(),
                        var: 0,
                        value: 0,
                    }],
                    cost: 5,
                },
            ],
            axioms: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn composite_label_keeps_reduced_costs_readable() {
        let mut labels = LabelSet::from_task(&task());
        assert_eq!(labels.cost(0), 3);
        assert_eq!(labels.cost(1), 5);

        let composite = labels.add_composite(3);
        labels.deactivate(0);
        labels.deactivate(1);

        assert!(!labels.is_active(0));
        assert_eq!(labels.cost(0), 3, "inactive labels keep their cost");
        assert!(labels.is_active(composite));
        assert_eq!(labels.active_labels().collect::<Vec<_>>(), vec![composite]);
    }
}
