use planner_task::TaskView;

use crate::LabelSet;
use crate::TransitionSystem;

/// An indexed collection of transition systems, each either active or
/// removed after being consumed by a merge (spec.md §3).
///
/// Like [`TransitionSystem::groups`], this is an arena: merging two factors
/// tombstones both inputs and appends the product at a fresh index, rather
/// than shifting indices around.
#[derive(Debug, PartialEq)]
pub struct FactoredSystem {
    factors: Vec<Option<TransitionSystem>>,
    label_set: LabelSet,
}

impl FactoredSystem {
    /// Builds the atomic factors, one per task variable.
    pub fn atomic(task: &impl TaskView) -> FactoredSystem {
        let label_set = LabelSet::from_task(task);
        let factors = (0..task.num_variables())
            .map(|var| Some(TransitionSystem::atomic(var, task, &label_set)))
            .collect();

        FactoredSystem { factors, label_set }
    }

    pub fn label_set(&self) -> &LabelSet {
        &self.label_set
    }

    pub fn label_set_mut(&mut self) -> &mut LabelSet {
        &mut self.label_set
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.factors[index].is_some()
    }

    pub fn factor(&self, index: usize) -> &TransitionSystem {
        self.factors[index].as_ref().expect("factor index must be active")
    }

    pub fn factor_mut(&mut self, index: usize) -> &mut TransitionSystem {
        self.factors[index].as_mut().expect("factor index must be active")
    }

    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.factors.iter().enumerate().filter_map(|(i, f)| f.as_ref().map(|_| i))
    }

    pub fn active_factors(&self) -> impl Iterator<Item = &TransitionSystem> {
        self.factors.iter().filter_map(|f| f.as_ref())
    }

    pub fn num_active(&self) -> usize {
        self.factors.iter().filter(|f| f.is_some()).count()
    }

    /// Prunes dropped states from the factor at `index` in place.
    pub fn prune_factor(&mut self, index: usize, drop: &[bool]) {
        let factor = self.factors[index].as_mut().expect("factor index must be active");
        factor.prune(drop, &self.label_set);
    }

    /// Applies a shrink partition to the factor at `index` in place.
    pub fn shrink_factor(&mut self, index: usize, partition: &impl crate::StatePartition) {
        let factor = self.factors[index].as_mut().expect("factor index must be active");
        factor.apply_shrink(partition, &self.label_set);
    }

    /// (Re)computes and caches the distances of the factor at `index`.
    pub fn recompute_factor_distances(&mut self, index: usize) {
        let factor = self.factors[index].as_mut().expect("factor index must be active");
        let distances = crate::distances::compute_distances(factor);
        factor.set_distances(distances);
    }

    /// Applies a label mapping (spec.md §4.6) to the factor at `index`.
    pub fn apply_label_mapping_to_factor(&mut self, index: usize, mapping: &crate::LabelMapping) {
        let factor = self.factors[index].as_mut().expect("factor index must be active");
        crate::label_reduction::apply_mapping(factor, mapping, &self.label_set);
    }

    /// Computes the product of factors `i` and `j`, tombstones both, and
    /// appends the result as a new active factor. Returns the new index.
    pub fn merge(&mut self, i: usize, j: usize) -> usize {
        debug_assert_ne!(i, j, "cannot merge a factor with itself");

        let product = TransitionSystem::product(self.factor(i), self.factor(j), &self.label_set);

        self.factors[i] = None;
        self.factors[j] = None;
        self.factors.push(Some(product));
        self.factors.len() - 1
    }
}
