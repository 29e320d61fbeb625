/// Index of a SAS+ variable.
pub type VarId = usize;

/// A value within a variable's finite domain.
pub type Value = usize;

/// Index of a concrete operator.
pub type OperatorId = usize;

/// A single unconditional, uncoditioned operator over the full task.
///
/// Preconditions and effects are both stored as strictly increasing
/// `(VarId, Value)` lists, matching the precondition ordering invariant that
/// `AbstractOperator` (crates/pdb) relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub name: String,
    pub preconditions: Vec<(VarId, Value)>,
    pub effects: Vec<(VarId, Value)>,
    pub cost: u32,
}

impl Operator {
    /// Returns the precondition value for `var`, if the operator has one.
    pub fn precondition_on(&self, var: VarId) -> Option<Value> {
        self.preconditions
            .binary_search_by_key(&var, |(v, _)| *v)
            .ok()
            .map(|i| self.preconditions[i].1)
    }

    /// Returns the effect value for `var`, if the operator touches it.
    pub fn effect_on(&self, var: VarId) -> Option<Value> {
        self.effects
            .binary_search_by_key(&var, |(v, _)| *v)
            .ok()
            .map(|i| self.effects[i].1)
    }
}

/// Read-only façade over a grounded planning task.
///
/// This is the sole way the merge-and-shrink and PDB machinery reads the
/// concrete task: nothing in this workspace reads process-wide globals, every
/// constructor takes a `&dyn TaskView` (or a generic `T: TaskView`) instead.
pub trait TaskView {
    fn num_variables(&self) -> usize;

    fn domain(&self, var: VarId) -> usize;

    fn initial_value(&self, var: VarId) -> Value;

    /// The (partial) goal assignment, sorted by `VarId`.
    fn goals(&self) -> &[(VarId, Value)];

    fn goal_on(&self, var: VarId) -> Option<Value> {
        self.goals()
            .binary_search_by_key(&var, |(v, _)| *v)
            .ok()
            .map(|i| self.goals()[i].1)
    }

    fn num_operators(&self) -> usize;

    fn operator(&self, op: OperatorId) -> &Operator;

    fn operators(&self) -> impl Iterator<Item = &Operator> {
        (0..self.num_operators()).map(|i| self.operator(i))
    }
}
