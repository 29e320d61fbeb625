use crate::error::PlannerError;
use crate::error::Result;
use crate::task_view::Operator;
use crate::task_view::TaskView;
use crate::task_view::Value;
use crate::task_view::VarId;

/// A conditional effect as it might arrive from a grounded-input loader,
/// before ingestion into a [`SasTask`].
///
/// Only `conditions.is_empty()` effects survive ingestion; anything else is
/// rejected with [`PlannerError::UnsupportedTask`] (spec.md §6).
#[derive(Debug, Clone)]
pub struct RawEffect {
    pub conditions: Vec<(VarId, Value)>,
    pub var: VarId,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct RawOperator {
    pub name: String,
    pub preconditions: Vec<(VarId, Value)>,
    pub effects: Vec<RawEffect>,
    pub cost: u32,
}

/// A derived-predicate axiom. The core never supports axioms; a non-empty
/// axiom list makes ingestion fail outright.
#[derive(Debug, Clone)]
pub struct RawAxiom {
    pub conditions: Vec<(VarId, Value)>,
    pub effect: (VarId, Value),
}

#[derive(Debug, Clone, Default)]
pub struct RawTask {
    pub domains: Vec<usize>,
    pub initial_state: Vec<Value>,
    pub goals: Vec<(VarId, Value)>,
    pub operators: Vec<RawOperator>,
    pub axioms: Vec<RawAxiom>,
}

/// An in-memory [`TaskView`] implementation, and the only concrete task type
/// in this workspace (a grounded-input loader is explicitly out of scope,
/// spec.md §1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasTask {
    domains: Vec<usize>,
    initial_state: Vec<Value>,
    goals: Vec<(VarId, Value)>,
    operators: Vec<Operator>,
}

impl SasTask {
    /// Validates and ingests a [`RawTask`].
    ///
    /// Rejects axioms and conditional effects with a non-empty condition set,
    /// and negative costs (expressed here as the raw cost not fitting `u32`
    /// is impossible by construction; instead we check for preconditions or
    /// effects referencing out-of-range variables/values, which would
    /// indicate a malformed grounded task).
    pub fn try_from_raw(raw: RawTask) -> Result<SasTask> {
        if !raw.axioms.is_empty() {
            return Err(PlannerError::UnsupportedTask(format!(
                "task has {} axiom(s); derived predicates are not supported",
                raw.axioms.len()
            )));
        }

        if raw.initial_state.len() != raw.domains.len() {
            return Err(PlannerError::UnsupportedTask(
                "initial state does not assign every variable".to_string(),
            ));
        }

        for (var, value) in &raw.goals {
            Self::check_in_domain(&raw.domains, *var, *value)?;
        }

        let mut operators = Vec::with_capacity(raw.operators.len());
        for raw_op in raw.operators {
            for (var, value) in &raw_op.preconditions {
                Self::check_in_domain(&raw.domains, *var, *value)?;
            }

            let mut effects = Vec::with_capacity(raw_op.effects.len());
            for effect in raw_op.effects {
                if !effect.conditions.is_empty() {
                    return Err(PlannerError::UnsupportedTask(format!(
                        "operator '{}' has a conditional effect on variable {}",
                        raw_op.name, effect.var
                    )));
                }

                Self::check_in_domain(&raw.domains, effect.var, effect.value)?;
                effects.push((effect.var, effect.value));
            }

            let mut preconditions = raw_op.preconditions;
            preconditions.sort_unstable_by_key(|(v, _)| *v);
            effects.sort_unstable_by_key(|(v, _)| *v);

            debug_assert!(
                effects.windows(2).all(|w| w[0].0 != w[1].0),
                "operator '{}' has two effects on the same variable",
                raw_op.name
            );

            operators.push(Operator {
                name: raw_op.name,
                preconditions,
                effects,
                cost: raw_op.cost,
            });
        }

        let mut goals = raw.goals;
        goals.sort_unstable_by_key(|(v, _)| *v);

        Ok(SasTask {
            domains: raw.domains,
            initial_state: raw.initial_state,
            goals,
            operators,
        })
    }

    fn check_in_domain(domains: &[usize], var: VarId, value: Value) -> Result<()> {
        match domains.get(var) {
            Some(domain) if value < *domain => Ok(()),
            _ => Err(PlannerError::UnsupportedTask(format!(
                "variable {var} value {value} is out of the declared domain"
            ))),
        }
    }
}

impl TaskView for SasTask {
    fn num_variables(&self) -> usize {
        self.domains.len()
    }

    fn domain(&self, var: VarId) -> usize {
        self.domains[var]
    }

    fn initial_value(&self, var: VarId) -> Value {
        self.initial_state[var]
    }

    fn goals(&self) -> &[(VarId, Value)] {
        &self.goals
    }

    fn num_operators(&self) -> usize {
        self.operators.len()
    }

    fn operator(&self, op: OperatorIndex) -> &Operator {
        &self.operators[op]
    }
}

type OperatorIndex = crate::task_view::OperatorId;

#[cfg(test)]
mod tests {
    use super::*;

    fn gripper_like(num_balls: usize) -> RawTask {
        // Variable 0: robot room (0 = A, 1 = B).
        // Variables 1..=num_balls: ball room (0 = A, 1 = B).
        let mut domains = vec![2; num_balls + 1];
        domains[0] = 2;

        let mut initial_state = vec![0; num_balls + 1];
        initial_state[0] = 0;

        let goals: Vec<_> = (1..=num_balls).map(|v| (v, 1)).collect();

        let mut operators = Vec::new();
        for room in 0..2 {
            let other = 1 - room;
            operators.push(RawOperator {
                name: format!("move-{room}-{other}"),
                preconditions: vec![(0, room)],
                effects: vec![RawEffect {
                    conditions: Vec::new(),
                    var: 0,
                    value: other,
                }],
                cost: 1,
            });

            for ball in 1..=num_balls {
                operators.push(RawOperator {
                    name: format!("pick-{ball}-{room}"),
                    preconditions: vec![(0, room), (ball, room)],
                    effects: vec![RawEffect {
                        conditions: Vec::new(),
                        var: ball,
                        value: 2, // carried, represented out of room-domain on purpose below
                    }],
                    cost: 1,
                });
            }
        }

        // Carried state needs a third value; fix domain accordingly.
        for d in domains.iter_mut().skip(1) {
            *d = 3;
        }

        RawTask {
            domains,
            initial_state,
            goals,
            operators,
            axioms: Vec::new(),
        }
    }

    #[test]
    fn rejects_axioms() {
        let mut raw = gripper_like(1);
        raw.axioms.push(RawAxiom {
            conditions: vec![(0, 0)],
            effect: (1, 0),
        });

        assert!(matches!(
            SasTask::try_from_raw(raw),
            Err(PlannerError::UnsupportedTask(_))
        ));
    }

    #[test]
    fn rejects_conditional_effects() {
        let mut raw = gripper_like(1);
        raw.operators[0].effects[0].conditions.push((1, 0));

        assert!(matches!(
            SasTask::try_from_raw(raw),
            Err(PlannerError::UnsupportedTask(_))
        ));
    }

    #[test]
    fn accepts_well_formed_task() {
        let raw = gripper_like(2);
        let task = SasTask::try_from_raw(raw).expect("well-formed task");
        assert_eq!(task.num_variables(), 3);
        assert_eq!(task.goals().len(), 2);
    }
}
