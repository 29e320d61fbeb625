//!
//! CEGAR pattern collection generation restricted to a fixed set of goal
//! variables (spec.md §4.11): starting from one singleton pattern per goal
//! variable, repeatedly try to execute each pattern's wildcard plan on the
//! concrete task, turn the first failure into a flaw, and grow or merge
//! patterns to fix it.
//!

use ahash::AHashMap;
use ahash::AHashSet;
use log::debug;
use planner_pdb::Pdb;
use planner_task::Clock;
use planner_task::Operator;
use planner_task::OperatorId;
use planner_task::Result;
use planner_task::Rng;
use planner_task::TaskView;
use planner_task::Value;
use planner_task::VarId;

/// Tuning knobs for a single CEGAR run (spec.md §4.11 "Inputs").
#[derive(Debug, Clone, Copy)]
pub struct CegarConfig {
    pub max_pdb_size: usize,
    pub max_collection_size: usize,
    pub max_time: Option<std::time::Duration>,
    /// When false, only the first operator of every plan step's parallel
    /// group is ever tried; ties are not explored.
    pub wildcard_plans: bool,
}

struct PatternInfo {
    pdb: Pdb,
    solved: bool,
}

struct Flaw {
    collection_index: usize,
    variable: VarId,
}

/// The outcome of [`run`]: a (possibly size-one, if the concrete task was
/// solved outright) pattern collection and, when a concrete solution was
/// found along the way, the plan that reaches it.
pub struct SingleCegarResult {
    pub patterns: Vec<Vec<VarId>>,
    pub pdbs: Vec<Pdb>,
    pub concrete_plan: Option<Vec<Vec<OperatorId>>>,
}

/// Runs Single-CEGAR for the given goal subset (spec.md §4.11).
///
/// `goals` need not be the task's full goal set: Multiple-CEGAR (§4.12)
/// restricts it to one variable per call. The concrete-goal check inside the
/// loop always tests every one of the *task's* goal facts, matching the
/// original's bugfix that a plan which satisfies `goals` but not some other
/// task goal must not be mistaken for a concrete solution.
pub fn run(
    task: &impl TaskView,
    goals: &[(VarId, Value)],
    config: &CegarConfig,
    clock: &impl Clock,
    rng: &mut impl Rng,
    mut blacklisted_variables: AHashSet<VarId>,
) -> Result<SingleCegarResult> {
    debug_assert!(!goals.is_empty());

    let mut collection: Vec<Option<PatternInfo>> = Vec::new();
    let mut variable_to_index: AHashMap<VarId, usize> = AHashMap::new();
    let mut collection_size: usize = 0;

    for &(var, _) in goals {
        add_pattern_for_var(task, var, &mut collection, &mut variable_to_index, &mut collection_size)?;
    }

    let concrete_init: Vec<Value> = (0..task.num_variables()).map(|var| task.initial_value(var)).collect();
    let mut concrete_solution_index = None;

    loop {
        if let Some(max_time) = config.max_time {
            if clock.now() >= max_time {
                debug!("CEGAR time limit reached after {} patterns", collection.iter().flatten().count());
                break;
            }
        }

        let mut flaws = Vec::new();
        let solved = get_flaws(task, goals, &blacklisted_variables, config.wildcard_plans, &mut collection, &concrete_init, &mut flaws);
        if let Some(index) = solved {
            concrete_solution_index = Some(index);
            break;
        }
        if flaws.is_empty() {
            debug!("flaw list empty, no further refinements possible");
            break;
        }

        let chosen = rng.next_uint(flaws.len());
        let flaw = flaws.swap_remove(chosen);
        refine(task, &flaw, config, &mut collection, &mut variable_to_index, &mut collection_size, &mut blacklisted_variables)?;
    }

    let (patterns, pdbs, concrete_plan) = if let Some(index) = concrete_solution_index {
        let info = collection[index].take().expect("a solved index names a live pattern");
        let plan = info.pdb.plan().expect("a solved pattern was built with a plan").to_vec();
        let pattern = info.pdb.hash().pattern().to_vec();
        (vec![pattern], vec![info.pdb], Some(plan))
    } else {
        let mut patterns = Vec::new();
        let mut pdbs = Vec::new();
        for info in collection.into_iter().flatten() {
            patterns.push(info.pdb.hash().pattern().to_vec());
            pdbs.push(info.pdb);
        }
        (patterns, pdbs, None)
    };

    Ok(SingleCegarResult { patterns, pdbs, concrete_plan })
}

fn compute_pattern_info(task: &impl TaskView, pattern: Vec<VarId>) -> Result<PatternInfo> {
    let pdb = Pdb::build(task, pattern, true)?;
    Ok(PatternInfo { pdb, solved: false })
}

fn add_pattern_for_var(
    task: &impl TaskView,
    var: VarId,
    collection: &mut Vec<Option<PatternInfo>>,
    variable_to_index: &mut AHashMap<VarId, usize>,
    collection_size: &mut usize,
) -> Result<()> {
    let info = compute_pattern_info(task, vec![var])?;
    *collection_size += info.pdb.hash().size();
    collection.push(Some(info));
    variable_to_index.insert(var, collection.len() - 1);
    Ok(())
}

/// Whether `a * b` stays within `limit`, false (rather than panicking) on
/// overflow: candidate merges of huge patterns are simply rejected.
fn product_within_limit(a: usize, b: usize, limit: usize) -> bool {
    matches!(a.checked_mul(b), Some(product) if product <= limit)
}

/// Whether replacing `old_sizes_sum` states of collection members with
/// `new_size` states keeps the total collection size within budget. Uses
/// signed arithmetic because shrinking a pattern (new_size < old_sizes_sum,
/// as happens e.g. when merging a pattern of size 1) is legal and must not
/// underflow.
fn fits_in_collection(collection_size: usize, old_sizes_sum: usize, new_size: usize, max_collection_size: usize) -> bool {
    let delta = new_size as i64 - old_sizes_sum as i64;
    collection_size as i64 + delta <= max_collection_size as i64
}

fn can_merge_patterns(collection: &[Option<PatternInfo>], collection_size: usize, config: &CegarConfig, index1: usize, index2: usize) -> bool {
    let size1 = collection[index1].as_ref().unwrap().pdb.hash().size();
    let size2 = collection[index2].as_ref().unwrap().pdb.hash().size();
    if !product_within_limit(size1, size2, config.max_pdb_size) {
        return false;
    }
    fits_in_collection(collection_size, size1 + size2, size1 * size2, config.max_collection_size)
}

fn merge_patterns(
    task: &impl TaskView,
    collection: &mut [Option<PatternInfo>],
    variable_to_index: &mut AHashMap<VarId, usize>,
    collection_size: &mut usize,
    index1: usize,
    index2: usize,
) -> Result<()> {
    let info2 = collection[index2].take().expect("merge target is a live pattern");
    for &var in info2.pdb.hash().pattern() {
        variable_to_index.insert(var, index1);
    }

    let size1 = collection[index1].as_ref().unwrap().pdb.hash().size();
    let size2 = info2.pdb.hash().size();

    let mut new_pattern = collection[index1].as_ref().unwrap().pdb.hash().pattern().to_vec();
    new_pattern.extend_from_slice(info2.pdb.hash().pattern());
    new_pattern.sort_unstable();

    let merged = compute_pattern_info(task, new_pattern)?;
    *collection_size = (*collection_size + merged.pdb.hash().size()).saturating_sub(size1 + size2);
    collection[index1] = Some(merged);
    Ok(())
}

fn can_add_variable_to_pattern(collection: &[Option<PatternInfo>], collection_size: usize, config: &CegarConfig, task: &impl TaskView, index: usize, var: VarId) -> bool {
    let size = collection[index].as_ref().unwrap().pdb.hash().size();
    let domain = task.domain(var);
    if !product_within_limit(size, domain, config.max_pdb_size) {
        return false;
    }
    fits_in_collection(collection_size, size, size * domain, config.max_collection_size)
}

fn add_variable_to_pattern(
    task: &impl TaskView,
    collection: &mut [Option<PatternInfo>],
    variable_to_index: &mut AHashMap<VarId, usize>,
    collection_size: &mut usize,
    index: usize,
    var: VarId,
) -> Result<()> {
    let old_size = collection[index].as_ref().unwrap().pdb.hash().size();
    let mut new_pattern = collection[index].as_ref().unwrap().pdb.hash().pattern().to_vec();
    new_pattern.push(var);
    new_pattern.sort_unstable();

    let info = compute_pattern_info(task, new_pattern)?;
    *collection_size = (*collection_size + info.pdb.hash().size()).saturating_sub(old_size);
    variable_to_index.insert(var, index);
    collection[index] = Some(info);
    Ok(())
}

fn violated_preconditions(op: &Operator, state: &[Value], blacklisted: &AHashSet<VarId>) -> Vec<VarId> {
    op.preconditions
        .iter()
        .filter(|&&(var, value)| !blacklisted.contains(&var) && state[var] != value)
        .map(|&(var, _)| var)
        .collect()
}

fn apply_operator(state: &mut [Value], op: &Operator) {
    for &(var, value) in &op.effects {
        state[var] = value;
    }
}

/// Walks `plan` from `state`, mutating it in place. Returns the flaw
/// variables of the first step at which no candidate operator is applicable,
/// or an empty list if the whole plan ran to completion.
fn apply_plan(task: &impl TaskView, plan: &[Vec<OperatorId>], state: &mut [Value], wildcard: bool, blacklisted: &AHashSet<VarId>) -> Vec<VarId> {
    for group in plan {
        let candidates = if wildcard { group.as_slice() } else { &group[..1] };

        let mut step_flaws = Vec::new();
        let mut applied = false;
        for &op_id in candidates {
            let op = task.operator(op_id);
            let violated = violated_preconditions(op, state, blacklisted);
            if violated.is_empty() {
                apply_operator(state, op);
                applied = true;
                break;
            }
            step_flaws.extend(violated);
        }

        if !applied {
            return step_flaws;
        }
    }
    Vec::new()
}

fn get_flaws_for_pattern(
    task: &impl TaskView,
    goals: &[(VarId, Value)],
    blacklisted: &AHashSet<VarId>,
    wildcard: bool,
    collection: &mut [Option<PatternInfo>],
    index: usize,
    concrete_init: &[Value],
    flaws: &mut Vec<Flaw>,
) -> bool {
    let plan = collection[index]
        .as_ref()
        .unwrap()
        .pdb
        .plan()
        .expect("single-CEGAR always requests a wildcard plan")
        .to_vec();

    let mut state = concrete_init.to_vec();
    let failure = apply_plan(task, &plan, &mut state, wildcard, blacklisted);

    if !failure.is_empty() {
        flaws.extend(failure.into_iter().map(|variable| Flaw { collection_index: index, variable }));
        return false;
    }

    let is_concrete_goal = task.goals().iter().all(|&(var, value)| state[var] == value);
    if is_concrete_goal {
        if blacklisted.is_empty() {
            return true;
        }
        collection[index].as_mut().unwrap().solved = true;
        return false;
    }

    let mut raised = false;
    for &(var, value) in goals {
        if state[var] != value && !blacklisted.contains(&var) {
            flaws.push(Flaw { collection_index: index, variable: var });
            raised = true;
        }
    }
    if !raised {
        collection[index].as_mut().unwrap().solved = true;
    }
    false
}

fn get_flaws(
    task: &impl TaskView,
    goals: &[(VarId, Value)],
    blacklisted: &AHashSet<VarId>,
    wildcard: bool,
    collection: &mut [Option<PatternInfo>],
    concrete_init: &[Value],
    flaws: &mut Vec<Flaw>,
) -> Option<usize> {
    for index in 0..collection.len() {
        let unsolved = collection[index].as_ref().is_some_and(|info| !info.solved);
        if unsolved && get_flaws_for_pattern(task, goals, blacklisted, wildcard, collection, index, concrete_init, flaws) {
            return Some(index);
        }
    }
    None
}

fn refine(
    task: &impl TaskView,
    flaw: &Flaw,
    config: &CegarConfig,
    collection: &mut Vec<Option<PatternInfo>>,
    variable_to_index: &mut AHashMap<VarId, usize>,
    collection_size: &mut usize,
    blacklisted: &mut AHashSet<VarId>,
) -> Result<()> {
    let var = flaw.variable;
    let mut added = false;

    if let Some(&other_index) = variable_to_index.get(&var) {
        debug_assert_ne!(other_index, flaw.collection_index, "a flaw variable is never already in its own pattern");
        if can_merge_patterns(collection, *collection_size, config, flaw.collection_index, other_index) {
            merge_patterns(task, collection, variable_to_index, collection_size, flaw.collection_index, other_index)?;
            added = true;
        }
    } else if can_add_variable_to_pattern(collection, *collection_size, config, task, flaw.collection_index, var) {
        add_variable_to_pattern(task, collection, variable_to_index, collection_size, flaw.collection_index, var)?;
        added = true;
    }

    if !added {
        blacklisted.insert(var);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use planner_task::FakeClock;
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

    fn config() -> CegarConfig {
        CegarConfig { max_pdb_size: 1_000_000, max_collection_size: 1_000_000, max_time: None, wildcard_plans: true }
    }

    /// Two independent counters, each needing its own operator to reach its
    /// goal value; the initial singleton pattern for var0 alone solves the
    /// task outright since the concrete goal set only touches var0.
    fn single_goal_task() -> SasTask {
        SasTask::try_from_raw(RawTask {
            domains: vec![2],
            initial_state: vec![0],
            goals: vec![(0, 1)],
            operators: vec![RawOperator {
                name: "flip".into(),
                preconditions: vec![(0, 0)],
                effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                cost: 1,
            }],
            axioms: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn singleton_pattern_that_already_covers_the_task_solves_it_immediately() {
        let task = single_goal_task();
        let clock = FakeClock::new();
        let mut rng = NullRng;
        let result = run(&task, &[(0, 1)], &config(), &clock, &mut rng, AHashSet::default()).unwrap();

        assert_eq!(result.patterns, vec![vec![0]]);
        assert_eq!(result.concrete_plan, Some(vec![vec![0]]));
    }

    /// var0 only advances once var1 has been raised to 1 first; a singleton
    /// pattern over the goal variable (var0) cannot predict this and must be
    /// refined (grown or merged with var1's own pattern) to find a plan that
    /// actually executes on the concrete task.
    fn chained_precondition_task() -> SasTask {
        SasTask::try_from_raw(RawTask {
            domains: vec![2, 2],
            initial_state: vec![0, 0],
            goals: vec![(0, 1)],
            operators: vec![
                RawOperator {
                    name: "raise1".into(),
                    preconditions: vec![],
                    effects: vec![RawEffect { conditions: vec![], var: 1, value: 1 }],
                    cost: 1,
                },
                RawOperator {
                    name: "flip0".into(),
                    preconditions: vec![(0, 0), (1, 1)],
                    effects: vec![RawEffect { conditions: vec![], var: 0, value: 1 }],
                    cost: 1,
                },
            ],
            axioms: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn flaw_on_missing_precondition_variable_grows_the_pattern() {
        let task = chained_precondition_task();
        let clock = FakeClock::new();
        let mut rng = NullRng;
        let result = run(&task, &[(0, 1)], &config(), &clock, &mut rng, AHashSet::default()).unwrap();

        assert_eq!(result.patterns, vec![vec![0, 1]]);
        assert_eq!(result.concrete_plan, Some(vec![vec![0], vec![1]]));
    }

    #[test]
    fn blacklisted_variable_is_never_grown_into_and_task_is_left_unsolved_by_cegar() {
        let task = chained_precondition_task();
        let clock = FakeClock::new();
        let mut rng = NullRng;
        let mut blacklist = AHashSet::default();
        blacklist.insert(1);
        let result = run(&task, &[(0, 1)], &config(), &clock, &mut rng, blacklist).unwrap();

        assert!(result.concrete_plan.is_none());
        assert_eq!(result.patterns, vec![vec![0]]);
    }

    #[test]
    fn expired_timer_stops_before_any_refinement() {
        let task = chained_precondition_task();
        let clock = FakeClock::new();
        clock.advance(std::time::Duration::from_secs(10));
        let mut rng = NullRng;
        let mut cfg = config();
        cfg.max_time = Some(std::time::Duration::ZERO);
        let result = run(&task, &[(0, 1)], &cfg, &clock, &mut rng, AHashSet::default()).unwrap();

        assert_eq!(result.patterns, vec![vec![0]]);
        assert!(result.concrete_plan.is_none());
    }
}
