use planner_task::Rng;
use planner_transition_system::compute_distances;
use planner_transition_system::to_be_pruned;
use planner_transition_system::FactoredSystem;
use planner_transition_system::TransitionSystem;
use planner_transition_system::INFINITE_COST;

/// One scoring function in a stateless score-based merge selector (spec.md
/// §4.8). Lower is better; `f64::INFINITY` means "this pair is unscored by
/// this function".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringFunction {
    GoalRelevance,
    Dfp,
    Miasm,
    TotalOrder,
    SingleRandom,
    TiebreakingRandom,
}

/// Picks the next merge pair by applying `scorers` in sequence to the set of
/// active factor pairs, narrowing to the minimum-scoring subset at each
/// step. `SingleRandom`/`TiebreakingRandom` instead pick uniformly at random
/// among the current survivors, guaranteeing a unique winner.
pub fn next(scorers: &[ScoringFunction], factored: &FactoredSystem, rng: &mut impl Rng) -> Option<(usize, usize)> {
    let active: Vec<usize> = factored.active_indices().collect();
    if active.len() < 2 {
        return None;
    }

    let mut candidates: Vec<(usize, usize)> = Vec::new();
    for (pos, &i) in active.iter().enumerate() {
        for &j in &active[pos + 1..] {
            candidates.push((i, j));
        }
    }

    for scorer in scorers {
        if candidates.len() <= 1 {
            break;
        }

        match scorer {
            ScoringFunction::SingleRandom | ScoringFunction::TiebreakingRandom => {
                let pick = rng.next_uint(candidates.len());
                candidates = vec![candidates[pick]];
            }
            ScoringFunction::TotalOrder => {
                candidates.sort_unstable();
                candidates.truncate(1);
            }
            ScoringFunction::GoalRelevance => {
                candidates = narrow(candidates, |&(i, j)| goal_relevance(factored.factor(i), factored.factor(j)));
            }
            ScoringFunction::Dfp => {
                candidates = narrow(candidates, |&(i, j)| dfp(factored, i, j));
            }
            ScoringFunction::Miasm => {
                candidates = narrow(candidates, |&(i, j)| miasm(factored, i, j));
            }
        }
    }

    candidates.into_iter().next()
}

fn narrow(candidates: Vec<(usize, usize)>, score: impl Fn(&(usize, usize)) -> f64) -> Vec<(usize, usize)> {
    let scored: Vec<(f64, (usize, usize))> = candidates.iter().map(|&pair| (score(&pair), pair)).collect();
    let min_score = scored.iter().map(|&(s, _)| s).fold(f64::INFINITY, f64::min);
    scored
        .into_iter()
        .filter(|&(s, _)| s == min_score)
        .map(|(_, pair)| pair)
        .collect()
}

fn goal_relevance(a: &TransitionSystem, b: &TransitionSystem) -> f64 {
    let has_non_goal = |ts: &TransitionSystem| (0..ts.num_states()).any(|s| !ts.is_goal(s));
    if has_non_goal(a) || has_non_goal(b) {
        0.0
    } else {
        f64::INFINITY
    }
}

/// A label group's rank in a factor: the minimum goal distance reachable via
/// one of its transitions, or `-1` if every transition is a self-loop.
fn group_rank(ts: &TransitionSystem, group_index: usize) -> i64 {
    let group = ts.group(group_index);
    if group.transitions().iter().all(|t| t.src == t.target) {
        return -1;
    }

    match ts.distances() {
        Some(distances) => group
            .transitions()
            .iter()
            .filter(|t| t.src != t.target)
            .map(|t| distances.goal_d[t.target])
            .filter(|&d| d != INFINITE_COST)
            .min()
            .map_or(-1, |d| d as i64),
        None => -1,
    }
}

fn dfp(factored: &FactoredSystem, i: usize, j: usize) -> f64 {
    let a = factored.factor(i);
    let b = factored.factor(j);
    let label_set = factored.label_set();

    let best = label_set
        .active_labels()
        .filter_map(|label| {
            let ga = a.group_of(label)?;
            let gb = b.group_of(label)?;
            Some(group_rank(a, ga).max(group_rank(b, gb)))
        })
        .min();

    match best {
        Some(rank) => rank as f64,
        None => f64::INFINITY,
    }
}

fn miasm(factored: &FactoredSystem, i: usize, j: usize) -> f64 {
    let a = factored.factor(i);
    let b = factored.factor(j);
    let label_set = factored.label_set();

    let mut trial = TransitionSystem::product(a, b, label_set);
    let distances = compute_distances(&trial);
    let drop = to_be_pruned(&distances, true, true);
    trial.prune(&drop, label_set);

    trial.num_states() as f64 / (a.num_states() as f64 * b.num_states() as f64)
}
