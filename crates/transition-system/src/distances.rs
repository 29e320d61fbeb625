use std::collections::VecDeque;

use planner_queue::AdaptivePriorityQueue;

use crate::transition_system::TransitionSystem;
use crate::Cost;
use crate::StateId;
use crate::INFINITE_COST;

/// The result of computing shortest-path distances over a
/// [`TransitionSystem`] (spec.md §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistancesData {
    pub init_d: Vec<Cost>,
    pub goal_d: Vec<Cost>,
    pub max_f: Cost,
    pub max_g: Cost,
    pub max_h: Cost,
}

/// Computes (or recomputes) the distances of `ts`, choosing unit-cost BFS
/// when every live label group has cost 1, and Dijkstra otherwise.
pub fn compute_distances(ts: &TransitionSystem) -> DistancesData {
    let num_states = ts.num_states();

    let mut forward: Vec<Vec<(StateId, Cost)>> = vec![Vec::new(); num_states];
    let mut backward: Vec<Vec<(StateId, Cost)>> = vec![Vec::new(); num_states];
    let mut unit_cost = true;

    for (_, group) in ts.groups() {
        unit_cost &= group.cost() == 1;
        for t in group.transitions() {
            forward[t.src].push((t.target, group.cost()));
            backward[t.target].push((t.src, group.cost()));
        }
    }

    let init_sources: Vec<StateId> = ts.init_state().into_iter().collect();
    let goal_sources: Vec<StateId> = (0..num_states).filter(|&s| ts.is_goal(s)).collect();

    let init_d = if unit_cost {
        bfs(num_states, &forward, &init_sources)
    } else {
        dijkstra(num_states, &forward, &init_sources)
    };

    let goal_d = if unit_cost {
        bfs(num_states, &backward, &goal_sources)
    } else {
        dijkstra(num_states, &backward, &goal_sources)
    };

    let mut max_f = 0;
    let mut max_g = 0;
    let mut max_h = 0;

    for state in 0..num_states {
        let g = init_d[state];
        let h = goal_d[state];
        if g == INFINITE_COST || h == INFINITE_COST {
            continue; // dead state, excluded from the maxima.
        }

        max_g = max_g.max(g);
        max_h = max_h.max(h);
        max_f = max_f.max(g.saturating_add(h));
    }

    DistancesData {
        init_d,
        goal_d,
        max_f,
        max_g,
        max_h,
    }
}

/// Returns, per state, whether it should be pruned: unreachable from init
/// (if `prune_unreachable`) or unable to reach a goal (if `prune_irrelevant`).
pub fn to_be_pruned(distances: &DistancesData, prune_unreachable: bool, prune_irrelevant: bool) -> Vec<bool> {
    (0..distances.init_d.len())
        .map(|s| {
            (prune_unreachable && distances.init_d[s] == INFINITE_COST)
                || (prune_irrelevant && distances.goal_d[s] == INFINITE_COST)
        })
        .collect()
}

fn bfs(num_states: usize, edges: &[Vec<(StateId, Cost)>], sources: &[StateId]) -> Vec<Cost> {
    let mut dist = vec![INFINITE_COST; num_states];
    let mut queue = VecDeque::new();

    for &s in sources {
        if dist[s] == INFINITE_COST {
            dist[s] = 0;
            queue.push_back(s);
        }
    }

    while let Some(u) = queue.pop_front() {
        for &(v, _) in &edges[u] {
            if dist[v] == INFINITE_COST {
                dist[v] = dist[u] + 1;
                queue.push_back(v);
            }
        }
    }

    dist
}

fn dijkstra(num_states: usize, edges: &[Vec<(StateId, Cost)>], sources: &[StateId]) -> Vec<Cost> {
    let mut dist = vec![INFINITE_COST; num_states];
    let mut queue = AdaptivePriorityQueue::new();

    for &s in sources {
        if dist[s] == INFINITE_COST {
            dist[s] = 0;
            queue.push(0, s);
        }
    }

    while let Some((key, u)) = queue.pop() {
        if key as Cost > dist[u] {
            continue; // stale entry, a shorter path to `u` was already settled.
        }

        for &(v, weight) in &edges[u] {
            let candidate = dist[u].saturating_add(weight);
            if candidate < dist[v] {
                dist[v] = candidate;
                queue.push(candidate as usize, v);
            }
        }
    }

    dist
}
