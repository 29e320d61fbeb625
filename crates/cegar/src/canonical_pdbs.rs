//!
//! The canonical pattern database heuristic (spec.md §4.10): the additivity
//! graph over variables, maximal-clique enumeration over a pattern
//! collection's compatibility graph (Bron-Kerbosch), and the canonical
//! heuristic's max-over-cliques-of-sum evaluation.
//!

use ahash::AHashSet;
use planner_pdb::Cost;
use planner_pdb::Pdb;
use planner_task::TaskView;
use planner_task::Value;
use planner_task::VarId;

/// `additive[v1][v2]` is true unless some operator effects both `v1` and
/// `v2` (spec.md §4.10 "no operator has effects on both").
pub type VariableAdditivity = Vec<Vec<bool>>;

pub fn compute_additive_vars(task: &impl TaskView) -> VariableAdditivity {
    let n = task.num_variables();
    let mut additive = vec![vec![true; n]; n];
    for op in task.operators() {
        for &(v1, _) in &op.effects {
            for &(v2, _) in &op.effects {
                additive[v1][v2] = false;
            }
        }
    }
    additive
}

/// Whether every variable in `pattern1` is additive with every variable in
/// `pattern2`.
pub fn are_patterns_additive(pattern1: &[VarId], pattern2: &[VarId], additive: &VariableAdditivity) -> bool {
    pattern1.iter().all(|&v1| pattern2.iter().all(|&v2| additive[v1][v2]))
}

fn validate_additivity_matrix(additive: &VariableAdditivity) {
    debug_assert!(additive.iter().enumerate().all(|(v1, row)| row.len() == additive.len() && (0..additive.len()).all(|v2| row[v2] == additive[v2][v1])), "additivity must be a symmetric relation");
}

/// The maximal cliques of the compatibility graph over `patterns` (an edge
/// between `i` and `j` iff their patterns are additive), via Bron-Kerbosch.
/// A pattern collection with no patterns at all yields the single empty
/// clique, matching the convention that an empty sum is a valid (zero)
/// heuristic contribution.
pub fn compute_pattern_cliques(patterns: &[Vec<VarId>], additive: &VariableAdditivity) -> Vec<Vec<usize>> {
    validate_additivity_matrix(additive);

    let n = patterns.len();
    let mut graph: Vec<AHashSet<usize>> = vec![AHashSet::default(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            if are_patterns_additive(&patterns[i], &patterns[j], additive) {
                graph[i].insert(j);
                graph[j].insert(i);
            }
        }
    }

    let mut cliques = Vec::new();
    let all: AHashSet<usize> = (0..n).collect();
    bron_kerbosch(&graph, AHashSet::default(), all, AHashSet::default(), &mut cliques);

    if cliques.is_empty() {
        cliques.push(Vec::new());
    }
    cliques
}

fn bron_kerbosch(graph: &[AHashSet<usize>], r: AHashSet<usize>, mut p: AHashSet<usize>, mut x: AHashSet<usize>, out: &mut Vec<Vec<usize>>) {
    if p.is_empty() && x.is_empty() {
        let mut clique: Vec<usize> = r.into_iter().collect();
        clique.sort_unstable();
        out.push(clique);
        return;
    }

    for v in p.clone() {
        let neighbors = &graph[v];
        let mut r_with_v = r.clone();
        r_with_v.insert(v);
        let p_restricted: AHashSet<usize> = p.intersection(neighbors).copied().collect();
        let x_restricted: AHashSet<usize> = x.intersection(neighbors).copied().collect();

        bron_kerbosch(graph, r_with_v, p_restricted, x_restricted, out);

        p.remove(&v);
        x.insert(v);
    }
}

/// A collection of PDBs plus the additive cliques over their patterns: the
/// admissible heuristic for a concrete state is the maximum, over cliques,
/// of the sum of that clique's PDB values (spec.md §4.10).
pub struct CanonicalPdbs {
    pdbs: Vec<Pdb>,
    cliques: Vec<Vec<usize>>,
}

impl CanonicalPdbs {
    pub fn new(task: &impl TaskView, pdbs: Vec<Pdb>) -> CanonicalPdbs {
        let patterns: Vec<Vec<VarId>> = pdbs.iter().map(|pdb| pdb.hash().pattern().to_vec()).collect();
        let additive = compute_additive_vars(task);
        let cliques = compute_pattern_cliques(&patterns, &additive);
        CanonicalPdbs { pdbs, cliques }
    }

    pub fn pdbs(&self) -> &[Pdb] {
        &self.pdbs
    }

    /// `None` if any individual PDB reports the concrete state unreachable
    /// within its pattern.
    pub fn value(&self, concrete_state: &[Value]) -> Option<Cost> {
        let mut h_values = Vec::with_capacity(self.pdbs.len());
        for pdb in &self.pdbs {
            h_values.push(pdb.concrete_value(concrete_state)?);
        }

        let max_h = self
            .cliques
            .iter()
            .map(|clique| clique.iter().fold(0u32, |sum, &index| sum.saturating_add(h_values[index])))
            .max()
            .unwrap_or(0);
        Some(max_h)
    }
}
