//!
//! Perfect hashing of assignments over an ordered variable subset (a pattern)
//! into a dense integer range, via mixed-radix multipliers.
//!

use planner_task::PlannerError;
use planner_task::Result;
use planner_task::TaskView;
use planner_task::Value;
use planner_task::VarId;

/// A strictly increasing, duplicate-free sequence of variable indices.
pub type Pattern = Vec<VarId>;

/// Bijection between assignments over a [`Pattern`] and `0..size()`.
///
/// Immutable after construction (spec.md §3): every query is a pure function
/// of the pattern and the task's variable domains fixed at construction
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfectHash {
    pattern: Pattern,
    domains: Vec<usize>,
    multipliers: Vec<usize>,
    size: usize,
}

impl PerfectHash {
    /// Builds the hash function for `pattern` over `task`.
    ///
    /// Fails with [`PlannerError::SizeLimitExceeded`] if the mixed-radix
    /// product would overflow `usize`, so that generators which enumerate
    /// candidate patterns can use this as a cheap admissibility test before
    /// committing to building the full PDB.
    pub fn new(pattern: Pattern, task: &impl TaskView) -> Result<PerfectHash> {
        debug_assert!(
            pattern.windows(2).all(|w| w[0] < w[1]),
            "pattern must be strictly increasing: {pattern:?}"
        );

        let mut domains = Vec::with_capacity(pattern.len());
        let mut multipliers = Vec::with_capacity(pattern.len());
        let mut size: usize = 1;

        for &var in &pattern {
            let domain = task.domain(var);
            multipliers.push(size);
            domains.push(domain);

            size = size.checked_mul(domain).ok_or_else(|| {
                PlannerError::SizeLimitExceeded(format!(
                    "pattern {pattern:?} hash size overflows usize at variable {var}"
                ))
            })?;
        }

        Ok(PerfectHash {
            pattern,
            domains,
            multipliers,
            size,
        })
    }

    /// Like [`PerfectHash::new`], but additionally rejects patterns whose
    /// size exceeds `bound`. Used by pattern generators (CEGAR, systematic
    /// enumeration) that have a configured per-PDB size cap.
    pub fn with_bound(pattern: Pattern, task: &impl TaskView, bound: usize) -> Result<PerfectHash> {
        let hash = Self::new(pattern, task)?;
        if hash.size > bound {
            return Err(PlannerError::SizeLimitExceeded(format!(
                "pattern {:?} has size {} which exceeds bound {bound}",
                hash.pattern, hash.size
            )));
        }
        Ok(hash)
    }

    pub fn pattern(&self) -> &[VarId] {
        &self.pattern
    }

    /// The number of distinct assignments, i.e. `Π domain(pattern[i])`.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The multiplier of the `i`-th pattern variable.
    pub fn multiplier(&self, i: usize) -> usize {
        self.multipliers[i]
    }

    pub fn domain_at(&self, i: usize) -> usize {
        self.domains[i]
    }

    /// Ranks a full concrete assignment, indexed by the *original* task
    /// variable ids (only the entries at pattern positions are read).
    pub fn rank_state(&self, state: &[Value]) -> usize {
        let mut index = 0;
        for (i, &var) in self.pattern.iter().enumerate() {
            index += state[var] * self.multipliers[i];
        }
        index
    }

    /// Ranks an assignment given already in pattern order.
    pub fn rank(&self, pattern_values: &[Value]) -> usize {
        debug_assert_eq!(pattern_values.len(), self.pattern.len());
        let mut index = 0;
        for (i, &value) in pattern_values.iter().enumerate() {
            index += value * self.multipliers[i];
        }
        index
    }

    /// Recovers the value of the `i`-th pattern variable within `index`.
    pub fn unrank_var(&self, index: usize, i: usize) -> Value {
        (index / self.multipliers[i]) % self.domains[i]
    }

    /// Recovers the full pattern-order assignment for `index`.
    pub fn unrank(&self, index: usize) -> Vec<Value> {
        (0..self.pattern.len()).map(|i| self.unrank_var(index, i)).collect()
    }
}
