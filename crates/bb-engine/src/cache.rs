//! Evaluation cache: every point sent to the blackbox, plus the ranked ones
//! in the order they were found.

use std::collections::HashSet;

use bb_types::{Point, Solution};

use crate::output::Interpretation;

/// Where a ranked evaluation stands. `violation` is the squared sum of
/// progressive-barrier violations; zero means feasible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranking {
    pub objective: f64,
    pub violation: f64,
}

impl Ranking {
    pub fn is_feasible(&self) -> bool {
        self.violation == 0.0
    }

    /// Strictly better: feasible beats infeasible, then lower objective for
    /// feasible points, lower violation then lower objective otherwise.
    pub fn improves_on(&self, other: &Ranking) -> bool {
        match (self.is_feasible(), other.is_feasible()) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => self.objective < other.objective,
            (false, false) => {
                self.violation < other.violation
                    || (self.violation == other.violation && self.objective < other.objective)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    point: Point,
    ranking: Ranking,
}

fn key(coords: &[f64]) -> Vec<u64> {
    // -0.0 and 0.0 are the same trial point
    coords
        .iter()
        .map(|c| if *c == 0.0 { 0 } else { c.to_bits() })
        .collect()
}

#[derive(Debug, Default)]
pub struct EvalCache {
    seen: HashSet<Vec<u64>>,
    ranked: Vec<Entry>,
}

impl EvalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, coords: &[f64]) -> bool {
        self.seen.contains(&key(coords))
    }

    /// Number of distinct points evaluated.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Store an evaluated point. Returns `false` if it was already cached,
    /// in which case nothing changes.
    pub fn insert(&mut self, point: Point, interpretation: Interpretation) -> bool {
        if !self.seen.insert(key(point.coords())) {
            return false;
        }
        if let Interpretation::Ranked {
            objective,
            violation,
        } = interpretation
        {
            self.ranked.push(Entry {
                point,
                ranking: Ranking {
                    objective,
                    violation,
                },
            });
        }
        true
    }

    /// Best point found so far; the earliest one on ties.
    pub fn incumbent(&self) -> Option<(&Point, Ranking)> {
        let mut best: Option<&Entry> = None;
        for entry in &self.ranked {
            match best {
                Some(current) if !entry.ranking.improves_on(&current.ranking) => {}
                _ => best = Some(entry),
            }
        }
        best.map(|e| (&e.point, e.ranking))
    }

    /// Every feasible point tied at the lowest objective, in first-found order.
    pub fn best_feasible(&self) -> Vec<Solution> {
        let best = self
            .ranked
            .iter()
            .filter(|e| e.ranking.is_feasible())
            .map(|e| e.ranking.objective)
            .fold(f64::INFINITY, f64::min);

        self.ranked
            .iter()
            .filter(|e| e.ranking.is_feasible() && e.ranking.objective == best)
            .map(|e| Solution::new(e.ranking.objective, e.point.clone()))
            .collect()
    }

    /// Infeasible points tied at the lowest violation and, among those, the
    /// lowest objective, in first-found order.
    pub fn best_infeasible(&self) -> Vec<Solution> {
        let mut best: Option<Ranking> = None;
        for entry in self.ranked.iter().filter(|e| !e.ranking.is_feasible()) {
            match best {
                Some(current) if !entry.ranking.improves_on(&current) => {}
                _ => best = Some(entry.ranking),
            }
        }

        let Some(best) = best else {
            return Vec::new();
        };
        self.ranked
            .iter()
            .filter(|e| e.ranking == best)
            .map(|e| Solution::new(e.ranking.objective, e.point.clone()))
            .collect()
    }
}
