//! End-of-run record produced by the engine.

use serde::{Deserialize, Serialize};

use crate::point::Point;

/// An `(objective value, point)` pair reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub objective: f64,
    pub point: Point,
}

impl Solution {
    pub fn new(objective: f64, point: Point) -> Self {
        Self { objective, point }
    }
}

/// What the engine hands back once it stops.
///
/// The solution lists are ordered by the engine's own ranking and are never
/// re-sorted downstream. Either may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationRecord {
    /// Whether the engine terminated normally.
    pub success: bool,
    /// Engine-specific stop code, if the engine reports one.
    pub status: Option<i32>,
    /// Number of blackbox evaluations performed.
    pub eval_count: usize,
    pub best_feasible: Vec<Solution>,
    pub best_infeasible: Vec<Solution>,
}

impl TerminationRecord {
    pub fn new(success: bool, eval_count: usize) -> Self {
        Self {
            success,
            status: None,
            eval_count,
            best_feasible: Vec::new(),
            best_infeasible: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_feasible(mut self, solutions: Vec<Solution>) -> Self {
        self.best_feasible = solutions;
        self
    }

    pub fn with_infeasible(mut self, solutions: Vec<Solution>) -> Self {
        self.best_infeasible = solutions;
        self
    }
}
