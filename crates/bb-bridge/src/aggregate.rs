//! Normalizes the engine's termination record into the caller-facing result.

use serde::{Deserialize, Serialize};
use std::fmt;

use bb_types::{Solution, TerminationRecord};

use crate::config::AggregationMode;

/// Best solutions in the requested shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Solutions {
    /// The engine's top-ranked solution, or `None` if it found none.
    Single(Option<Solution>),
    /// Every solution the engine ranked best, in the engine's order.
    Multiple(Vec<Solution>),
}

impl Solutions {
    /// The top-ranked solution in either shape.
    pub fn best(&self) -> Option<&Solution> {
        match self {
            Self::Single(solution) => solution.as_ref(),
            Self::Multiple(solutions) => solutions.first(),
        }
    }

    pub fn as_slice(&self) -> &[Solution] {
        match self {
            Self::Single(Some(solution)) => std::slice::from_ref(solution),
            Self::Single(None) => &[],
            Self::Multiple(solutions) => solutions,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// Final outcome of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub success: bool,
    pub status: Option<i32>,
    pub eval_count: usize,
    pub best_feasible: Solutions,
    pub best_infeasible: Solutions,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn describe(solutions: &Solutions) -> String {
            match solutions.best() {
                Some(best) if solutions.len() > 1 => format!(
                    "{} at {} (+{} more)",
                    best.objective,
                    best.point,
                    solutions.len() - 1
                ),
                Some(best) => format!("{} at {}", best.objective, best.point),
                None => "none".to_string(),
            }
        }

        writeln!(f, "termination flag    {}", self.success)?;
        match self.status {
            Some(status) => writeln!(f, "termination status  {status}")?,
            None => writeln!(f, "termination status  -")?,
        }
        writeln!(f, "evaluations         {}", self.eval_count)?;
        writeln!(f, "best feasible       {}", describe(&self.best_feasible))?;
        write!(f, "best infeasible     {}", describe(&self.best_infeasible))
    }
}

/// Reshapes a [`TerminationRecord`] without recomputing anything.
#[derive(Debug, Clone, Copy)]
pub struct SolutionAggregator {
    mode: AggregationMode,
}

impl SolutionAggregator {
    pub fn new(mode: AggregationMode) -> Self {
        Self { mode }
    }

    pub fn aggregate(&self, record: TerminationRecord) -> OptimizationResult {
        OptimizationResult {
            success: record.success,
            status: record.status,
            eval_count: record.eval_count,
            best_feasible: self.shape(record.best_feasible),
            best_infeasible: self.shape(record.best_infeasible),
        }
    }

    fn shape(&self, solutions: Vec<Solution>) -> Solutions {
        match self.mode {
            AggregationMode::Single => Solutions::Single(solutions.into_iter().next()),
            AggregationMode::Multiple => Solutions::Multiple(solutions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bb_types::Point;

    fn solution(objective: f64, x: f64) -> Solution {
        Solution::new(objective, Point::new(vec![x]))
    }

    fn record() -> TerminationRecord {
        TerminationRecord::new(true, 42)
            .with_status(0)
            .with_feasible(vec![solution(0.0, -1.0), solution(0.0, 1.0)])
            .with_infeasible(vec![solution(3.5, 4.0)])
    }

    #[test]
    fn single_mode_takes_first_ranked() {
        let result = SolutionAggregator::new(AggregationMode::Single).aggregate(record());
        assert!(result.success);
        assert_eq!(result.status, Some(0));
        assert_eq!(result.eval_count, 42);
        assert_eq!(result.best_feasible, Solutions::Single(Some(solution(0.0, -1.0))));
        assert_eq!(result.best_infeasible, Solutions::Single(Some(solution(3.5, 4.0))));
    }

    #[test]
    fn multiple_mode_preserves_engine_order() {
        let unsorted = TerminationRecord::new(true, 3).with_feasible(vec![
            solution(2.0, 0.0),
            solution(1.0, 5.0),
            solution(3.0, 2.0),
        ]);
        let result = SolutionAggregator::new(AggregationMode::Multiple).aggregate(unsorted);
        let objectives: Vec<f64> = result
            .best_feasible
            .as_slice()
            .iter()
            .map(|s| s.objective)
            .collect();
        assert_eq!(objectives, vec![2.0, 1.0, 3.0]);
        assert_eq!(result.best_infeasible, Solutions::Multiple(Vec::new()));
    }

    #[test]
    fn zero_feasible_points_is_explicitly_absent() {
        let record = TerminationRecord::new(true, 10).with_infeasible(vec![solution(1.0, 9.0)]);

        let single = SolutionAggregator::new(AggregationMode::Single).aggregate(record.clone());
        assert_eq!(single.best_feasible, Solutions::Single(None));
        assert!(single.best_feasible.best().is_none());

        let multiple = SolutionAggregator::new(AggregationMode::Multiple).aggregate(record);
        assert!(multiple.best_feasible.is_empty());
    }

    #[test]
    fn display_summarizes_result() {
        let result = SolutionAggregator::new(AggregationMode::Multiple).aggregate(record());
        let text = result.to_string();
        assert!(text.contains("evaluations         42"));
        assert!(text.contains("(+1 more)"));
    }
}
