//! Per-point evaluation outcome handed back to the engine.

use serde::{Deserialize, Serialize};

/// The `(success, include, outcome)` triplet produced for one point.
///
/// `outcome` holds the space-separated objective/constraint values laid out
/// according to the engine's `BB_OUTPUT_TYPE`. The bridge never parses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    /// `false` when the evaluation itself failed (crash, NaN, timeout).
    pub success: bool,
    /// `false` when the engine should leave this point out of its bookkeeping.
    pub include: bool,
    pub outcome: String,
}

impl EvaluationOutcome {
    pub fn new(success: bool, include: bool, outcome: impl Into<String>) -> Self {
        Self {
            success,
            include,
            outcome: outcome.into(),
        }
    }

    /// A successful, included evaluation.
    pub fn accepted(outcome: impl Into<String>) -> Self {
        Self::new(true, true, outcome)
    }

    /// Format raw output values and wrap them as an accepted outcome.
    pub fn from_values(values: &[f64]) -> Self {
        Self::accepted(format_outputs(values))
    }

    /// A successful evaluation the engine should ignore.
    pub fn excluded(outcome: impl Into<String>) -> Self {
        Self::new(true, false, outcome)
    }

    /// A failed evaluation carrying no values.
    pub fn failed() -> Self {
        Self::new(false, false, String::new())
    }
}

/// Format blackbox outputs the way engines expect them: fixed 16-decimal
/// notation, separated by a single space.
pub fn format_outputs(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:.16}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sixteen_decimals() {
        assert_eq!(
            format_outputs(&[1.0, -0.5]),
            "1.0000000000000000 -0.5000000000000000"
        );
        assert_eq!(format_outputs(&[]), "");
    }

    #[test]
    fn constructors_set_flags() {
        let ok = EvaluationOutcome::accepted("1.0");
        assert!(ok.success && ok.include);

        let skipped = EvaluationOutcome::excluded("1.0");
        assert!(skipped.success && !skipped.include);

        let failed = EvaluationOutcome::failed();
        assert!(!failed.success && !failed.include);
        assert!(failed.outcome.is_empty());
    }
}
