//! Blackbox output declaration (`BB_OUTPUT_TYPE`) and outcome parsing.

use std::fmt;

use bb_types::{invalid_config, BridgeResult, EvaluationOutcome};

/// Role of one field in a blackbox outcome string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// The objective to minimize.
    Objective,
    /// Constraint `c <= 0` handled by the progressive barrier.
    ProgressiveBarrier,
    /// Constraint `c <= 0` that rejects the point outright when violated.
    ExtremeBarrier,
    /// Count flag reported by the blackbox. Parsed but not used.
    CountEval,
    /// Extra output carried along without influencing the search.
    Extra,
    /// Field to ignore.
    Nothing,
}

impl OutputKind {
    pub fn parse(token: &str) -> BridgeResult<Self> {
        match token.to_ascii_uppercase().as_str() {
            "OBJ" => Ok(OutputKind::Objective),
            "PB" | "CSTR" => Ok(OutputKind::ProgressiveBarrier),
            "EB" => Ok(OutputKind::ExtremeBarrier),
            "CNT_EVAL" => Ok(OutputKind::CountEval),
            "EXTRA_O" => Ok(OutputKind::Extra),
            "NOTHING" | "-" => Ok(OutputKind::Nothing),
            other => Err(invalid_config!("unknown BB_OUTPUT_TYPE entry: {other}")),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputKind::Objective => "OBJ",
            OutputKind::ProgressiveBarrier => "PB",
            OutputKind::ExtremeBarrier => "EB",
            OutputKind::CountEval => "CNT_EVAL",
            OutputKind::Extra => "EXTRA_O",
            OutputKind::Nothing => "NOTHING",
        };
        write!(f, "{}", s)
    }
}

/// How the engine reads one evaluation outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interpretation {
    /// Failed, or the outcome string does not match the declared outputs.
    Unusable,
    /// Evaluated, but the caller asked to keep it out of the ranking.
    Excluded,
    /// An extreme-barrier constraint is violated.
    Barred,
    /// Usable for ranking. `violation` is zero for feasible points.
    Ranked { objective: f64, violation: f64 },
}

/// Ordered list of output fields the blackbox writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    kinds: Vec<OutputKind>,
}

impl OutputLayout {
    /// Parse a `BB_OUTPUT_TYPE` value. Exactly one `OBJ` is required.
    pub fn parse(value: &str) -> BridgeResult<Self> {
        let kinds = value
            .split_whitespace()
            .map(OutputKind::parse)
            .collect::<BridgeResult<Vec<_>>>()?;

        let objectives = kinds.iter().filter(|k| **k == OutputKind::Objective).count();
        if objectives != 1 {
            return Err(invalid_config!(
                "BB_OUTPUT_TYPE must declare exactly one OBJ, found {objectives}"
            ));
        }
        Ok(Self { kinds })
    }

    pub fn kinds(&self) -> &[OutputKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn interpret(&self, outcome: &EvaluationOutcome) -> Interpretation {
        if !outcome.success {
            return Interpretation::Unusable;
        }
        let Some((objective, constraints)) = self.read(&outcome.outcome) else {
            return Interpretation::Unusable;
        };

        let mut violation = 0.0;
        let mut barred = false;
        for (kind, value) in constraints {
            match kind {
                OutputKind::ProgressiveBarrier if value > 0.0 => violation += value * value,
                OutputKind::ExtremeBarrier if value > 0.0 => barred = true,
                _ => {}
            }
        }

        if !objective.is_finite() || !violation.is_finite() {
            return Interpretation::Unusable;
        }
        if !outcome.include {
            return Interpretation::Excluded;
        }
        if barred {
            return Interpretation::Barred;
        }
        Interpretation::Ranked {
            objective,
            violation,
        }
    }

    /// Objective and raw constraint values (`PB` and `EB`, in declaration
    /// order) of an outcome usable for model fitting. All must be finite.
    pub fn measurements(&self, outcome: &EvaluationOutcome) -> Option<(f64, Vec<f64>)> {
        if !outcome.success || !outcome.include {
            return None;
        }
        let (objective, constraints) = self.read(&outcome.outcome)?;
        let values: Vec<f64> = constraints.into_iter().map(|(_, v)| v).collect();
        if !objective.is_finite() || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some((objective, values))
    }

    /// Split an outcome string into the objective and the constraint fields.
    /// `None` when the field count or a numeric field is wrong.
    fn read(&self, outcome: &str) -> Option<(f64, Vec<(OutputKind, f64)>)> {
        let fields: Vec<&str> = outcome.split_whitespace().collect();
        if fields.len() != self.kinds.len() {
            return None;
        }

        let mut objective = f64::NAN;
        let mut constraints = Vec::new();
        for (kind, field) in self.kinds.iter().zip(fields) {
            if matches!(
                kind,
                OutputKind::Nothing | OutputKind::Extra | OutputKind::CountEval
            ) {
                continue;
            }
            let value = field.parse::<f64>().ok().filter(|v| !v.is_nan())?;
            match kind {
                OutputKind::Objective => objective = value,
                _ => constraints.push((*kind, value)),
            }
        }
        Some((objective, constraints))
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            kinds: vec![OutputKind::Objective],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bb_types::BridgeError;

    #[test]
    fn parses_declared_outputs() {
        let layout = OutputLayout::parse("OBJ pb EB CSTR EXTRA_O CNT_EVAL NOTHING").unwrap();
        assert_eq!(layout.len(), 7);
        assert_eq!(layout.kinds()[1], OutputKind::ProgressiveBarrier);
        assert_eq!(layout.kinds()[3], OutputKind::ProgressiveBarrier);
    }

    #[test]
    fn requires_exactly_one_objective() {
        assert!(matches!(
            OutputLayout::parse("PB EB"),
            Err(BridgeError::InvalidConfig { .. })
        ));
        assert!(OutputLayout::parse("OBJ OBJ").is_err());
        assert!(OutputLayout::parse("OBJ BOGUS").is_err());
    }

    #[test]
    fn progressive_barrier_sums_squared_violations() {
        let layout = OutputLayout::parse("OBJ PB PB").unwrap();
        let outcome = EvaluationOutcome::accepted("1.5 2.0 -3.0");
        assert_eq!(
            layout.interpret(&outcome),
            Interpretation::Ranked {
                objective: 1.5,
                violation: 4.0
            }
        );
    }

    #[test]
    fn extreme_barrier_bars_point() {
        let layout = OutputLayout::parse("OBJ EB").unwrap();
        assert_eq!(
            layout.interpret(&EvaluationOutcome::accepted("0.0 0.1")),
            Interpretation::Barred
        );
        assert!(matches!(
            layout.interpret(&EvaluationOutcome::accepted("0.0 -0.1")),
            Interpretation::Ranked { violation, .. } if violation == 0.0
        ));
    }

    #[test]
    fn unusable_outcomes() {
        let layout = OutputLayout::parse("OBJ PB").unwrap();
        assert_eq!(layout.interpret(&EvaluationOutcome::failed()), Interpretation::Unusable);
        assert_eq!(
            layout.interpret(&EvaluationOutcome::accepted("1.0")),
            Interpretation::Unusable
        );
        assert_eq!(
            layout.interpret(&EvaluationOutcome::accepted("abc 1.0")),
            Interpretation::Unusable
        );
        assert_eq!(
            layout.interpret(&EvaluationOutcome::accepted("NaN 1.0")),
            Interpretation::Unusable
        );
    }

    #[test]
    fn measurements_keep_raw_constraint_values() {
        let layout = OutputLayout::parse("OBJ PB EXTRA_O EB").unwrap();
        assert_eq!(
            layout.measurements(&EvaluationOutcome::accepted("1.5 -2.0 tag 0.5")),
            Some((1.5, vec![-2.0, 0.5]))
        );
        assert_eq!(
            layout.measurements(&EvaluationOutcome::excluded("1.5 -2.0 tag 0.5")),
            None
        );
        assert_eq!(
            layout.measurements(&EvaluationOutcome::accepted("1.5 inf tag 0.5")),
            None
        );
    }

    #[test]
    fn excluded_outcome_is_not_ranked() {
        let layout = OutputLayout::default();
        assert_eq!(
            layout.interpret(&EvaluationOutcome::excluded("1.0")),
            Interpretation::Excluded
        );
    }

    #[test]
    fn ignored_fields_may_hold_anything() {
        let layout = OutputLayout::parse("OBJ EXTRA_O NOTHING").unwrap();
        assert_eq!(
            layout.interpret(&EvaluationOutcome::accepted("2.0 label -")),
            Interpretation::Ranked {
                objective: 2.0,
                violation: 0.0
            }
        );
    }
}
