//! Bridge-level run configuration.
//!
//! This is the bridge's own configuration. Engine parameters live separately
//! in [`bb_types::Parameters`] and are never interpreted here.

use serde::{Deserialize, Serialize};

use bb_types::BridgeResult;

/// Shape of the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Only the engine's top-ranked feasible/infeasible solution.
    #[default]
    Single,
    /// Every solution the engine ranked as best, in the engine's order.
    Multiple,
}

/// What the dispatcher does when a single point's evaluation fails.
///
/// Pool, recorder and configuration failures always abort the run; this
/// only governs blackbox errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Propagate the failure and terminate the run.
    #[default]
    AbortRun,
    /// Report every point of the block as a failed evaluation and let the
    /// engine carry on.
    RejectBlock,
}

/// Top-level configuration for a bridge run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub aggregation: AggregationMode,
    pub failure_policy: FailurePolicy,
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aggregation(mut self, mode: AggregationMode) -> Self {
        self.aggregation = mode;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Shorthand for `with_aggregation(AggregationMode::Multiple)`.
    pub fn multiple(self) -> Self {
        self.with_aggregation(AggregationMode::Multiple)
    }

    pub fn from_json(json: &str) -> BridgeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
