//! Call contract between an external direct-search engine and the bridge.
//!
//! The engine owns the algorithm and its control loop. It hands blocks of
//! trial points to a [`BlockEvaluator`] and waits for the aligned outcomes
//! before deciding what to do next. It never sees how those points were
//! evaluated.

use crate::errors::BridgeResult;
use crate::outcome::EvaluationOutcome;
use crate::parameters::Parameters;
use crate::point::Block;
use crate::termination::TerminationRecord;

/// Callback the engine invokes once per block.
///
/// Implementations must return exactly one outcome per point, in block
/// order. An `Err` is fatal: the engine must stop and propagate it.
pub trait BlockEvaluator {
    fn eval_block(&mut self, block: &Block) -> BridgeResult<Vec<EvaluationOutcome>>;
}

/// An optimization engine the bridge can drive.
pub trait Engine {
    /// Human-readable engine name.
    fn name(&self) -> &str;

    /// Read the run parameters. Returns the dimension of the points the
    /// engine is going to generate.
    fn configure(&mut self, parameters: &Parameters) -> BridgeResult<usize>;

    /// Run to termination, evaluating every block through `evaluator`.
    fn run(&mut self, evaluator: &mut dyn BlockEvaluator) -> BridgeResult<TerminationRecord>;
}
