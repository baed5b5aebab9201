//! Optimizer driver: hands the dispatcher to the engine and turns its
//! termination record into an [`OptimizationResult`].

use tracing::{info, warn};

use bb_types::{BridgeError, BridgeResult, Engine, Parameters};

use crate::aggregate::{OptimizationResult, SolutionAggregator};
use crate::config::BridgeConfig;
use crate::dispatch::BlockDispatcher;
use crate::evaluator::Evaluator;

/// Entry point for a bridged optimization run.
#[derive(Debug, Clone, Default)]
pub struct Bridge {
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run `engine` to termination, evaluating every block with `evaluator`.
    ///
    /// `parameters` reach the engine verbatim. The evaluator is finished
    /// (recorders flushed and closed) whether or not the run succeeds.
    pub fn minimize<En, Ev>(
        &self,
        engine: &mut En,
        evaluator: &mut Ev,
        parameters: &Parameters,
    ) -> BridgeResult<OptimizationResult>
    where
        En: Engine + ?Sized,
        Ev: Evaluator,
    {
        let outcome = self.run(engine, evaluator, parameters);
        let finished = evaluator.finish();

        match (outcome, finished) {
            (Ok(result), Ok(())) => Ok(result),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close)) => {
                warn!(error = %close, "evaluator cleanup failed after run error");
                Err(e)
            }
        }
    }

    fn run<En, Ev>(
        &self,
        engine: &mut En,
        evaluator: &mut Ev,
        parameters: &Parameters,
    ) -> BridgeResult<OptimizationResult>
    where
        En: Engine + ?Sized,
        Ev: Evaluator,
    {
        let dimension = Self::check_dimensions(engine, evaluator, parameters)?;

        info!(
            engine = engine.name(),
            version = crate::VERSION,
            dimension,
            aggregation = ?self.config.aggregation,
            "Starting optimization run"
        );

        let mut dispatcher = BlockDispatcher::new(evaluator, dimension, self.config.failure_policy);
        let record = engine.run(&mut dispatcher)?;

        // The engine must stop on a fatal block error; a record produced
        // after one is not trustworthy.
        if dispatcher.is_aborted() {
            return Err(BridgeError::RunAborted);
        }

        let stats = dispatcher.stats();
        info!(
            blocks = stats.blocks,
            points = stats.points,
            rejected = stats.rejected_blocks,
            evaluations = record.eval_count,
            success = record.success,
            "Optimization run completed"
        );

        Ok(SolutionAggregator::new(self.config.aggregation).aggregate(record))
    }

    /// Configured, engine and evaluator dimensions must all agree before any
    /// block is evaluated.
    fn check_dimensions<En, Ev>(
        engine: &mut En,
        evaluator: &Ev,
        parameters: &Parameters,
    ) -> BridgeResult<usize>
    where
        En: Engine + ?Sized,
        Ev: Evaluator,
    {
        let configured = parameters.dimension()?;
        let engine_dimension = engine.configure(parameters)?;
        if engine_dimension != configured {
            return Err(BridgeError::ConfigurationMismatch {
                expected: configured,
                actual: engine_dimension,
            });
        }
        if let Some(actual) = evaluator.dimension() {
            if actual != configured {
                return Err(BridgeError::ConfigurationMismatch {
                    expected: configured,
                    actual,
                });
            }
        }
        Ok(configured)
    }
}

/// Run with the default configuration (single best solution, abort on
/// any failure).
pub fn minimize<En, Ev>(
    engine: &mut En,
    evaluator: &mut Ev,
    parameters: &Parameters,
) -> BridgeResult<OptimizationResult>
where
    En: Engine + ?Sized,
    Ev: Evaluator,
{
    Bridge::default().minimize(engine, evaluator, parameters)
}
