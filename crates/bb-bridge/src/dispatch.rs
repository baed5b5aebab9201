//! Block dispatcher: the callback the engine invokes once per block.

use tracing::{debug, error, warn};

use bb_types::{Block, BlockEvaluator, BridgeError, BridgeResult, EvaluationOutcome};

use crate::config::FailurePolicy;
use crate::evaluator::Evaluator;

/// Running counters for one dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub blocks: u64,
    pub points: u64,
    pub rejected_blocks: u64,
}

/// Routes each block through the configured evaluator exactly once and
/// hands the aligned outcomes back to the engine.
///
/// After a fatal failure the dispatcher refuses further blocks, so an engine
/// that swallows the error still cannot carry on with a broken run.
pub struct BlockDispatcher<'a, E> {
    evaluator: &'a mut E,
    dimension: usize,
    policy: FailurePolicy,
    stats: DispatchStats,
    aborted: bool,
}

impl<'a, E: Evaluator> BlockDispatcher<'a, E> {
    pub fn new(evaluator: &'a mut E, dimension: usize, policy: FailurePolicy) -> Self {
        Self {
            evaluator,
            dimension,
            policy,
            stats: DispatchStats::default(),
            aborted: false,
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Evaluate one block, enforcing the one-to-one ordered contract.
    pub fn dispatch(&mut self, block: &Block) -> BridgeResult<Vec<EvaluationOutcome>> {
        if self.aborted {
            return Err(BridgeError::RunAborted);
        }
        self.check_block(block).map_err(|e| self.abort(block, e))?;

        debug!(block = block.sequence, points = block.len(), "dispatching block");

        let outcomes = match self.evaluator.evaluate(block) {
            Ok(outcomes) => outcomes,
            Err(e) if e.is_point_failure() && self.policy == FailurePolicy::RejectBlock => {
                warn!(block = block.sequence, error = %e, "rejecting block after point failure");
                self.stats.blocks += 1;
                self.stats.points += block.len() as u64;
                self.stats.rejected_blocks += 1;
                return Ok(vec![EvaluationOutcome::failed(); block.len()]);
            }
            Err(e) => return Err(self.abort(block, e)),
        };

        if outcomes.len() != block.len() {
            let e = BridgeError::OutcomeCountMismatch {
                expected: block.len(),
                actual: outcomes.len(),
            };
            return Err(self.abort(block, e));
        }

        self.stats.blocks += 1;
        self.stats.points += block.len() as u64;
        Ok(outcomes)
    }

    fn check_block(&self, block: &Block) -> BridgeResult<()> {
        if block.is_empty() {
            return Err(BridgeError::EmptyBlock);
        }
        if let Some(point) = block.iter().find(|p| p.dimension() != self.dimension) {
            return Err(BridgeError::ConfigurationMismatch {
                expected: self.dimension,
                actual: point.dimension(),
            });
        }
        Ok(())
    }

    fn abort(&mut self, block: &Block, e: BridgeError) -> BridgeError {
        error!(block = block.sequence, error = %e, "block failed, aborting run");
        self.aborted = true;
        e
    }
}

impl<E: Evaluator> BlockEvaluator for BlockDispatcher<'_, E> {
    fn eval_block(&mut self, block: &Block) -> BridgeResult<Vec<EvaluationOutcome>> {
        self.dispatch(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{BlockFnEvaluator, DirectEvaluator, PooledEvaluator, RecordingEvaluator};
    use crate::pool::{ChannelPool, InlinePool};
    use crate::recorder::MemoryRecorder;
    use anyhow::bail;
    use bb_types::Point;

    fn block_of(sequence: u64, values: &[f64]) -> Block {
        Block::new(sequence, values.iter().map(|v| Point::new(vec![*v])).collect())
    }

    fn echo(point: &Point) -> anyhow::Result<EvaluationOutcome> {
        Ok(EvaluationOutcome::from_values(&[point[0]]))
    }

    fn failing_on_negative(point: &Point) -> anyhow::Result<EvaluationOutcome> {
        if point[0] < 0.0 {
            bail!("negative");
        }
        echo(point)
    }

    #[test]
    fn result_aligned_with_block_of_any_size() {
        let mut evaluator = DirectEvaluator::new(echo);
        let mut dispatcher = BlockDispatcher::new(&mut evaluator, 1, FailurePolicy::AbortRun);

        for size in [1usize, 2, 7, 31] {
            let values: Vec<f64> = (0..size).map(|i| i as f64).collect();
            let outcomes = dispatcher.dispatch(&block_of(0, &values)).unwrap();
            assert_eq!(outcomes.len(), size);
            for (value, outcome) in values.iter().zip(&outcomes) {
                assert_eq!(outcome.outcome, format!("{value:.16}"));
            }
        }
        assert_eq!(dispatcher.stats().blocks, 4);
        assert_eq!(dispatcher.stats().points, 41);
    }

    #[test]
    fn empty_block_is_rejected() {
        let mut evaluator = DirectEvaluator::new(echo);
        let mut dispatcher = BlockDispatcher::new(&mut evaluator, 1, FailurePolicy::AbortRun);
        assert!(matches!(
            dispatcher.dispatch(&Block::new(0, Vec::new())),
            Err(BridgeError::EmptyBlock)
        ));
    }

    #[test]
    fn wrong_point_dimension_is_configuration_mismatch() {
        let mut evaluator = DirectEvaluator::new(echo);
        let mut dispatcher = BlockDispatcher::new(&mut evaluator, 2, FailurePolicy::AbortRun);
        let err = dispatcher.dispatch(&block_of(0, &[1.0])).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ConfigurationMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn abort_run_policy_refuses_later_blocks() {
        let mut evaluator = DirectEvaluator::new(failing_on_negative);
        let mut dispatcher = BlockDispatcher::new(&mut evaluator, 1, FailurePolicy::AbortRun);

        let err = dispatcher.dispatch(&block_of(0, &[1.0, -1.0])).unwrap_err();
        assert!(matches!(err, BridgeError::PointEvaluation { index: 1, .. }));
        assert!(dispatcher.is_aborted());

        assert!(matches!(
            dispatcher.dispatch(&block_of(1, &[1.0])),
            Err(BridgeError::RunAborted)
        ));
        assert_eq!(dispatcher.stats().blocks, 0);
    }

    #[test]
    fn reject_block_policy_marks_whole_block_failed() {
        let mut evaluator = DirectEvaluator::new(failing_on_negative);
        let mut dispatcher = BlockDispatcher::new(&mut evaluator, 1, FailurePolicy::RejectBlock);

        let outcomes = dispatcher.dispatch(&block_of(0, &[1.0, -1.0, 2.0])).unwrap();
        assert_eq!(outcomes, vec![EvaluationOutcome::failed(); 3]);
        assert!(!dispatcher.is_aborted());

        let next = dispatcher.dispatch(&block_of(1, &[3.0])).unwrap();
        assert!(next[0].success);
        assert_eq!(dispatcher.stats().rejected_blocks, 1);
        assert_eq!(dispatcher.stats().blocks, 2);
    }

    #[test]
    fn reject_block_policy_keeps_infrastructure_failures_fatal() {
        let mut evaluator = BlockFnEvaluator::new(|block: &Block| {
            Ok(vec![EvaluationOutcome::accepted("1"); block.len() + 1])
        });
        let mut dispatcher = BlockDispatcher::new(&mut evaluator, 1, FailurePolicy::RejectBlock);

        let err = dispatcher.dispatch(&block_of(0, &[1.0, 2.0])).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::OutcomeCountMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert!(dispatcher.is_aborted());
    }

    #[test]
    fn reject_block_policy_keeps_worker_panic_fatal() {
        let mut evaluator = PooledEvaluator::new(
            |point: &Point| -> anyhow::Result<EvaluationOutcome> {
                if point[0] > 2.0 {
                    panic!("blackbox blew up");
                }
                echo(point)
            },
            ChannelPool::new(2).unwrap(),
        );
        let mut dispatcher = BlockDispatcher::new(&mut evaluator, 1, FailurePolicy::RejectBlock);

        let err = dispatcher.dispatch(&block_of(0, &[1.0, 3.0, 2.0])).unwrap_err();
        assert!(matches!(err, BridgeError::WorkerPool { .. }));
        assert!(dispatcher.is_aborted());
        assert_eq!(dispatcher.stats().rejected_blocks, 0);
        assert!(matches!(
            dispatcher.dispatch(&block_of(1, &[1.0])),
            Err(BridgeError::RunAborted)
        ));
    }

    #[test]
    fn reject_block_policy_keeps_closed_recorder_fatal() {
        let mut evaluator = RecordingEvaluator::new(
            |point: &Point| -> anyhow::Result<(EvaluationOutcome, Option<f64>)> {
                Ok((echo(point)?, Some(point[0])))
            },
            InlinePool,
            MemoryRecorder::new(),
        );
        evaluator.finish().unwrap();
        let mut dispatcher = BlockDispatcher::new(&mut evaluator, 1, FailurePolicy::RejectBlock);

        let err = dispatcher.dispatch(&block_of(0, &[1.0, 2.0])).unwrap_err();
        assert!(matches!(err, BridgeError::Recorder { .. }));
        assert!(dispatcher.is_aborted());
        assert_eq!(dispatcher.stats().rejected_blocks, 0);
    }

    #[test]
    fn short_outcome_sequence_is_never_padded() {
        let mut evaluator = BlockFnEvaluator::new(|block: &Block| {
            Ok(block
                .iter()
                .take(1)
                .map(|_| EvaluationOutcome::accepted("0"))
                .collect())
        });
        let mut dispatcher = BlockDispatcher::new(&mut evaluator, 1, FailurePolicy::AbortRun);
        assert!(matches!(
            dispatcher.dispatch(&block_of(0, &[1.0, 2.0, 3.0])),
            Err(BridgeError::OutcomeCountMismatch { .. })
        ));
    }
}
