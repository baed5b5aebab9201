//! Evaluation strategies.
//!
//! An [`Evaluator`] turns a block of points into one [`EvaluationOutcome`]
//! per point, in block order. The variants differ only in where the
//! blackbox runs and in what happens alongside it:
//!
//! - [`DirectEvaluator`] calls a point-wise blackbox on the current thread.
//! - [`PooledEvaluator`] fans a point-wise blackbox out over a [`WorkerPool`].
//! - [`RecordingEvaluator`] also forwards a side packet per point to a
//!   [`Recorder`].
//! - [`BlockFnEvaluator`] adapts a caller function that handles whole blocks.
//!
//! Blackbox errors abort the block: the first failing point becomes a
//! [`BridgeError::PointEvaluation`], and nothing after it is returned.

use serde::Serialize;

use bb_types::{Block, BridgeError, BridgeResult, EvaluationOutcome, Point};

use crate::pool::WorkerPool;
use crate::recorder::Recorder;

/// Block-wise evaluation strategy selected when the bridge is built.
pub trait Evaluator {
    /// Evaluate every point of `block`, returning outcomes in block order.
    fn evaluate(&mut self, block: &Block) -> BridgeResult<Vec<EvaluationOutcome>>;

    /// Dimension this evaluator was built for, if it declares one.
    fn dimension(&self) -> Option<usize> {
        None
    }

    /// Release anything held for the run. Called once, on every exit path.
    fn finish(&mut self) -> BridgeResult<()> {
        Ok(())
    }
}

fn point_failure(index: usize, error: anyhow::Error) -> BridgeError {
    BridgeError::PointEvaluation {
        index,
        message: format!("{error:#}"),
    }
}

// ---- Direct ----

/// Evaluates points one by one on the calling thread.
pub struct DirectEvaluator<F> {
    blackbox: F,
    dimension: Option<usize>,
}

impl<F> DirectEvaluator<F>
where
    F: FnMut(&Point) -> anyhow::Result<EvaluationOutcome>,
{
    pub fn new(blackbox: F) -> Self {
        Self {
            blackbox,
            dimension: None,
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

impl<F> Evaluator for DirectEvaluator<F>
where
    F: FnMut(&Point) -> anyhow::Result<EvaluationOutcome>,
{
    fn evaluate(&mut self, block: &Block) -> BridgeResult<Vec<EvaluationOutcome>> {
        let mut outcomes = Vec::with_capacity(block.len());
        for (index, point) in block.iter().enumerate() {
            let outcome = (self.blackbox)(point).map_err(|e| point_failure(index, e))?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

// ---- Pooled ----

/// Submits the whole block to a worker pool and collects the results in
/// submission order.
pub struct PooledEvaluator<F, P> {
    blackbox: F,
    pool: P,
    dimension: Option<usize>,
}

impl<F, P> PooledEvaluator<F, P>
where
    F: Fn(&Point) -> anyhow::Result<EvaluationOutcome> + Sync,
    P: WorkerPool,
{
    pub fn new(blackbox: F, pool: P) -> Self {
        Self {
            blackbox,
            pool,
            dimension: None,
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

impl<F, P> Evaluator for PooledEvaluator<F, P>
where
    F: Fn(&Point) -> anyhow::Result<EvaluationOutcome> + Sync,
    P: WorkerPool,
{
    fn evaluate(&mut self, block: &Block) -> BridgeResult<Vec<EvaluationOutcome>> {
        let mut outcomes = Vec::with_capacity(block.len());
        self.pool
            .map_ordered(block.points(), &self.blackbox, |index, result| {
                outcomes.push(result.map_err(|e| point_failure(index, e))?);
                Ok(())
            })?;
        Ok(outcomes)
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

// ---- Recording ----

/// Pooled evaluation plus a side channel.
///
/// The blackbox returns `(outcome, packet)`. As results are delivered in
/// block order, each packet is written to the recorder before its outcome
/// is accepted, so a packet is never held past its own point.
pub struct RecordingEvaluator<F, P, R> {
    blackbox: F,
    pool: P,
    recorder: R,
    packets: u64,
    dimension: Option<usize>,
}

impl<F, P, R, K> RecordingEvaluator<F, P, R>
where
    F: Fn(&Point) -> anyhow::Result<(EvaluationOutcome, Option<K>)> + Sync,
    K: Serialize + Send,
    P: WorkerPool,
    R: Recorder,
{
    pub fn new(blackbox: F, pool: P, recorder: R) -> Self {
        Self {
            blackbox,
            pool,
            recorder,
            packets: 0,
            dimension: None,
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Packets recorded so far over the run.
    pub fn packets_recorded(&self) -> u64 {
        self.packets
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }
}

impl<F, P, R, K> Evaluator for RecordingEvaluator<F, P, R>
where
    F: Fn(&Point) -> anyhow::Result<(EvaluationOutcome, Option<K>)> + Sync,
    K: Serialize + Send,
    P: WorkerPool,
    R: Recorder,
{
    fn evaluate(&mut self, block: &Block) -> BridgeResult<Vec<EvaluationOutcome>> {
        let mut outcomes = Vec::with_capacity(block.len());
        let recorder = &self.recorder;
        let packets = &mut self.packets;

        self.pool
            .map_ordered(block.points(), &self.blackbox, |index, result| {
                let (outcome, packet) = result.map_err(|e| point_failure(index, e))?;
                if let Some(packet) = packet {
                    recorder.record(&packet)?;
                    *packets += 1;
                }
                outcomes.push(outcome);
                Ok(())
            })?;
        Ok(outcomes)
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn finish(&mut self) -> BridgeResult<()> {
        self.recorder.close()
    }
}

// ---- Block function ----

/// Adapts a caller function that evaluates a whole block at once.
///
/// The function must return one outcome per point; the dispatcher rejects
/// any other count.
pub struct BlockFnEvaluator<F> {
    evaluate: F,
}

impl<F> BlockFnEvaluator<F>
where
    F: FnMut(&Block) -> anyhow::Result<Vec<EvaluationOutcome>>,
{
    pub fn new(evaluate: F) -> Self {
        Self { evaluate }
    }
}

impl<F> Evaluator for BlockFnEvaluator<F>
where
    F: FnMut(&Block) -> anyhow::Result<Vec<EvaluationOutcome>>,
{
    fn evaluate(&mut self, block: &Block) -> BridgeResult<Vec<EvaluationOutcome>> {
        // Attributed to the start of the block: a block-wise function cannot
        // say which point broke.
        (self.evaluate)(block).map_err(|e| point_failure(0, e))
    }
}
