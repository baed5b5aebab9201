//! # bb-bridge
//!
//! Connects a direct-search optimization engine to caller-supplied blackbox
//! functions.
//!
//! The engine proposes blocks of trial points; the bridge evaluates each
//! block through the selected [`Evaluator`] (on the calling thread, on a
//! worker pool, or on a pool with a packet recorder alongside), returns the
//! outcomes in block order, and reshapes the engine's termination record
//! into an [`OptimizationResult`].

mod aggregate;
mod config;
mod dispatch;
mod driver;
mod evaluator;
mod pool;
mod recorder;

pub use aggregate::{OptimizationResult, SolutionAggregator, Solutions};
pub use config::{AggregationMode, BridgeConfig, FailurePolicy};
pub use dispatch::{BlockDispatcher, DispatchStats};
pub use driver::{minimize, Bridge};
pub use evaluator::{BlockFnEvaluator, DirectEvaluator, Evaluator, PooledEvaluator, RecordingEvaluator};
pub use pool::{ChannelPool, InlinePool, RayonPool, WorkerPool};
pub use recorder::{load_journal, JournalRecorder, MemoryRecorder, Recorder};

pub use bb_types::{
    format_outputs, Block, BridgeError, BridgeResult, Engine, EvaluationOutcome, Parameters,
    Point, Solution, TerminationRecord,
};

/// Crate version, reported in run logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
