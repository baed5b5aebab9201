//! Pool-mapped evaluation: each block is spread over a rayon pool.
//!
//! Run with `cargo run -p bb-bridge --example parallel -- 8` to use eight
//! workers (defaults to the number of available cores).

use std::thread;

use bb_bridge::{
    AggregationMode, Bridge, BridgeConfig, EvaluationOutcome, Parameters, Point, PooledEvaluator,
    RayonPool,
};
use bb_engine::CompassSearch;
use tracing_subscriber::EnvFilter;

/// `fw = ‖p - 1‖` subject to `cw = 2 - ‖p‖ <= 0`.
fn blackbox(point: &Point) -> anyhow::Result<EvaluationOutcome> {
    let fw = point.iter().map(|x| (x - 1.0).powi(2)).sum::<f64>().sqrt();
    let cw = 2.0 - point.norm();
    Ok(EvaluationOutcome::from_values(&[fw, cw]))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let workers = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => thread::available_parallelism().map_or(1, |n| n.get()),
    };

    let parameters = Parameters::from_lines([
        "BB_OUTPUT_TYPE OBJ PB",
        "BB_MAX_BLOCK_SIZE 10",
        "MAX_BB_EVAL 1000",
        "SEED 42",
        "DIMENSION 2",
        "DIRECTION_TYPE ORTHO 2N",
        "X0          ( 2.0  2.0 )",
        "LOWER_BOUND ( 0.0  0.0 )",
        "UPPER_BOUND ( 5.0  5.0 )",
        "DISPLAY_DEGREE 0",
    ]);

    let bridge = Bridge::new(BridgeConfig::new().with_aggregation(AggregationMode::Multiple));
    let mut evaluator = PooledEvaluator::new(blackbox, RayonPool::new(workers)?);
    let result = bridge.minimize(&mut CompassSearch::new(), &mut evaluator, &parameters)?;

    println!("{result}");
    Ok(())
}
