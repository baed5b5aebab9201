//! Serial evaluation: every point runs on the calling thread.
//!
//! Run with `RUST_LOG=info cargo run -p bb-bridge --example serial`.

use bb_bridge::{minimize, DirectEvaluator, EvaluationOutcome, Parameters, Point};
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

    let parameters = Parameters::from_lines([
        "BB_OUTPUT_TYPE OBJ PB",
        "BB_MAX_BLOCK_SIZE 10",
        "MAX_BB_EVAL 100",
        "SEED 1000000000",
        "DIMENSION 2",
        "DIRECTION_TYPE ORTHO 2N",
        "X0          ( 2.0  2.0 )",
        "LOWER_BOUND ( 0.0  0.0 )",
        "UPPER_BOUND ( 5.0  5.0 )",
        "DISPLAY_DEGREE 0",
    ]);

    let mut engine = CompassSearch::new();
    let mut evaluator = DirectEvaluator::new(blackbox);
    let result = minimize(&mut engine, &mut evaluator, &parameters)?;

    println!("{result}");
    Ok(())
}
