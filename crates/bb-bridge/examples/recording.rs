//! Pool-mapped evaluation that also journals `(point, fw, cw)` for every
//! evaluated point, appending to `recording.jsonl` across runs.

use serde::{Deserialize, Serialize};

use bb_bridge::{
    load_journal, minimize, ChannelPool, EvaluationOutcome, JournalRecorder, Parameters, Point,
    RecordingEvaluator,
};
use bb_engine::CompassSearch;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct Packet {
    point: Vec<f64>,
    fw: f64,
    cw: f64,
}

fn blackbox(point: &Point) -> anyhow::Result<(EvaluationOutcome, Option<Packet>)> {
    let fw = point.iter().map(|x| (x - 1.0).powi(2)).sum::<f64>().sqrt();
    let cw = 2.0 - point.norm();
    let packet = Packet {
        point: point.coords().to_vec(),
        fw,
        cw,
    };
    Ok((EvaluationOutcome::from_values(&[fw, cw]), Some(packet)))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = "recording.jsonl";
    let parameters = Parameters::from_lines([
        "BB_OUTPUT_TYPE OBJ PB",
        "BB_MAX_BLOCK_SIZE 10",
        "MAX_BB_EVAL 1000",
        "SEED 7",
        "DIMENSION 2",
        "X0          ( 2.0  2.0 )",
        "LOWER_BOUND ( 0.0  0.0 )",
        "UPPER_BOUND ( 5.0  5.0 )",
    ]);

    let mut evaluator =
        RecordingEvaluator::new(blackbox, ChannelPool::new(4)?, JournalRecorder::open(path)?);
    let result = minimize(&mut CompassSearch::new(), &mut evaluator, &parameters)?;
    println!("{result}");

    let packets: Vec<Packet> = load_journal(path)?;
    println!("journal holds {} packets", packets.len());
    Ok(())
}
