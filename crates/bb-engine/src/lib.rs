//! # bb-engine
//!
//! A small direct-search engine that drives blackbox evaluations through
//! the [`bb_types::BlockEvaluator`] protocol.
//!
//! [`CompassSearch`] tries a quadratic-model proposal around its incumbent,
//! then polls coordinate or seeded orthogonal directions. It doubles the
//! step after a successful iteration and halves it otherwise, and stops once
//! the step falls below the minimum mesh size or the evaluation budget runs
//! out. Runs are reproducible for a given `SEED`.

mod cache;
mod model;
mod output;
mod params;
mod search;

pub use cache::{EvalCache, Ranking};
pub use output::{Interpretation, OutputKind, OutputLayout};
pub use params::{PollDirections, SearchParameters};
pub use search::{CompassSearch, STATUS_BUDGET_EXHAUSTED, STATUS_MESH_CONVERGED};
