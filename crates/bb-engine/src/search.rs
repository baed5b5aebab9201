use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use bb_types::{
    engine_error, Block, BlockEvaluator, BridgeResult, Engine, Parameters, Point,
    TerminationRecord,
};

use crate::cache::{EvalCache, Ranking};
use crate::model::{self, Sample};
use crate::params::{PollDirections, SearchParameters};

/// Stop code: every mesh size fell below `MIN_MESH_SIZE`.
pub const STATUS_MESH_CONVERGED: i32 = 0;
/// Stop code: `MAX_BB_EVAL` points were evaluated.
pub const STATUS_BUDGET_EXHAUSTED: i32 = 1;

/// Compass search with a per-coordinate step.
///
/// Each iteration first tries one point proposed by quadratic models of the
/// cached evaluations (`QUAD_MODEL_SEARCH`). When that does not improve the
/// incumbent it polls `x ± Δ ∘ bᵢ` around the incumbent in a seeded random
/// order, where `bᵢ` are the coordinate axes or, with `DIRECTION_TYPE ORTHO
/// 2N`, the columns of a seeded random Householder reflection. Trial points
/// are clipped to the bounds, cached points are skipped, and the poll set is
/// submitted in blocks of at most `BB_MAX_BLOCK_SIZE`. A successful
/// iteration doubles the step (never past its initial size); a failed one
/// halves it.
#[derive(Debug, Default)]
pub struct CompassSearch {
    params: Option<SearchParameters>,
}

impl CompassSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings from the last `configure` call.
    pub fn parameters(&self) -> Option<&SearchParameters> {
        self.params.as_ref()
    }
}

impl Engine for CompassSearch {
    fn name(&self) -> &str {
        "compass-search"
    }

    fn configure(&mut self, parameters: &Parameters) -> BridgeResult<usize> {
        let params = SearchParameters::parse(parameters)?;
        let dimension = params.dimension;
        self.params = Some(params);
        Ok(dimension)
    }

    fn run(&mut self, evaluator: &mut dyn BlockEvaluator) -> BridgeResult<TerminationRecord> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| engine_error!("compass search run before configure"))?;

        info!(
            dimension = params.dimension,
            block_size = params.max_block_size,
            budget = ?params.max_evaluations,
            seed = params.seed,
            directions = ?params.directions,
            model_search = params.model_search,
            "Starting compass search"
        );

        let mut run = SearchRun {
            params,
            evaluator,
            cache: EvalCache::new(),
            samples: Vec::new(),
            evaluations: 0,
            blocks: 0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        // basis draws use their own stream so the poll order does not
        // depend on the direction type
        let mut basis_rng = ChaCha8Rng::seed_from_u64(params.seed);
        basis_rng.set_stream(1);
        let mut mesh = params.initial_mesh.clone();
        let start = Point::new(params.x0.clone());

        run.evaluate(vec![start.clone()])?;

        let status = loop {
            if run.budget_exhausted() {
                break STATUS_BUDGET_EXHAUSTED;
            }
            if mesh.iter().all(|d| *d < params.min_mesh) {
                break STATUS_MESH_CONVERGED;
            }

            let (center, before) = match run.cache.incumbent() {
                Some((point, ranking)) => (point.clone(), Some(ranking)),
                None => (start.clone(), None),
            };

            let mut improved = false;
            if params.model_search {
                if let Some(candidate) = run.model_candidate(&center, &mesh) {
                    debug!(point = ?candidate.coords(), "model search candidate");
                    run.evaluate(vec![candidate])?;
                    improved = run.improved_since(before);
                }
            }
            if !improved {
                let basis = match params.directions {
                    PollDirections::Orthogonal if params.dimension > 1 => {
                        orthogonal_basis(params.dimension, &mut basis_rng)
                    }
                    _ => identity(params.dimension),
                };
                let trial = run.poll(&center, &mesh, &basis, &mut rng);
                run.evaluate(trial)?;
                improved = run.improved_since(before);
            }

            for (d, d0) in mesh.iter_mut().zip(&params.initial_mesh) {
                *d = if improved { (*d * 2.0).min(*d0) } else { *d / 2.0 };
            }
            debug!(
                improved,
                evaluations = run.evaluations,
                mesh = mesh[0],
                "poll finished"
            );
        };

        let record = TerminationRecord::new(true, run.evaluations)
            .with_status(status)
            .with_feasible(run.cache.best_feasible())
            .with_infeasible(run.cache.best_infeasible());

        info!(
            status,
            evaluations = record.eval_count,
            blocks = run.blocks,
            feasible = record.best_feasible.len(),
            "Compass search finished"
        );
        Ok(record)
    }
}

struct SearchRun<'a> {
    params: &'a SearchParameters,
    evaluator: &'a mut dyn BlockEvaluator,
    cache: EvalCache,
    samples: Vec<Sample>,
    evaluations: usize,
    blocks: u64,
}

impl SearchRun<'_> {
    fn remaining(&self) -> Option<usize> {
        self.params
            .max_evaluations
            .map(|max| max.saturating_sub(self.evaluations))
    }

    fn budget_exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }

    fn improved_since(&self, before: Option<Ranking>) -> bool {
        match (self.cache.incumbent(), before) {
            (Some((_, after)), Some(before)) => after.improves_on(&before),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Model proposal snapped to the `Δ²/Δ₀` grid around `center` and
    /// clipped to the bounds. `None` when it is the center or already cached.
    fn model_candidate(&self, center: &Point, mesh: &[f64]) -> Option<Point> {
        let mut coords = model::propose(&self.samples, center.coords(), mesh)?;
        for (j, x) in coords.iter_mut().enumerate() {
            let c = center[j];
            let spacing = mesh[j] * mesh[j] / self.params.initial_mesh[j];
            *x = c + ((*x - c) / spacing).round() * spacing;
        }
        self.params.clip(&mut coords);

        if coords.iter().any(|x| !x.is_finite())
            || coords.as_slice() == center.coords()
            || self.cache.contains(&coords)
        {
            return None;
        }
        Some(Point::new(coords))
    }

    /// Poll set around `center` along `±basis[i]`, in seeded order, without
    /// cached points.
    fn poll(
        &self,
        center: &Point,
        mesh: &[f64],
        basis: &[Vec<f64>],
        rng: &mut ChaCha8Rng,
    ) -> Vec<Point> {
        let mut directions: Vec<(usize, f64)> = (0..self.params.dimension)
            .flat_map(|i| [(i, 1.0), (i, -1.0)])
            .collect();
        directions.shuffle(rng);

        let mut trial: Vec<Point> = Vec::with_capacity(directions.len());
        for (i, sign) in directions {
            let mut coords = center.coords().to_vec();
            for (j, b) in basis[i].iter().enumerate() {
                if *b != 0.0 {
                    coords[j] += sign * b * mesh[j];
                }
            }
            self.params.clip(&mut coords);

            if coords.as_slice() == center.coords()
                || self.cache.contains(&coords)
                || trial.iter().any(|p| p.coords() == coords.as_slice())
            {
                continue;
            }
            trial.push(Point::new(coords));
        }
        trial
    }

    /// Send `points` in blocks, stopping once the budget is spent.
    fn evaluate(&mut self, points: Vec<Point>) -> BridgeResult<()> {
        for chunk in points.chunks(self.params.max_block_size) {
            let take = self
                .remaining()
                .map_or(chunk.len(), |left| left.min(chunk.len()));
            if take == 0 {
                break;
            }

            let block = Block::new(self.blocks, chunk[..take].to_vec());
            self.blocks += 1;

            let outcomes = self.evaluator.eval_block(&block)?;
            if outcomes.len() != block.len() {
                return Err(engine_error!(
                    "block {} returned {} outcomes for {} points",
                    block.sequence,
                    outcomes.len(),
                    block.len()
                ));
            }

            for (point, outcome) in block.iter().zip(&outcomes) {
                let interpretation = self.params.outputs.interpret(outcome);
                if !self.cache.insert(point.clone(), interpretation) {
                    continue;
                }
                if let Some((objective, constraints)) = self.params.outputs.measurements(outcome) {
                    self.samples.push(Sample {
                        coords: point.coords().to_vec(),
                        objective,
                        constraints,
                    });
                }
            }
            self.evaluations += block.len();
        }
        Ok(())
    }
}

fn identity(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

/// Columns of `I - 2vvᵀ` for a random unit `v`, each signed so that its
/// largest entry is positive.
fn orthogonal_basis(n: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let v: Vec<f64> = (0..n).map(|_| rng.random_range(-1.0..1.0)).collect();
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return identity(n);
    }
    let v: Vec<f64> = v.iter().map(|x| x / norm).collect();

    (0..n)
        .map(|i| {
            let mut column: Vec<f64> = (0..n)
                .map(|j| (if i == j { 1.0 } else { 0.0 }) - 2.0 * v[i] * v[j])
                .collect();
            let largest = (0..n).fold(0, |best, j| {
                if column[j].abs() > column[best].abs() {
                    j
                } else {
                    best
                }
            });
            if column[largest] < 0.0 {
                for x in &mut column {
                    *x = -*x;
                }
            }
            column
        })
        .collect()
}
