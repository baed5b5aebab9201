//! Engine settings read from the verbatim parameter lines.

use tracing::debug;

use bb_types::{invalid_config, BridgeResult, Parameters};

use crate::output::OutputLayout;

const DEFAULT_MIN_MESH_SIZE: f64 = 1e-9;
const KNOWN_KEYS: &[&str] = &[
    "DIMENSION",
    "X0",
    "LOWER_BOUND",
    "UPPER_BOUND",
    "BB_OUTPUT_TYPE",
    "BB_MAX_BLOCK_SIZE",
    "MAX_BB_EVAL",
    "SEED",
    "INITIAL_MESH_SIZE",
    "MIN_MESH_SIZE",
    "DIRECTION_TYPE",
    "QUAD_MODEL_SEARCH",
];

/// Poll directions around the incumbent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollDirections {
    /// `±eᵢ` along every coordinate axis.
    #[default]
    Coordinate,
    /// `±bᵢ` for a fresh seeded orthonormal basis each poll (`ORTHO 2N`).
    Orthogonal,
}

impl PollDirections {
    pub fn parse(value: &str) -> BridgeResult<Self> {
        let words: Vec<String> = value
            .split_whitespace()
            .map(|w| w.to_ascii_uppercase())
            .collect();
        match words.join(" ").as_str() {
            "COORDINATE" => Ok(PollDirections::Coordinate),
            "ORTHO 2N" => Ok(PollDirections::Orthogonal),
            other => Err(invalid_config!("unsupported DIRECTION_TYPE: {other}")),
        }
    }
}

/// Settings for one compass-search run.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParameters {
    pub dimension: usize,
    pub x0: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub outputs: OutputLayout,
    pub max_block_size: usize,
    pub max_evaluations: Option<usize>,
    pub seed: u64,
    pub initial_mesh: Vec<f64>,
    pub min_mesh: f64,
    pub directions: PollDirections,
    pub model_search: bool,
}

impl SearchParameters {
    pub fn parse(parameters: &Parameters) -> BridgeResult<Self> {
        let dimension = parameters.dimension()?;

        let x0 = match parameters.value_of("X0") {
            Some(value) => parse_vector("X0", value, dimension)?,
            None => return Err(invalid_config!("missing X0 parameter")),
        };
        let lower = match parameters.value_of("LOWER_BOUND") {
            Some(value) => parse_vector("LOWER_BOUND", value, dimension)?,
            None => vec![f64::NEG_INFINITY; dimension],
        };
        let upper = match parameters.value_of("UPPER_BOUND") {
            Some(value) => parse_vector("UPPER_BOUND", value, dimension)?,
            None => vec![f64::INFINITY; dimension],
        };

        for i in 0..dimension {
            if lower[i] > upper[i] {
                return Err(invalid_config!(
                    "LOWER_BOUND exceeds UPPER_BOUND at coordinate {i}"
                ));
            }
            if !x0[i].is_finite() || x0[i] < lower[i] || x0[i] > upper[i] {
                return Err(invalid_config!("X0 coordinate {i} is outside the bounds"));
            }
        }

        let outputs = match parameters.value_of("BB_OUTPUT_TYPE") {
            Some(value) => OutputLayout::parse(value)?,
            None => OutputLayout::default(),
        };

        let max_block_size = match parameters.value_of("BB_MAX_BLOCK_SIZE") {
            Some(value) => parse_positive("BB_MAX_BLOCK_SIZE", value)?,
            None => 1,
        };
        let max_evaluations = parameters
            .value_of("MAX_BB_EVAL")
            .map(|value| parse_positive("MAX_BB_EVAL", value))
            .transpose()?;
        let seed = match parameters.value_of("SEED") {
            Some(value) => value
                .parse()
                .map_err(|_| invalid_config!("SEED is not an unsigned integer: {value:?}"))?,
            None => 0,
        };

        let initial_mesh = match parameters.value_of("INITIAL_MESH_SIZE") {
            Some(value) => parse_vector("INITIAL_MESH_SIZE", value, dimension)?,
            None => default_mesh(&lower, &upper),
        };
        if initial_mesh.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(invalid_config!("INITIAL_MESH_SIZE must be positive and finite"));
        }

        let min_mesh = match parameters.value_of("MIN_MESH_SIZE") {
            Some(value) => value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(|| invalid_config!("MIN_MESH_SIZE must be positive: {value:?}"))?,
            None => DEFAULT_MIN_MESH_SIZE,
        };

        let directions = match parameters.value_of("DIRECTION_TYPE") {
            Some(value) => PollDirections::parse(value)?,
            None => PollDirections::default(),
        };
        let model_search = match parameters.value_of("QUAD_MODEL_SEARCH") {
            Some(value) => parse_flag("QUAD_MODEL_SEARCH", value)?,
            None => true,
        };

        for line in parameters.lines() {
            let key = line.split_whitespace().next().unwrap_or("");
            if !key.is_empty() && !KNOWN_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                debug!(key, "ignoring unsupported parameter");
            }
        }

        Ok(Self {
            dimension,
            x0,
            lower,
            upper,
            outputs,
            max_block_size,
            max_evaluations,
            seed,
            initial_mesh,
            min_mesh,
            directions,
            model_search,
        })
    }

    /// Project `coords` onto the bounds.
    pub fn clip(&self, coords: &mut [f64]) {
        for (i, c) in coords.iter_mut().enumerate() {
            *c = c.clamp(self.lower[i], self.upper[i]);
        }
    }
}

/// A tenth of the bounded range per coordinate, 1.0 where unbounded.
fn default_mesh(lower: &[f64], upper: &[f64]) -> Vec<f64> {
    lower
        .iter()
        .zip(upper)
        .map(|(lb, ub)| {
            let range = ub - lb;
            if range.is_finite() && range > 0.0 {
                range / 10.0
            } else {
                1.0
            }
        })
        .collect()
}

fn parse_positive(key: &str, value: &str) -> BridgeResult<usize> {
    match value.parse::<usize>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(invalid_config!("{key} must be a positive integer: {value:?}")),
    }
}

fn parse_flag(key: &str, value: &str) -> BridgeResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(invalid_config!("{key} must be yes or no: {value:?}")),
    }
}

/// Parse `( a b c )`, `a b c`, or `* a` (same value everywhere).
///
/// `-` leaves a coordinate unbounded, which only makes sense for bounds.
fn parse_vector(key: &str, value: &str, dimension: usize) -> BridgeResult<Vec<f64>> {
    let inner = value.trim();
    let inner = inner
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .unwrap_or(inner);
    let tokens: Vec<&str> = inner.split_whitespace().collect();

    let parse_one = |token: &str| -> BridgeResult<f64> {
        match token {
            "-" if key == "LOWER_BOUND" => Ok(f64::NEG_INFINITY),
            "-" if key == "UPPER_BOUND" => Ok(f64::INFINITY),
            _ => token
                .parse::<f64>()
                .ok()
                .filter(|v| !v.is_nan())
                .ok_or_else(|| invalid_config!("{key} has a non-numeric entry: {token:?}")),
        }
    };

    if let ["*", single] = tokens.as_slice() {
        return Ok(vec![parse_one(*single)?; dimension]);
    }
    if tokens.len() != dimension {
        return Err(invalid_config!(
            "{key} has {} entries, expected {dimension}",
            tokens.len()
        ));
    }
    tokens.into_iter().map(parse_one).collect()
}
