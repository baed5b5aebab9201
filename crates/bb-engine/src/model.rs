//! Quadratic model search.
//!
//! Before each poll the engine fits least-squares quadratic models of the
//! objective and of every constraint to the cached evaluations around the
//! poll center, then proposes the point that minimizes the objective model
//! subject to the constraint models. Everything works in coordinates scaled
//! by the trust-region radius, so the region is the unit box.

use nalgebra::{linalg::Cholesky, DMatrix, DVector};

/// Trust-region radius in mesh sizes.
const RADIUS_FACTOR: f64 = 2.0;
/// Constraint models are made pessimistic by their worst fit residual plus
/// this fraction of their gradient norm.
const FEASIBILITY_MARGIN: f64 = 1e-3;
const PIVOT_TOLERANCE: f64 = 1e-13;
const NEWTON_ITERATIONS: usize = 50;
const RESTORATION_STEPS: usize = 5;

/// One usable evaluation kept for model fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub coords: Vec<f64>,
    pub objective: f64,
    pub constraints: Vec<f64>,
}

/// `constant + gradientᵀs + ½ sᵀ hessian s`.
#[derive(Debug, Clone)]
struct Quadratic {
    constant: f64,
    gradient: DVector<f64>,
    hessian: DMatrix<f64>,
}

impl Quadratic {
    /// Least-squares fit on the rows of `design` (see [`features`]).
    fn fit(dimension: usize, design: &DMatrix<f64>, values: &DVector<f64>) -> Option<Self> {
        let beta = solve(design.tr_mul(design), &design.tr_mul(values))?;
        Some(Self::from_coefficients(dimension, &beta))
    }

    fn from_coefficients(dimension: usize, beta: &DVector<f64>) -> Self {
        let mut hessian = DMatrix::zeros(dimension, dimension);
        let mut k = dimension + 1;
        for i in 0..dimension {
            hessian[(i, i)] = beta[k];
            k += 1;
        }
        for i in 0..dimension {
            for j in i + 1..dimension {
                hessian[(i, j)] = beta[k];
                hessian[(j, i)] = beta[k];
                k += 1;
            }
        }
        Self {
            constant: beta[0],
            gradient: beta.rows(1, dimension).into_owned(),
            hessian,
        }
    }

    fn value(&self, s: &DVector<f64>) -> f64 {
        self.constant + self.gradient.dot(s) + 0.5 * s.dot(&(&self.hessian * s))
    }

    fn gradient_at(&self, s: &DVector<f64>) -> DVector<f64> {
        &self.gradient + &self.hessian * s
    }
}

/// Quadratic basis: `1`, `sᵢ`, `½ sᵢ²`, then `sᵢ sⱼ` for `i < j`.
fn features(s: &[f64]) -> Vec<f64> {
    let n = s.len();
    let mut row = Vec::with_capacity((n + 1) * (n + 2) / 2);
    row.push(1.0);
    row.extend_from_slice(s);
    row.extend(s.iter().map(|v| 0.5 * v * v));
    for i in 0..n {
        for j in i + 1..n {
            row.push(s[i] * s[j]);
        }
    }
    row
}

/// LU solve that also gives up on nearly singular systems.
fn solve(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let scale = match a.amax() {
        m if m > 0.0 => m,
        _ => 1.0,
    };
    let lu = a.lu();
    if lu.u().diagonal().iter().any(|p| p.abs() <= PIVOT_TOLERANCE * scale) {
        return None;
    }
    lu.solve(b)
}

/// Newton's method on the optimality conditions of
/// `min objective(s)` subject to `constraint(s) = 0`, from the center.
/// Only a nonnegative multiplier is accepted.
fn stationary_on_boundary(objective: &Quadratic, constraint: &Quadratic) -> Option<DVector<f64>> {
    let n = objective.gradient.len();
    let norm2 = constraint.gradient.norm_squared();
    if norm2 == 0.0 {
        return None;
    }
    let mut s = DVector::zeros(n);
    let mut lambda = (-objective.gradient.dot(&constraint.gradient) / norm2).max(0.0);

    for _ in 0..NEWTON_ITERATIONS {
        let gf = objective.gradient_at(&s);
        let gc = constraint.gradient_at(&s);

        let jacobian = DMatrix::from_fn(n + 1, n + 1, |i, j| match (i < n, j < n) {
            (true, true) => objective.hessian[(i, j)] + lambda * constraint.hessian[(i, j)],
            (true, false) => gc[i],
            (false, true) => gc[j],
            (false, false) => 0.0,
        });
        let rhs = DVector::from_fn(n + 1, |i, _| {
            if i < n {
                -(gf[i] + lambda * gc[i])
            } else {
                -constraint.value(&s)
            }
        });

        let step = solve(jacobian, &rhs)?;
        s += step.rows(0, n);
        lambda += step[n];

        let size = s.amax();
        if step.amax() <= 1e-12 * (1.0 + size) {
            return (lambda >= 0.0).then_some(s);
        }
        if size > 1e6 {
            return None;
        }
    }
    None
}

/// Pull a step back into the unit box. A step that followed a constraint
/// boundary is projected back onto it afterwards.
fn into_trust_region(s: DVector<f64>, boundary: Option<&Quadratic>) -> Option<DVector<f64>> {
    let size = s.amax();
    if size <= 1.0 {
        return Some(s);
    }
    let mut s = s / size;

    if let Some(constraint) = boundary {
        for _ in 0..RESTORATION_STEPS {
            let g = constraint.gradient_at(&s);
            let norm2 = g.norm_squared();
            if norm2 == 0.0 {
                break;
            }
            let c = constraint.value(&s);
            s -= g * (c / norm2);
        }
        if constraint.value(&s).abs() > 1e-9 || s.amax() > 2.0 {
            return None;
        }
    }
    Some(s)
}

/// Propose a trial point from the samples near `center`, or `None` when the
/// samples cannot support a model or the model predicts no decrease.
///
/// The trust region spans twice the mesh size along every coordinate.
pub fn propose(samples: &[Sample], center: &[f64], mesh: &[f64]) -> Option<Vec<f64>> {
    let n = center.len();
    let radius: Vec<f64> = mesh.iter().map(|m| RADIUS_FACTOR * m).collect();
    let scaled = |coords: &[f64]| -> Vec<f64> {
        coords
            .iter()
            .zip(center)
            .zip(&radius)
            .map(|((x, c), r)| (x - c) / r)
            .collect()
    };

    let near: Vec<&Sample> = samples
        .iter()
        .filter(|s| scaled(s.coords.as_slice()).iter().all(|v| v.abs() <= 1.0))
        .collect();
    if near.len() < (n + 1) * (n + 2) / 2 {
        return None;
    }

    let rows: Vec<DVector<f64>> = near
        .iter()
        .map(|s| DVector::from_vec(scaled(s.coords.as_slice())))
        .collect();
    let width = (n + 1) * (n + 2) / 2;
    let basis: Vec<Vec<f64>> = rows.iter().map(|s| features(s.as_slice())).collect();
    let design = DMatrix::from_fn(near.len(), width, |r, c| basis[r][c]);

    let objectives = DVector::from_iterator(near.len(), near.iter().map(|s| s.objective));
    let objective = Quadratic::fit(n, &design, &objectives)?;

    let constraint_count = near[0].constraints.len();
    let mut constraints = Vec::with_capacity(constraint_count);
    for k in 0..constraint_count {
        let values: Vec<f64> = near
            .iter()
            .map(|s| s.constraints.get(k).copied())
            .collect::<Option<_>>()?;
        let values = DVector::from_vec(values);
        let mut model = Quadratic::fit(n, &design, &values)?;
        let residual = rows
            .iter()
            .zip(values.iter())
            .fold(0.0, |m: f64, (s, v)| m.max((model.value(s) - v).abs()));
        model.constant += FEASIBILITY_MARGIN * model.gradient.norm() + residual;
        constraints.push(model);
    }

    let mut steps: Vec<(DVector<f64>, Option<usize>)> = Vec::new();
    if Cholesky::new(objective.hessian.clone()).is_some() {
        if let Some(s) = solve(objective.hessian.clone(), &(-&objective.gradient)) {
            steps.push((s, None));
        }
    }
    for (k, constraint) in constraints.iter().enumerate() {
        if let Some(s) = stationary_on_boundary(&objective, constraint) {
            steps.push((s, Some(k)));
        }
    }

    let mut best: Option<(f64, DVector<f64>)> = None;
    for (step, active) in steps {
        let Some(step) = into_trust_region(step, active.map(|k| &constraints[k])) else {
            continue;
        };
        let violates = constraints
            .iter()
            .enumerate()
            .any(|(k, c)| Some(k) != active && c.value(&step) > 0.0);
        if violates {
            continue;
        }
        let predicted = objective.value(&step);
        if predicted < objective.constant && best.as_ref().map_or(true, |(v, _)| predicted < *v) {
            best = Some((predicted, step));
        }
    }

    best.map(|(_, step)| {
        step.iter()
            .zip(center)
            .zip(&radius)
            .map(|((s, c), r)| c + s * r)
            .collect()
    })
}
