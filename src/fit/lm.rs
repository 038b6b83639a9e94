//! Box-bounded Levenberg–Marquardt.
//!
//! Minimizes `Σ rᵢ(p)²` for a residual function `r(p)` with `p` confined to a
//! box. Each iteration:
//!
//! 1. forward-difference Jacobian `J` (steps stay inside the box, pinned
//!    parameters get a zero column)
//! 2. solve `[J; √λ·D] δ = [−r; 0]` with `D = diag(‖J_col‖)` (Marquardt scaling)
//! 3. project `p + δ` onto the box; accept if the cost drops, otherwise raise λ
//!
//! Convergence is declared when the relative cost reduction or the relative
//! step size falls below tolerance, or when no damping level produces a
//! descent (a stationary point of the constrained problem). Running out of the
//! iteration budget is reported as *not* converged.

use nalgebra::{DMatrix, DVector};

use crate::domain::ParamBounds;
use crate::math::solve_least_squares;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
const LAMBDA_FACTOR: f64 = 10.0;

/// Stopping rules for a single optimizer run.
#[derive(Debug, Clone, Copy)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Relative cost reduction below which an accepted step ends the run.
    pub ftol: f64,
    /// Relative step size below which an accepted step ends the run.
    pub xtol: f64,
}

impl LmOptions {
    pub fn with_budget(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ftol: 1e-12,
            xtol: 1e-10,
        }
    }
}

/// Result of one optimizer run.
#[derive(Debug, Clone, PartialEq)]
pub struct LmOutcome {
    pub params: Vec<f64>,
    /// Final sum of squared residuals (`+∞` if the start was not evaluable).
    pub sse: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Minimize the squared norm of `residuals` starting from `start`.
///
/// `residuals` returns `None` when the model cannot be evaluated at a point
/// (non-finite prediction); such points are treated as infinitely bad.
pub fn levenberg_marquardt<F>(
    residuals: F,
    start: &[f64],
    bounds: &ParamBounds,
    opts: &LmOptions,
) -> LmOutcome
where
    F: Fn(&[f64]) -> Option<Vec<f64>>,
{
    let mut p = start.to_vec();
    bounds.clamp(&mut p);

    let Some(mut r) = residuals(&p) else {
        return LmOutcome {
            params: p,
            sse: f64::INFINITY,
            iterations: 0,
            converged: false,
        };
    };
    let mut cost = sum_sq(&r);
    let mut lambda = LAMBDA_INIT;
    let k = p.len();
    let n = r.len();

    for iter in 1..=opts.max_iterations {
        if cost == 0.0 {
            return done(p, cost, iter - 1, true);
        }

        let Some(jac) = jacobian(&residuals, &p, &r, bounds) else {
            return done(p, cost, iter, false);
        };
        let scale: Vec<f64> = (0..k)
            .map(|j| jac.column(j).norm().max(1e-12))
            .collect();

        // Inner loop: raise λ until a step reduces the cost.
        loop {
            let mut a = DMatrix::<f64>::zeros(n + k, k);
            let mut b = DVector::<f64>::zeros(n + k);
            a.view_mut((0, 0), (n, k)).copy_from(&jac);
            for i in 0..n {
                b[i] = -r[i];
            }
            let sqrt_lambda = lambda.sqrt();
            for j in 0..k {
                a[(n + j, j)] = sqrt_lambda * scale[j];
            }

            let trial = solve_least_squares(&a, &b).map(|delta| {
                let mut q: Vec<f64> = p.iter().zip(delta.iter()).map(|(pi, di)| pi + di).collect();
                bounds.clamp(&mut q);
                q
            });

            let improved = trial.and_then(|q| {
                let rq = residuals(&q)?;
                let cq = sum_sq(&rq);
                (cq < cost).then_some((q, rq, cq))
            });

            match improved {
                Some((q, rq, cq)) => {
                    let reduction = (cost - cq) / cost;
                    let step = norm_diff(&q, &p);
                    let size = norm(&p);

                    p = q;
                    r = rq;
                    cost = cq;
                    lambda = (lambda / LAMBDA_FACTOR).max(LAMBDA_MIN);

                    if reduction <= opts.ftol || step <= opts.xtol * (size + opts.xtol) {
                        return done(p, cost, iter, true);
                    }
                    break;
                }
                None => {
                    lambda *= LAMBDA_FACTOR;
                    if lambda > LAMBDA_MAX {
                        // No descent direction left: stationary within the box.
                        return done(p, cost, iter, true);
                    }
                }
            }
        }
    }

    done(p, cost, opts.max_iterations, false)
}

fn done(params: Vec<f64>, sse: f64, iterations: usize, converged: bool) -> LmOutcome {
    LmOutcome {
        params,
        sse,
        iterations,
        converged,
    }
}

fn jacobian<F>(residuals: &F, p: &[f64], r: &[f64], bounds: &ParamBounds) -> Option<DMatrix<f64>>
where
    F: Fn(&[f64]) -> Option<Vec<f64>>,
{
    let n = r.len();
    let k = p.len();
    let eps = f64::EPSILON.sqrt();
    let mut jac = DMatrix::<f64>::zeros(n, k);

    for j in 0..k {
        let (lo, hi) = (bounds.lower[j], bounds.upper[j]);
        // A pinned parameter has no room to move: its column stays zero.
        if hi <= lo {
            continue;
        }
        let mut step = eps * p[j].abs().max(1e-3);
        if p[j] + step > hi {
            step = -step;
        }
        let mut q = p.to_vec();
        q[j] = (p[j] + step).clamp(lo, hi);
        let h = q[j] - p[j];
        if h == 0.0 {
            continue;
        }
        let rq = residuals(&q)?;
        for i in 0..n {
            jac[(i, j)] = (rq[i] - r[i]) / h;
        }
    }

    Some(jac)
}

fn sum_sq(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

fn norm(v: &[f64]) -> f64 {
    sum_sq(v).sqrt()
}

fn norm_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
