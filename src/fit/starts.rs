//! Start-point grids for multi-start fitting.
//!
//! Levenberg–Marquardt is local. To make fits insensitive to a poor initial
//! guess we also start from a small deterministic grid over the rate-like
//! parameters (growth rate, damping), keeping the capacity at its seed.
//! Same inputs always produce the same grid, so fits stay reproducible.

use crate::domain::ParamBounds;
use crate::error::AppError;
use crate::models::GrowthModel;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::config(format!(
            "Invalid log range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::config("Log grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Spread `steps` points over `[lo, hi]`: log-spaced when possible, linear when
/// the interval touches zero, a single midpoint for one step or a degenerate
/// interval.
fn spread(lo: f64, hi: f64, steps: usize) -> Vec<f64> {
    if steps == 0 {
        return Vec::new();
    }
    if steps == 1 || hi <= lo {
        let mid = if lo > 0.0 { (lo * hi).sqrt() } else { 0.5 * (lo + hi) };
        return vec![mid];
    }
    match log_space(lo, hi, steps) {
        Ok(v) => v,
        Err(_) => (0..steps)
            .map(|i| lo + (hi - lo) * i as f64 / (steps as f64 - 1.0))
            .collect(),
    }
}

/// All start points for `model`: `guess` first, then the grid.
///
/// Grid points copy the guess and overwrite the growth rate (and damping for the
/// attractor model), so the capacity seed is shared by every start.
pub fn start_points(
    model: &GrowthModel,
    guess: &[f64],
    bounds: &ParamBounds,
    steps: usize,
) -> Vec<Vec<f64>> {
    let mut out = vec![guess.to_vec()];
    let growth = spread(bounds.lower[0], bounds.upper[0], steps);

    match model {
        GrowthModel::Attractor { .. } => {
            let damping = spread(bounds.lower[1], bounds.upper[1], steps);
            for &r in &growth {
                for &d in &damping {
                    let mut p = guess.to_vec();
                    p[0] = r;
                    p[1] = d;
                    out.push(p);
                }
            }
        }
        GrowthModel::Baseline(_) => {
            for &r in &growth {
                let mut p = guess.to_vec();
                p[0] = r;
                out.push(p);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BaselineForm;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.01, 10.0, 4).unwrap();
        assert!((v[0] - 0.01).abs() < 1e-15);
        assert!((v[3] - 10.0).abs() < 1e-12);
        assert!((v[1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn log_space_rejects_bad_range() {
        assert_eq!(log_space(0.0, 1.0, 3).unwrap_err().exit_code(), 2);
        assert!(log_space(1.0, 2.0, 1).is_err());
    }

    #[test]
    fn attractor_grid_is_guess_plus_square() {
        let model = GrowthModel::Attractor { target: 0.85, max_step: 0.05 };
        let bounds = ParamBounds::new(vec![0.01, 0.01, 90.0], vec![2.0, 10.0, 200.0]);
        let starts = start_points(&model, &[0.5, 1.0, 110.0], &bounds, 3);
        assert_eq!(starts.len(), 10);
        assert_eq!(starts[0], vec![0.5, 1.0, 110.0]);
        assert!(starts.iter().all(|p| p[2] == 110.0));
    }

    #[test]
    fn zero_steps_keeps_only_the_guess() {
        let model = GrowthModel::Baseline(BaselineForm::Logistic);
        let bounds = ParamBounds::new(vec![0.01, 9.0], vec![2.0, 20.0]);
        assert_eq!(start_points(&model, &[0.3, 11.0], &bounds, 0).len(), 1);
        assert_eq!(start_points(&model, &[0.3, 11.0], &bounds, 4).len(), 5);
    }

    #[test]
    fn spread_handles_zero_lower_bound() {
        let v = spread(0.0, 1.0, 3);
        assert_eq!(v, vec![0.0, 0.5, 1.0]);
    }
}
