//! Convergence classification.
//!
//! A fit "converges" when its final utilization lands inside the closed band
//! `[target - tolerance, target + tolerance]`.

use crate::domain::{ConvergenceCriteria, FitResult};

/// Absorbs representation error at the band edges, e.g. `0.85 + 0.02` vs `0.87`.
const BAND_SLACK: f64 = 1e-12;

/// Classify a fit under `criteria`. Failed fits never converge.
pub fn classify(fit: &FitResult, criteria: &ConvergenceCriteria) -> bool {
    fit.fit_succeeded && classify_utilization(fit.final_utilization, criteria)
}

/// Band test on a raw utilization value (`false` for NaN).
pub fn classify_utilization(utilization: f64, criteria: &ConvergenceCriteria) -> bool {
    let lo = criteria.target - criteria.tolerance - BAND_SLACK;
    let hi = criteria.target + criteria.tolerance + BAND_SLACK;
    utilization >= lo && utilization <= hi
}

/// Signed distance of the final utilization from the target (`None` for failed fits).
pub fn distance_from_target(fit: &FitResult, criteria: &ConvergenceCriteria) -> Option<f64> {
    fit.fit_succeeded
        .then(|| fit.final_utilization - criteria.target)
        .filter(|d| d.is_finite())
}

/// Number of predicted points whose utilization stays within half the tolerance.
pub fn count_stable_points(predicted: &[f64], capacity: f64, criteria: &ConvergenceCriteria) -> usize {
    let half = 0.5 * criteria.tolerance;
    predicted
        .iter()
        .filter(|&&p| ((p / capacity) - criteria.target).abs() < half)
        .count()
}
