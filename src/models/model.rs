//! Model evaluation for the attractor and baseline families.
//!
//! The fitter relies on a handful of primitive operations per model:
//! - predict `P(t)` on the sample's time grid given free parameters
//! - data-derived default bounds and initial guess
//! - parameter names (for the result map) and the capacity slot
//!
//! Every model starts from the first observation, `P0 = max(values[0], 1e-6)`
//! at `t0 = times[0]`, so only rate/shape/scale parameters are free.

use std::collections::BTreeMap;

use crate::domain::{BaselineForm, FitConfig, GrowthSample, ModelKind, ParamBounds};
use crate::models::integrate_rk4;

/// Floor for the initial value so logistic/Gompertz ratios stay finite.
pub const MIN_INITIAL_VALUE: f64 = 1e-6;

const GROWTH_RATE_RANGE: (f64, f64) = (0.01, 2.0);
const DAMPING_RANGE: (f64, f64) = (0.01, 10.0);
const CAPACITY_RANGE: (f64, f64) = (0.9, 2.0);
const CAPACITY_SEED: f64 = 1.1;
const GROWTH_RATE_SEED: f64 = 0.5;
const DAMPING_SEED: f64 = 1.0;

const ATTRACTOR_PARAMS: [&str; 3] = ["growth_rate", "damping", "capacity"];
const BASELINE_PARAMS: [&str; 2] = ["growth_rate", "capacity"];

/// A concrete growth equation with its fixed settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrowthModel {
    /// `dP/dt = r·P·(1 − u/T) − d·P·(u − T)·|u − T|`, `u = P/K`.
    ///
    /// Free: `r` (growth rate), `d` (damping), `K` (capacity). `T` is fixed.
    Attractor { target: f64, max_step: f64 },
    /// Saturating growth without a target term. Free: `r`, `K`.
    Baseline(BaselineForm),
}

impl GrowthModel {
    /// Build the model for `kind` from run configuration.
    pub fn for_kind(kind: ModelKind, config: &FitConfig) -> Self {
        match kind {
            ModelKind::Attractor => GrowthModel::Attractor {
                target: config.criteria.target,
                max_step: config.ode_max_step,
            },
            ModelKind::Baseline => GrowthModel::Baseline(config.baseline),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            GrowthModel::Attractor { .. } => ModelKind::Attractor,
            GrowthModel::Baseline(_) => ModelKind::Baseline,
        }
    }

    /// Names of the free parameters, in vector order.
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            GrowthModel::Attractor { .. } => &ATTRACTOR_PARAMS,
            GrowthModel::Baseline(_) => &BASELINE_PARAMS,
        }
    }

    pub fn param_count(&self) -> usize {
        self.param_names().len()
    }

    /// Index of the carrying capacity in the parameter vector.
    pub fn capacity_index(&self) -> usize {
        self.param_count() - 1
    }

    /// Predict values at `times` starting from `initial` at `times[0]`.
    ///
    /// # Panics
    /// Panics if `params` is shorter than `param_count()`.
    pub fn predict(&self, times: &[f64], initial: f64, params: &[f64]) -> Vec<f64> {
        let Some(&t0) = times.first() else {
            return Vec::new();
        };

        match *self {
            GrowthModel::Attractor { target, max_step } => {
                let (r, d, k) = (params[0], params[1], params[2]);
                integrate_rk4(|p| attractor_rate(p, r, d, k, target), times, initial, max_step)
            }
            GrowthModel::Baseline(BaselineForm::Logistic) => {
                let (r, k) = (params[0], params[1]);
                times.iter().map(|&t| logistic(t - t0, r, k, initial)).collect()
            }
            GrowthModel::Baseline(BaselineForm::Gompertz) => {
                let (r, k) = (params[0], params[1]);
                times.iter().map(|&t| gompertz(t - t0, r, k, initial)).collect()
            }
        }
    }

    /// Default bounds derived from the observed range.
    pub fn default_bounds(&self, sample: &GrowthSample) -> ParamBounds {
        let max = sample.max_value().max(MIN_INITIAL_VALUE);
        let cap = (CAPACITY_RANGE.0 * max, CAPACITY_RANGE.1 * max);
        match self {
            GrowthModel::Attractor { .. } => ParamBounds::new(
                vec![GROWTH_RATE_RANGE.0, DAMPING_RANGE.0, cap.0],
                vec![GROWTH_RATE_RANGE.1, DAMPING_RANGE.1, cap.1],
            ),
            GrowthModel::Baseline(_) => ParamBounds::new(
                vec![GROWTH_RATE_RANGE.0, cap.0],
                vec![GROWTH_RATE_RANGE.1, cap.1],
            ),
        }
    }

    /// Heuristic starting point, clamped into `bounds`.
    ///
    /// - capacity: `1.1 × max(values)`
    /// - growth rate: steepest positive log-slope between consecutive points
    /// - damping: 1.0
    pub fn initial_guess(&self, sample: &GrowthSample, bounds: &ParamBounds) -> Vec<f64> {
        let capacity = CAPACITY_SEED * sample.max_value().max(MIN_INITIAL_VALUE);
        let growth = steepest_log_slope(sample).unwrap_or(GROWTH_RATE_SEED);

        let mut guess = match self {
            GrowthModel::Attractor { .. } => vec![growth, DAMPING_SEED, capacity],
            GrowthModel::Baseline(_) => vec![growth, capacity],
        };
        bounds.clamp(&mut guess);
        guess
    }

    /// Name → value map for a fitted parameter vector, including fixed settings.
    pub fn parameter_map(&self, params: &[f64], initial: f64) -> BTreeMap<String, f64> {
        let mut map: BTreeMap<String, f64> = self
            .param_names()
            .iter()
            .zip(params.iter())
            .map(|(name, &v)| (name.to_string(), v))
            .collect();
        match self {
            GrowthModel::Attractor { target, .. } => {
                map.insert("target".to_string(), *target);
            }
            GrowthModel::Baseline(_) => {
                map.insert("initial_value".to_string(), initial);
            }
        }
        map
    }
}

/// Initial value used by every model for `sample`.
pub fn initial_value(sample: &GrowthSample) -> f64 {
    sample
        .values
        .first()
        .copied()
        .unwrap_or(0.0)
        .max(MIN_INITIAL_VALUE)
}

/// Right-hand side of the attractor ODE.
pub fn attractor_rate(p: f64, r: f64, d: f64, k: f64, target: f64) -> f64 {
    let u = p / k;
    let gap = u - target;
    r * p * (1.0 - u / target) - d * p * gap * gap.abs()
}

fn logistic(t: f64, r: f64, k: f64, p0: f64) -> f64 {
    k / (1.0 + (k / p0 - 1.0) * (-r * t).exp())
}

fn gompertz(t: f64, r: f64, k: f64, p0: f64) -> f64 {
    k * ((p0 / k).ln() * (-r * t).exp()).exp()
}

fn steepest_log_slope(sample: &GrowthSample) -> Option<f64> {
    let mut best: Option<f64> = None;
    for (tw, vw) in sample.times.windows(2).zip(sample.values.windows(2)) {
        let dt = tw[1] - tw[0];
        if dt <= 0.0 || vw[0] <= 0.0 || vw[1] <= 0.0 {
            continue;
        }
        let slope = (vw[1] / vw[0]).ln() / dt;
        if slope.is_finite() && slope > 0.0 && best.is_none_or(|b| slope > b) {
            best = Some(slope);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize, dt: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * dt).collect()
    }

    #[test]
    fn attractor_settles_on_target_share_of_capacity() {
        let model = GrowthModel::Attractor { target: 0.85, max_step: 0.05 };
        let times = grid(81, 1.0);
        let ys = model.predict(&times, 5.0, &[0.2, 0.5, 100.0]);
        let last = *ys.last().unwrap();
        assert!((last / 100.0 - 0.85).abs() < 1e-4, "u_final={}", last / 100.0);
        // Growth is monotone from below.
        for w in ys.windows(2) {
            assert!(w[1] >= w[0] - 1e-12);
        }
    }

    #[test]
    fn attractor_rate_vanishes_at_target() {
        assert_eq!(attractor_rate(85.0, 0.3, 2.0, 100.0, 0.85), 0.0);
        assert!(attractor_rate(95.0, 0.3, 2.0, 100.0, 0.85) < 0.0);
        assert!(attractor_rate(50.0, 0.3, 2.0, 100.0, 0.85) > 0.0);
    }

    #[test]
    fn logistic_and_gompertz_hit_endpoints() {
        let times = [2.0, 2.0 + 1e-9, 500.0];
        for form in [BaselineForm::Logistic, BaselineForm::Gompertz] {
            let ys = GrowthModel::Baseline(form).predict(&times, 1.0, &[0.5, 10.0]);
            assert!((ys[0] - 1.0).abs() < 1e-12, "{form:?} starts at P0");
            assert!((ys[2] - 10.0).abs() < 1e-9, "{form:?} saturates at K");
        }
    }

    #[test]
    fn default_bounds_follow_data_range() {
        let s = GrowthSample::new("s", grid(6, 1.0), vec![1.0, 2.0, 4.0, 8.0, 9.0, 10.0]);
        let b = GrowthModel::Attractor { target: 0.85, max_step: 0.05 }.default_bounds(&s);
        assert_eq!(b.lower, vec![0.01, 0.01, 9.0]);
        assert_eq!(b.upper, vec![2.0, 10.0, 20.0]);

        let guess = GrowthModel::Baseline(BaselineForm::Logistic).initial_guess(&s, &b_baseline(&s));
        assert!((guess[0] - 2.0_f64.ln()).abs() < 1e-12);
        assert!((guess[1] - 11.0).abs() < 1e-12);
    }

    fn b_baseline(s: &GrowthSample) -> ParamBounds {
        GrowthModel::Baseline(BaselineForm::Logistic).default_bounds(s)
    }

    #[test]
    fn parameter_map_names_free_and_fixed_params() {
        let model = GrowthModel::Attractor { target: 0.85, max_step: 0.05 };
        let map = model.parameter_map(&[0.2, 0.5, 100.0], 5.0);
        assert_eq!(map.get("target"), Some(&0.85));
        let free: Vec<f64> = model.param_names().iter().map(|n| map[*n]).collect();
        assert_eq!(free, vec![0.2, 0.5, 100.0]);
        assert_eq!(map.len(), 4);
    }
}
