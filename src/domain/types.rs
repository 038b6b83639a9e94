//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - read from / exported to JSON
//! - compared across runs (fits are deterministic)

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, InputError};

/// Default target utilization ratio.
pub const DEFAULT_TARGET: f64 = 0.85;
/// Default half-width of the convergence band around the target.
pub const DEFAULT_TOLERANCE: f64 = 0.02;
/// Minimum sample length for a stable fit with three free parameters.
pub const DEFAULT_MIN_POINTS: usize = 6;
/// Optimizer iteration budget per start.
pub const DEFAULT_MAX_ITERATIONS: usize = 200;
/// Largest RK4 step (in sample time units) used by the attractor model.
pub const DEFAULT_ODE_MAX_STEP: f64 = 0.05;
/// Grid points per dimension for deterministic multi-start.
pub const DEFAULT_START_STEPS: usize = 3;

/// One experimental observation unit: a time series of a measured quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthSample {
    pub id: String,
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl GrowthSample {
    pub fn new(id: impl Into<String>, times: Vec<f64>, values: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            times,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Largest observed value (0 for an empty sample).
    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Check the structural invariants required before fitting.
    pub fn validate(&self, min_points: usize) -> Result<(), InputError> {
        if self.times.len() != self.values.len() {
            return Err(InputError::LengthMismatch {
                times: self.times.len(),
                values: self.values.len(),
            });
        }
        if self.times.len() < min_points {
            return Err(InputError::TooFewPoints {
                found: self.times.len(),
                required: min_points,
            });
        }
        for (index, &value) in self.times.iter().enumerate() {
            if !(value.is_finite() && value >= 0.0) {
                return Err(InputError::InvalidTime { index, value });
            }
        }
        for (index, &value) in self.values.iter().enumerate() {
            if !(value.is_finite() && value >= 0.0) {
                return Err(InputError::InvalidValue { index, value });
            }
        }
        for (i, w) in self.times.windows(2).enumerate() {
            if w[1] < w[0] {
                return Err(InputError::NonMonotonicTime {
                    index: i + 1,
                    prev: w[0],
                    next: w[1],
                });
            }
        }
        Ok(())
    }
}

/// Which model family a fit used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Attractor,
    Baseline,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Attractor, ModelKind::Baseline];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Attractor => "Attractor",
            ModelKind::Baseline => "Baseline",
        }
    }
}

/// Saturating growth equation used for the baseline model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BaselineForm {
    /// `P = K / (1 + (K/P0 - 1) e^{-rt})`
    Logistic,
    /// `P = K (P0/K)^{e^{-rt}}`
    Gompertz,
}

impl BaselineForm {
    pub fn display_name(self) -> &'static str {
        match self {
            BaselineForm::Logistic => "logistic",
            BaselineForm::Gompertz => "gompertz",
        }
    }
}

/// Closed interval per free parameter, in the model's parameter order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl ParamBounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Reject bounds that indicate a configuration mistake.
    pub fn validate(&self, expected_len: usize) -> Result<(), AppError> {
        if self.lower.len() != expected_len || self.upper.len() != expected_len {
            return Err(AppError::config(format!(
                "Bounds must have {expected_len} entries (got lower={}, upper={}).",
                self.lower.len(),
                self.upper.len()
            )));
        }
        for (i, (&lo, &hi)) in self.lower.iter().zip(self.upper.iter()).enumerate() {
            if !(lo.is_finite() && hi.is_finite()) {
                return Err(AppError::config(format!(
                    "Bound {i} is not finite: [{lo}, {hi}]."
                )));
            }
            if lo > hi {
                return Err(AppError::config(format!(
                    "Bound {i} has lower > upper: [{lo}, {hi}]."
                )));
            }
        }
        Ok(())
    }

    /// Clamp `params` into the box in place.
    pub fn clamp(&self, params: &mut [f64]) {
        for (p, (&lo, &hi)) in params.iter_mut().zip(self.lower.iter().zip(self.upper.iter())) {
            *p = p.clamp(lo, hi);
        }
    }
}

/// Target ratio and tolerance used to classify convergence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceCriteria {
    pub target: f64,
    pub tolerance: f64,
}

impl ConvergenceCriteria {
    pub fn new(target: f64, tolerance: f64) -> Result<Self, AppError> {
        if !(target.is_finite() && target > 0.0) {
            return Err(AppError::config(format!("Invalid target ratio: {target}.")));
        }
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(AppError::config(format!("Invalid tolerance: {tolerance}.")));
        }
        Ok(Self { target, tolerance })
    }
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// Built from CLI flags (plus defaults) or directly by library callers. Nothing
/// in the core reads configuration from anywhere else.
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub criteria: ConvergenceCriteria,
    pub baseline: BaselineForm,
    /// Levenberg–Marquardt iterations allowed per start before the fit is
    /// declared failed.
    pub max_iterations: usize,
    /// Samples shorter than this are rejected with `InputError::TooFewPoints`.
    pub min_points: usize,
    /// Log-spaced grid points per dimension for extra starts (0 = caller's
    /// initial guess only).
    pub start_steps: usize,
    /// Largest integration step for the attractor ODE.
    pub ode_max_step: f64,
    /// Worker threads for the batch fan-out (`None` = rayon's global pool).
    pub workers: Option<usize>,
    /// Overrides for the data-derived default bounds.
    pub attractor_bounds: Option<ParamBounds>,
    pub baseline_bounds: Option<ParamBounds>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            criteria: ConvergenceCriteria::default(),
            baseline: BaselineForm::Logistic,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            min_points: DEFAULT_MIN_POINTS,
            start_steps: DEFAULT_START_STEPS,
            ode_max_step: DEFAULT_ODE_MAX_STEP,
            workers: None,
            attractor_bounds: None,
            baseline_bounds: None,
        }
    }
}

impl FitConfig {
    /// Validate settings that would otherwise fail every fit in the batch.
    pub fn validate(&self) -> Result<(), AppError> {
        ConvergenceCriteria::new(self.criteria.target, self.criteria.tolerance)?;
        if self.max_iterations == 0 {
            return Err(AppError::config("max_iterations must be > 0."));
        }
        if self.min_points < 2 {
            return Err(AppError::config("min_points must be >= 2."));
        }
        if !(self.ode_max_step.is_finite() && self.ode_max_step > 0.0) {
            return Err(AppError::config(format!(
                "Invalid ode_max_step: {}.",
                self.ode_max_step
            )));
        }
        if self.workers == Some(0) {
            return Err(AppError::config("workers must be > 0."));
        }
        if let Some(b) = &self.attractor_bounds {
            b.validate(3)?;
        }
        if let Some(b) = &self.baseline_bounds {
            b.validate(2)?;
        }
        Ok(())
    }
}

/// Output of fitting one model family to one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub sample_id: String,
    pub model_kind: ModelKind,
    /// Set for baseline fits only.
    pub baseline_form: Option<BaselineForm>,
    /// Fitted (and fixed) parameters by name.
    pub parameters: BTreeMap<String, f64>,
    /// Sum of squared residuals.
    pub residual_error: f64,
    pub rmse: f64,
    /// Last predicted value divided by the fitted capacity.
    pub final_utilization: f64,
    /// `final_utilization - target` for successful fits.
    pub target_distance: Option<f64>,
    pub converged: bool,
    /// Predicted points whose utilization lies within half the tolerance of the target.
    pub stable_points: usize,
    pub fit_succeeded: bool,
    /// Optimizer iterations used by the winning start.
    pub iterations: usize,
    pub failure: Option<String>,
}

impl FitResult {
    pub fn param(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }
}

/// What happened to one sample in a batch.
#[derive(Debug, Clone)]
pub enum SampleOutcome {
    /// Both model kinds were attempted (each may still have failed).
    Fitted { id: String, fits: Vec<FitResult> },
    /// The sample failed structural validation and was never fitted.
    Rejected { id: String, error: InputError },
    /// The batch was cancelled before this sample started.
    Cancelled { id: String },
}

impl SampleOutcome {
    pub fn id(&self) -> &str {
        match self {
            SampleOutcome::Fitted { id, .. }
            | SampleOutcome::Rejected { id, .. }
            | SampleOutcome::Cancelled { id } => id,
        }
    }

    pub fn fits(&self) -> &[FitResult] {
        match self {
            SampleOutcome::Fitted { fits, .. } => fits,
            _ => &[],
        }
    }

    pub fn fit(&self, kind: ModelKind) -> Option<&FitResult> {
        self.fits().iter().find(|f| f.model_kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(times: Vec<f64>, values: Vec<f64>) -> GrowthSample {
        GrowthSample::new("s", times, values)
    }

    #[test]
    fn validate_accepts_well_formed_sample() {
        let s = sample(
            vec![0.0, 1.0, 1.0, 2.0, 3.0, 4.0],
            vec![0.1, 0.2, 0.3, 0.5, 0.7, 0.8],
        );
        assert!(s.validate(6).is_ok());
    }

    #[test]
    fn validate_rejects_structural_problems() {
        let short = sample(vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]);
        assert_eq!(
            short.validate(6),
            Err(InputError::TooFewPoints { found: 3, required: 6 })
        );

        let mismatch = sample(vec![0.0; 6], vec![1.0; 5]);
        assert!(matches!(mismatch.validate(6), Err(InputError::LengthMismatch { .. })));

        let backwards = sample(
            vec![0.0, 1.0, 2.0, 1.5, 3.0, 4.0],
            vec![1.0; 6],
        );
        assert!(matches!(
            backwards.validate(6),
            Err(InputError::NonMonotonicTime { index: 3, .. })
        ));

        let nan = sample(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![1.0, f64::NAN, 1.0, 1.0, 1.0, 1.0],
        );
        assert!(matches!(nan.validate(6), Err(InputError::InvalidValue { index: 1, .. })));
    }

    #[test]
    fn bounds_reject_inverted_interval() {
        let b = ParamBounds::new(vec![0.0, 5.0], vec![1.0, 4.0]);
        let err = b.validate(2).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn bounds_clamp_into_box() {
        let b = ParamBounds::new(vec![0.0, 1.0], vec![1.0, 2.0]);
        let mut p = [-1.0, 3.0];
        b.clamp(&mut p);
        assert_eq!(p, [0.0, 2.0]);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(FitConfig::default().validate().is_ok());
    }
}
