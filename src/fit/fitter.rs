//! Fit one growth model to one sample.
//!
//! Given:
//! - a validated `GrowthSample`
//! - a `GrowthModel` (attractor or baseline)
//! - box bounds and an initial guess for the free parameters
//!
//! we run bounded Levenberg–Marquardt from the guess and from a deterministic
//! start grid (in parallel), keep the converged run with the lowest SSE, and
//! report it as a `FitResult`.
//!
//! Data problems never produce an `Err`: they come back as a result with
//! `fit_succeeded = false` and a `failure` reason. `Err` is reserved for
//! configuration mistakes (inconsistent bounds, wrong guess length).

use rayon::prelude::*;

use crate::analysis::{classify_utilization, count_stable_points, distance_from_target};
use crate::domain::{FitConfig, FitResult, GrowthSample, ModelKind, ParamBounds};
use crate::error::AppError;
use crate::fit::lm::{LmOptions, LmOutcome, levenberg_marquardt};
use crate::fit::starts::start_points;
use crate::models::{GrowthModel, initial_value};

/// Fit `model` to `sample` with explicit bounds and initial guess.
pub fn fit(
    sample: &GrowthSample,
    model: &GrowthModel,
    bounds: &ParamBounds,
    initial_guess: &[f64],
    config: &FitConfig,
) -> Result<FitResult, AppError> {
    config.validate()?;
    let k = model.param_count();
    bounds.validate(k)?;
    if initial_guess.len() != k {
        return Err(AppError::config(format!(
            "Initial guess for {} must have {k} entries (got {}).",
            model.kind().display_name(),
            initial_guess.len()
        )));
    }
    if let GrowthModel::Attractor { max_step, .. } = model {
        if !(max_step.is_finite() && *max_step > 0.0) {
            return Err(AppError::config(format!("Invalid ode_max_step: {max_step}.")));
        }
    }

    // Never accept fewer points than parameters, even with a permissive config.
    if let Err(e) = sample.validate(config.min_points.max(k)) {
        return Ok(failed(sample, model, initial_guess, format!("invalid sample: {e}")));
    }
    // A series that never leaves zero carries no capacity information.
    if sample.max_value() <= 0.0 {
        return Ok(failed(sample, model, initial_guess, "no signal: every value is zero".to_string()));
    }

    let p0 = initial_value(sample);
    let residuals = |p: &[f64]| -> Option<Vec<f64>> {
        let pred = model.predict(&sample.times, p0, p);
        let r: Vec<f64> = pred
            .iter()
            .zip(sample.values.iter())
            .map(|(yp, yo)| yp - yo)
            .collect();
        r.iter().all(|v| v.is_finite()).then_some(r)
    };

    let opts = LmOptions::with_budget(config.max_iterations);
    let starts = start_points(model, initial_guess, bounds, config.start_steps);

    let runs: Vec<LmOutcome> = starts
        .par_iter()
        .map(|start| levenberg_marquardt(&residuals, start, bounds, &opts))
        .collect();

    let Some((best, any_converged)) = select_run(&runs) else {
        return Ok(failed(sample, model, initial_guess, "no start could be evaluated".to_string()));
    };

    Ok(build_result(sample, model, p0, best, any_converged, config))
}

/// Fit using data-derived bounds (unless overridden in `config`) and initial guess.
pub fn fit_with_defaults(
    sample: &GrowthSample,
    kind: ModelKind,
    config: &FitConfig,
) -> Result<FitResult, AppError> {
    let model = GrowthModel::for_kind(kind, config);
    let override_bounds = match kind {
        ModelKind::Attractor => config.attractor_bounds.as_ref(),
        ModelKind::Baseline => config.baseline_bounds.as_ref(),
    };
    let bounds = override_bounds
        .cloned()
        .unwrap_or_else(|| model.default_bounds(sample));
    let guess = model.initial_guess(sample, &bounds);
    fit(sample, &model, &bounds, &guess, config)
}

/// Deterministic selection: lowest SSE among converged runs, ties broken by
/// start index. Falls back to the lowest-SSE evaluable run when none converged.
fn select_run(runs: &[LmOutcome]) -> Option<(&LmOutcome, bool)> {
    let lowest = |converged_only: bool| {
        let mut best: Option<&LmOutcome> = None;
        for run in runs {
            if !run.sse.is_finite() || (converged_only && !run.converged) {
                continue;
            }
            if best.is_none_or(|b| run.sse < b.sse) {
                best = Some(run);
            }
        }
        best
    };

    match lowest(true) {
        Some(run) => Some((run, true)),
        None => lowest(false).map(|run| (run, false)),
    }
}

fn build_result(
    sample: &GrowthSample,
    model: &GrowthModel,
    p0: f64,
    run: &LmOutcome,
    converged_run: bool,
    config: &FitConfig,
) -> FitResult {
    let params = &run.params;
    let capacity = params[model.capacity_index()];
    let pred = model.predict(&sample.times, p0, params);
    let n = sample.len() as f64;

    let sse = run.sse;
    let final_value = pred.last().copied().unwrap_or(f64::NAN);
    let final_utilization = final_value / capacity;

    let failure = if !converged_run {
        Some(format!(
            "optimizer did not converge within {} iterations",
            config.max_iterations
        ))
    } else if !params.iter().all(|v| v.is_finite()) {
        Some("non-finite parameters".to_string())
    } else if capacity <= 0.0 {
        Some(format!("non-positive capacity ({capacity})"))
    } else if !sse.is_finite() || !final_utilization.is_finite() {
        Some("non-finite residual".to_string())
    } else {
        None
    };
    let fit_succeeded = failure.is_none();

    let (converged, stable_points) = if fit_succeeded {
        (
            classify_utilization(final_utilization, &config.criteria),
            count_stable_points(&pred, capacity, &config.criteria),
        )
    } else {
        (false, 0)
    };

    let mut result = FitResult {
        sample_id: sample.id.clone(),
        model_kind: model.kind(),
        baseline_form: baseline_form(model),
        parameters: model.parameter_map(params, p0),
        residual_error: sse,
        rmse: (sse / n).sqrt(),
        final_utilization,
        target_distance: None,
        converged,
        stable_points,
        fit_succeeded,
        iterations: run.iterations,
        failure,
    };
    result.target_distance = distance_from_target(&result, &config.criteria);
    result
}

fn failed(sample: &GrowthSample, model: &GrowthModel, params: &[f64], reason: String) -> FitResult {
    FitResult {
        sample_id: sample.id.clone(),
        model_kind: model.kind(),
        baseline_form: baseline_form(model),
        parameters: model.parameter_map(params, initial_value(sample)),
        residual_error: f64::INFINITY,
        rmse: f64::INFINITY,
        final_utilization: f64::NAN,
        target_distance: None,
        converged: false,
        stable_points: 0,
        fit_succeeded: false,
        iterations: 0,
        failure: Some(reason),
    }
}

fn baseline_form(model: &GrowthModel) -> Option<crate::domain::BaselineForm> {
    match model {
        GrowthModel::Baseline(form) => Some(*form),
        GrowthModel::Attractor { .. } => None,
    }
}
