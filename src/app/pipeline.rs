//! Shared batch pipeline used by every front-end command.
//!
//! validate -> fit each model kind (per sample, in parallel) -> classify -> aggregate
//!
//! A bad sample is recorded as `SampleOutcome::Rejected` and never stops the
//! batch. Only configuration problems abort the run.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::{BatchSummary, aggregate};
use crate::domain::{FitConfig, FitResult, GrowthSample, ModelKind, SampleOutcome};
use crate::error::{AppError, EXIT_INTERNAL, InputError};
use crate::fit::fit_with_defaults;

/// All computed outputs of one batch.
#[derive(Debug, Clone)]
pub struct BatchRun {
    /// One entry per input sample, in input order.
    pub outcomes: Vec<SampleOutcome>,
    pub summary: BatchSummary,
}

impl BatchRun {
    /// Every fit attempted in this batch (successful or not).
    pub fn results(&self) -> impl Iterator<Item = &FitResult> {
        self.outcomes.iter().flat_map(|o| o.fits().iter())
    }

    pub fn rejected(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SampleOutcome::Rejected { .. }))
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SampleOutcome::Cancelled { .. }))
            .count()
    }
}

/// Fit every sample with every model kind and summarize the batch.
///
/// `cancel` is polled before each sample starts; samples not yet started when
/// it flips are reported as `Cancelled` and finished ones keep their results.
pub fn run_batch(
    samples: &[GrowthSample],
    config: &FitConfig,
    cancel: Option<&AtomicBool>,
) -> Result<BatchRun, AppError> {
    run_batch_with_progress(samples, config, cancel, &|_| {})
}

/// `run_batch` that also calls `progress` once per sample as it finishes.
///
/// `progress` runs on the worker thread and may be called out of input order.
pub fn run_batch_with_progress(
    samples: &[GrowthSample],
    config: &FitConfig,
    cancel: Option<&AtomicBool>,
    progress: &(dyn Fn(&SampleOutcome) + Sync),
) -> Result<BatchRun, AppError> {
    config.validate()?;

    info!(
        samples = samples.len(),
        target = config.criteria.target,
        tolerance = config.criteria.tolerance,
        baseline = config.baseline.display_name(),
        "starting batch"
    );

    let duplicates = duplicate_positions(samples);
    let work = || -> Result<Vec<SampleOutcome>, AppError> {
        samples
            .par_iter()
            .enumerate()
            .map(|(i, sample)| {
                if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                    return Ok(SampleOutcome::Cancelled { id: sample.id.clone() });
                }
                let outcome = if duplicates.contains(&i) {
                    rejected(sample, InputError::DuplicateId(sample.id.clone()))
                } else if let Err(error) = sample.validate(config.min_points) {
                    rejected(sample, error)
                } else {
                    fit_sample(sample, config)?
                };
                progress(&outcome);
                Ok(outcome)
            })
            .collect()
    };

    let outcomes = match config.workers {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| AppError::new(EXIT_INTERNAL, format!("Failed to build worker pool: {e}")))?
            .install(work)?,
        None => work()?,
    };

    let fits: Vec<FitResult> = outcomes.iter().flat_map(|o| o.fits().iter().cloned()).collect();
    let rejected_count = outcomes
        .iter()
        .filter(|o| matches!(o, SampleOutcome::Rejected { .. }))
        .count();
    let summary = aggregate(&fits).with_input_errors(rejected_count);

    let run = BatchRun { outcomes, summary };
    info!(
        fits = fits.len(),
        failed = run.summary.failed(),
        rejected = rejected_count,
        cancelled = run.cancelled(),
        "batch finished"
    );
    Ok(run)
}

fn fit_sample(sample: &GrowthSample, config: &FitConfig) -> Result<SampleOutcome, AppError> {
    let mut fits = Vec::with_capacity(ModelKind::ALL.len());
    for kind in ModelKind::ALL {
        let fit = fit_with_defaults(sample, kind, config)?;
        debug!(
            sample = %sample.id,
            model = kind.display_name(),
            ok = fit.fit_succeeded,
            sse = fit.residual_error,
            utilization = fit.final_utilization,
            converged = fit.converged,
            iterations = fit.iterations,
            "fit finished"
        );
        if let Some(reason) = &fit.failure {
            debug!(sample = %sample.id, model = kind.display_name(), %reason, "fit failed");
        }
        fits.push(fit);
    }
    Ok(SampleOutcome::Fitted {
        id: sample.id.clone(),
        fits,
    })
}

fn rejected(sample: &GrowthSample, error: InputError) -> SampleOutcome {
    warn!(sample = %sample.id, %error, "sample rejected");
    SampleOutcome::Rejected {
        id: sample.id.clone(),
        error,
    }
}

/// Positions of samples whose id already appeared earlier in the batch.
fn duplicate_positions(samples: &[GrowthSample]) -> HashSet<usize> {
    let mut seen = HashSet::new();
    samples
        .iter()
        .enumerate()
        .filter(|(_, s)| !seen.insert(s.id.as_str()))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GrowthModel;

    fn attractor_curve(id: &str, r: f64, d: f64, k: f64) -> GrowthSample {
        let times: Vec<f64> = (0..=30).map(|i| i as f64 * 1.5).collect();
        let model = GrowthModel::Attractor { target: 0.85, max_step: 0.05 };
        let values = model.predict(&times, 0.05 * k, &[r, d, k]);
        GrowthSample::new(id, times, values)
    }

    fn batch() -> Vec<GrowthSample> {
        vec![
            attractor_curve("a", 0.3, 1.0, 10.0),
            GrowthSample::new("short", vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]),
            attractor_curve("b", 0.5, 2.0, 4.0),
        ]
    }

    #[test]
    fn bad_sample_does_not_stop_the_batch() {
        let run = run_batch(&batch(), &FitConfig::default(), None).unwrap();
        assert_eq!(run.outcomes.len(), 3);

        match &run.outcomes[1] {
            SampleOutcome::Rejected { id, error } => {
                assert_eq!(id, "short");
                assert_eq!(*error, InputError::TooFewPoints { found: 3, required: 6 });
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        for i in [0, 2] {
            let fit = run.outcomes[i].fit(ModelKind::Attractor).unwrap();
            assert!(fit.fit_succeeded, "{:?}", fit.failure);
            assert!(fit.converged);
        }

        assert_eq!(run.rejected(), 1);
        assert_eq!(run.summary.input_errors, 1);
        let attractor = run.summary.kind(ModelKind::Attractor).unwrap();
        assert_eq!((attractor.total, attractor.succeeded, attractor.failed), (3, 2, 1));
        assert_eq!(run.summary.comparison.pairs, 2);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let samples = vec![
            attractor_curve("dup", 0.3, 1.0, 10.0),
            attractor_curve("dup", 0.5, 2.0, 4.0),
        ];
        let run = run_batch(&samples, &FitConfig::default(), None).unwrap();
        assert!(matches!(run.outcomes[0], SampleOutcome::Fitted { .. }));
        assert!(matches!(
            &run.outcomes[1],
            SampleOutcome::Rejected { error: InputError::DuplicateId(id), .. } if id == "dup"
        ));
    }

    #[test]
    fn cancelled_batch_reports_unstarted_samples() {
        let cancel = AtomicBool::new(true);
        let run = run_batch(&batch(), &FitConfig::default(), Some(&cancel)).unwrap();
        assert_eq!(run.cancelled(), 3);
        assert_eq!(run.results().count(), 0);
        assert_eq!(run.summary.failed(), 0);
    }

    #[test]
    fn cancelling_mid_batch_keeps_finished_fits() {
        let samples = vec![
            attractor_curve("a", 0.3, 1.0, 10.0),
            attractor_curve("b", 0.5, 2.0, 4.0),
            attractor_curve("c", 0.4, 1.5, 6.0),
            attractor_curve("d", 0.6, 2.5, 8.0),
        ];
        // One worker visits samples in input order.
        let config = FitConfig {
            workers: Some(1),
            ..FitConfig::default()
        };
        let cancel = AtomicBool::new(false);
        let stop_after_first = |outcome: &SampleOutcome| {
            if matches!(outcome, SampleOutcome::Fitted { .. }) {
                cancel.store(true, Ordering::Relaxed);
            }
        };
        let run = run_batch_with_progress(&samples, &config, Some(&cancel), &stop_after_first).unwrap();

        let fitted = run
            .outcomes
            .iter()
            .filter(|o| matches!(o, SampleOutcome::Fitted { .. }))
            .count();
        assert_eq!(fitted, 1);
        assert_eq!(run.cancelled(), 3);
        assert!(matches!(&run.outcomes[0], SampleOutcome::Fitted { id, .. } if id == "a"));

        let attractor = run.summary.kind(ModelKind::Attractor).unwrap();
        assert_eq!((attractor.total, attractor.succeeded, attractor.failed), (1, 1, 0));
        assert_eq!(run.summary.comparison.pairs, 1);
        let fits: Vec<FitResult> = run.results().cloned().collect();
        assert_eq!(run.summary, aggregate(&fits));
    }

    #[test]
    fn dedicated_pool_matches_global_pool() {
        let samples = batch();
        let global = run_batch(&samples, &FitConfig::default(), None).unwrap();
        let pooled = run_batch(
            &samples,
            &FitConfig {
                workers: Some(2),
                ..FitConfig::default()
            },
            None,
        )
        .unwrap();
        assert_eq!(global.summary, pooled.summary);
        let a: Vec<&FitResult> = global.results().collect();
        let b: Vec<&FitResult> = pooled.results().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_config_aborts_before_fitting() {
        let config = FitConfig {
            max_iterations: 0,
            ..FitConfig::default()
        };
        let err = run_batch(&batch(), &config, None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
