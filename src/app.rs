//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - loads or generates samples
//! - runs the batch pipeline
//! - prints reports
//! - writes optional exports

use std::sync::atomic::{AtomicUsize, Ordering};

use clap::Parser;
use tracing::{debug, info};

use crate::cli::{Command, FitArgs, RunArgs, SynthArgs};
use crate::data::{SynthConfig, generate_samples};
use crate::domain::{ConvergenceCriteria, FitConfig, GrowthSample, SampleOutcome};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `gfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    crate::logging::init(args.run.quiet);
    let config = fit_config_from_args(&args.run)?;

    let samples = crate::io::read_samples_json(&args.input)?;
    info!(path = %args.input.display(), samples = samples.len(), "loaded samples");

    run_and_report(&samples, &config, &args.run)
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    crate::logging::init(args.run.quiet);
    let config = fit_config_from_args(&args.run)?;

    let synth = SynthConfig {
        count: args.count,
        points: args.points,
        time_max: args.time_max,
        noise: args.noise,
        seed: args.seed,
        target: config.criteria.target,
        ode_max_step: config.ode_max_step,
    };
    let generated = generate_samples(&synth)?;
    for s in &generated {
        debug!(sample = %s.sample.id, params = ?s.true_params, "generating parameters");
    }
    let samples: Vec<GrowthSample> = generated.into_iter().map(|s| s.sample).collect();
    info!(samples = samples.len(), seed = args.seed, noise = args.noise, "generated synthetic samples");

    if let Some(path) = &args.save_samples {
        crate::io::write_samples_json(path, &samples)?;
        info!(path = %path.display(), "wrote samples");
    }

    run_and_report(&samples, &config, &args.run)
}

fn run_and_report(samples: &[GrowthSample], config: &FitConfig, args: &RunArgs) -> Result<(), AppError> {
    let done = AtomicUsize::new(0);
    let report_progress = |outcome: &SampleOutcome| {
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(sample = outcome.id(), done = n, total = samples.len(), "sample finished");
    };
    let run = pipeline::run_batch_with_progress(samples, config, None, &report_progress)?;

    println!("{}", crate::report::format_run_summary(&run, config));
    if args.details {
        println!("{}", crate::report::format_sample_table(&run));
    }

    // Optional exports.
    if let Some(path) = &args.export {
        crate::io::write_results_csv(path, &run)?;
        info!(path = %path.display(), "wrote results CSV");
    }
    if let Some(path) = &args.export_summary {
        crate::io::write_summary_json(path, &run, config)?;
        info!(path = %path.display(), "wrote summary JSON");
    }

    Ok(())
}

/// Map shared CLI options onto a validated `FitConfig`.
pub fn fit_config_from_args(args: &RunArgs) -> Result<FitConfig, AppError> {
    let config = FitConfig {
        criteria: ConvergenceCriteria::new(args.target, args.tolerance)?,
        baseline: args.baseline,
        max_iterations: args.max_iterations,
        min_points: args.min_points,
        start_steps: args.start_steps,
        ode_max_step: args.ode_max_step,
        workers: args.workers,
        attractor_bounds: None,
        baseline_bounds: None,
    };
    config.validate()?;
    Ok(config)
}
