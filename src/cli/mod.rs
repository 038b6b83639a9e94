//! Command-line parsing for the growth curve fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{
    BaselineForm, DEFAULT_MAX_ITERATIONS, DEFAULT_MIN_POINTS, DEFAULT_ODE_MAX_STEP,
    DEFAULT_START_STEPS, DEFAULT_TARGET, DEFAULT_TOLERANCE,
};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "gfit",
    version,
    about = "Fit attractor and baseline growth models and classify convergence to a target utilization"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit samples from a JSON file, print the batch summary and optionally export.
    Fit(FitArgs),
    /// Generate a reproducible synthetic batch and fit it.
    Synth(SynthArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// JSON array of samples: `[{"id": .., "times": [..], "values": [..]}]`.
    #[arg(short = 'i', long, value_name = "JSON")]
    pub input: PathBuf,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Number of synthetic curves (alternating attractor / logistic).
    #[arg(short = 'n', long, default_value_t = 20)]
    pub count: usize,

    /// Points per curve.
    #[arg(long, default_value_t = 40)]
    pub points: usize,

    /// Last sampling time.
    #[arg(long, default_value_t = 48.0)]
    pub time_max: f64,

    /// Gaussian noise level as a share of capacity.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Random seed for sample generation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Also write the generated samples as JSON (readable by `gfit fit`).
    #[arg(long = "save-samples", value_name = "JSON")]
    pub save_samples: Option<PathBuf>,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Options shared by every fitting command.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Target utilization ratio.
    #[arg(long, default_value_t = DEFAULT_TARGET)]
    pub target: f64,

    /// Half-width of the convergence band around the target.
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Baseline growth equation.
    #[arg(long, value_enum, default_value_t = BaselineForm::Logistic)]
    pub baseline: BaselineForm,

    /// Optimizer iterations per start.
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,

    /// Reject samples with fewer points.
    #[arg(long, default_value_t = DEFAULT_MIN_POINTS)]
    pub min_points: usize,

    /// Grid starts per rate dimension (0 = initial guess only).
    #[arg(long, default_value_t = DEFAULT_START_STEPS)]
    pub start_steps: usize,

    /// Largest RK4 step for the attractor ODE.
    #[arg(long, default_value_t = DEFAULT_ODE_MAX_STEP)]
    pub ode_max_step: f64,

    /// Worker threads (default: one per core).
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Show the per-sample table.
    #[arg(long)]
    pub details: bool,

    /// Export per-fit results to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the batch summary to JSON.
    #[arg(long = "export-summary", value_name = "JSON")]
    pub export_summary: Option<PathBuf>,

    /// Only log warnings and errors.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}
