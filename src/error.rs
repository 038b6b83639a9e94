//! Error types.
//!
//! - `AppError` carries a process exit code and is used for configuration, IO
//!   and other run-level failures that abort the command.
//! - `InputError` describes why a single sample was rejected before fitting.
//!   It never aborts a batch; the pipeline records it next to the sample id.

use thiserror::Error;

/// Exit code for usage, configuration and IO problems.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code for internal failures (should not happen on valid input).
pub const EXIT_INTERNAL: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Shorthand for a configuration error (exit code 2).
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Structural problems with a `GrowthSample`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("times has {times} entries but values has {values}")]
    LengthMismatch { times: usize, values: usize },

    #[error("{found} points, need at least {required}")]
    TooFewPoints { found: usize, required: usize },

    #[error("time decreases at index {index} ({prev} -> {next})")]
    NonMonotonicTime { index: usize, prev: f64, next: f64 },

    #[error("time at index {index} is negative or not finite ({value})")]
    InvalidTime { index: usize, value: f64 },

    #[error("value at index {index} is negative or not finite ({value})")]
    InvalidValue { index: usize, value: f64 },

    #[error("duplicate sample id '{0}' in batch")]
    DuplicateId(String),
}
