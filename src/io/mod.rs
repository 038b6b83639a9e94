//! Input/output helpers.
//!
//! - sample batches as JSON (`samples`)
//! - result exports: per-fit CSV, batch summary JSON (`export`)

pub mod export;
pub mod samples;

pub use export::*;
pub use samples::*;
