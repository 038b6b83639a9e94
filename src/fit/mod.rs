//! Curve fitting.
//!
//! Responsibilities:
//!
//! - build deterministic start points (caller's guess + log-spaced grid)
//! - run bounded Levenberg–Marquardt from each start (parallel)
//! - turn the winning run into a `FitResult`, flagging failures instead of erroring

pub mod fitter;
pub mod lm;
pub mod starts;

pub use fitter::*;
pub use lm::*;
pub use starts::*;
