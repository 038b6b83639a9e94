//! `growth-fit` library crate.
//!
//! The binary (`gfit`) is a thin wrapper around this library so that:
//!
//! - the fit/classify/aggregate core is testable without spawning processes
//! - samples can be fitted from other Rust code without going through JSON

pub mod analysis;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod report;
