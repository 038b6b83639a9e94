//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the input record (`GrowthSample`) and its structural validation
//! - model selectors (`ModelKind`, `BaselineForm`)
//! - run configuration (`FitConfig`, `ConvergenceCriteria`, `ParamBounds`)
//! - per-fit output (`FitResult`) and per-sample outcomes (`SampleOutcome`)

pub mod types;

pub use types::*;
