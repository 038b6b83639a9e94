//! Growth model implementations.
//!
//! Both model families (attractor and baseline) sit behind one `GrowthModel`
//! value so the fitter, the synthetic generator and the reports share a single
//! prediction path.

pub mod model;
pub mod ode;

pub use model::*;
pub use ode::*;
