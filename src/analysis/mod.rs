//! Post-fit analysis: convergence classification and batch aggregation.

pub mod aggregate;
pub mod classify;

pub use aggregate::*;
pub use classify::*;
