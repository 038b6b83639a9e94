//! Terminal reporting for batch runs.

pub mod format;

pub use format::*;
