//! Sample sources beyond user-supplied JSON.

pub mod sample;

pub use sample::*;
