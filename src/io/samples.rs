//! Read and write sample batches as JSON.
//!
//! The file is a JSON array of `GrowthSample` objects:
//!
//! ```json
//! [{ "id": "well-a1", "times": [0.0, 0.5, 1.0], "values": [0.05, 0.07, 0.11] }]
//! ```
//!
//! Parsing only checks shape. Per-sample validation happens in the pipeline so
//! one bad curve cannot fail the whole file.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::domain::GrowthSample;
use crate::error::AppError;

pub fn read_samples_json(path: &Path) -> Result<Vec<GrowthSample>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open samples JSON '{}': {e}", path.display())))?;
    parse_samples(BufReader::new(file))
        .map_err(|e| AppError::config(format!("Invalid samples JSON '{}': {e}", path.display())))
}

pub fn write_samples_json(path: &Path, samples: &[GrowthSample]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create samples JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), samples)
        .map_err(|e| AppError::config(format!("Failed to write samples JSON: {e}")))
}

fn parse_samples<R: std::io::Read>(reader: R) -> Result<Vec<GrowthSample>, serde_json::Error> {
    serde_json::from_reader(reader)
}
