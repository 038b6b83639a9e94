//! Export batch results.
//!
//! - per-fit CSV: one row per (sample, model kind), plus one row per rejected
//!   or cancelled sample, easy to load in spreadsheets or downstream scripts
//! - summary JSON: the aggregated `BatchSummary` with run metadata

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::BatchSummary;
use crate::app::pipeline::BatchRun;
use crate::domain::{BaselineForm, ConvergenceCriteria, FitConfig, FitResult, SampleOutcome};
use crate::error::AppError;

const CSV_HEADER: &str = "id,model,baseline_form,growth_rate,damping,capacity,sse,rmse,\
final_utilization,target_distance,converged,stable_points,iterations,status,detail";

/// Schema of the summary JSON export.
#[derive(Debug, Serialize)]
pub struct SummaryFile<'a> {
    pub tool: &'static str,
    pub generated_at: DateTime<Utc>,
    pub criteria: ConvergenceCriteria,
    pub baseline: BaselineForm,
    pub samples: usize,
    pub cancelled: usize,
    pub rejected: Vec<RejectedSample>,
    pub summary: &'a BatchSummary,
}

#[derive(Debug, Serialize)]
pub struct RejectedSample {
    pub id: String,
    pub reason: String,
}

/// Write per-fit results to a CSV file.
pub fn write_results_csv(path: &Path, run: &BatchRun) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_results(&mut out, &run.outcomes)
        .and_then(|_| out.flush())
        .map_err(|e| AppError::config(format!("Failed to write export CSV '{}': {e}", path.display())))
}

/// Write the batch summary JSON.
pub fn write_summary_json(path: &Path, run: &BatchRun, config: &FitConfig) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create summary JSON '{}': {e}", path.display())))?;

    let doc = summary_file(run, config, Utc::now());
    serde_json::to_writer_pretty(BufWriter::new(file), &doc)
        .map_err(|e| AppError::config(format!("Failed to write summary JSON: {e}")))
}

pub fn summary_file<'a>(run: &'a BatchRun, config: &FitConfig, now: DateTime<Utc>) -> SummaryFile<'a> {
    let rejected = run
        .outcomes
        .iter()
        .filter_map(|o| match o {
            SampleOutcome::Rejected { id, error } => Some(RejectedSample {
                id: id.clone(),
                reason: error.to_string(),
            }),
            _ => None,
        })
        .collect();

    SummaryFile {
        tool: "gfit",
        generated_at: now,
        criteria: config.criteria,
        baseline: config.baseline,
        samples: run.outcomes.len(),
        cancelled: run.cancelled(),
        rejected,
        summary: &run.summary,
    }
}

fn write_results<W: Write>(out: &mut W, outcomes: &[SampleOutcome]) -> std::io::Result<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for outcome in outcomes {
        match outcome {
            SampleOutcome::Fitted { fits, .. } => {
                for fit in fits {
                    write_fit_row(out, fit)?;
                }
            }
            SampleOutcome::Rejected { id, error } => {
                writeln!(out, "{},,,,,,,,,,,,,rejected,{}", csv_field(id), csv_field(&error.to_string()))?;
            }
            SampleOutcome::Cancelled { id } => {
                writeln!(out, "{},,,,,,,,,,,,,cancelled,", csv_field(id))?;
            }
        }
    }
    Ok(())
}

fn write_fit_row<W: Write>(out: &mut W, fit: &FitResult) -> std::io::Result<()> {
    let num = |v: Option<f64>| {
        v.filter(|x| x.is_finite())
            .map(|x| format!("{x:.10}"))
            .unwrap_or_default()
    };
    let (status, detail) = if fit.fit_succeeded {
        ("ok", String::new())
    } else {
        ("failed", fit.failure.clone().unwrap_or_default())
    };

    writeln!(
        out,
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        csv_field(&fit.sample_id),
        fit.model_kind.display_name(),
        fit.baseline_form.map(|f| f.display_name()).unwrap_or(""),
        num(fit.param("growth_rate")),
        num(fit.param("damping")),
        num(fit.param("capacity")),
        num(Some(fit.residual_error)),
        num(Some(fit.rmse)),
        num(Some(fit.final_utilization)),
        num(fit.target_distance),
        fit.converged,
        fit.stable_points,
        fit.iterations,
        status,
        csv_field(&detail),
    )
}

/// Quote a field when it contains a delimiter, quote or newline.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;
    use crate::error::InputError;
    use std::collections::BTreeMap;

    fn fit(id: &str, ok: bool) -> FitResult {
        let mut parameters = BTreeMap::new();
        parameters.insert("growth_rate".to_string(), 0.2);
        parameters.insert("damping".to_string(), 0.5);
        parameters.insert("capacity".to_string(), 100.0);
        FitResult {
            sample_id: id.to_string(),
            model_kind: ModelKind::Attractor,
            baseline_form: None,
            parameters,
            residual_error: if ok { 0.5 } else { f64::INFINITY },
            rmse: 0.1,
            final_utilization: if ok { 0.85 } else { f64::NAN },
            target_distance: ok.then_some(0.0),
            converged: ok,
            stable_points: 3,
            fit_succeeded: ok,
            iterations: 12,
            failure: (!ok).then(|| "optimizer did not converge within 200 iterations".to_string()),
        }
    }

    fn csv_lines(outcomes: &[SampleOutcome]) -> Vec<String> {
        let mut buf = Vec::new();
        write_results(&mut buf, outcomes).unwrap();
        String::from_utf8(buf).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn csv_has_one_row_per_fit_and_per_rejection() {
        let outcomes = vec![
            SampleOutcome::Fitted {
                id: "a".to_string(),
                fits: vec![fit("a", true), fit("a", false)],
            },
            SampleOutcome::Rejected {
                id: "b".to_string(),
                error: InputError::LengthMismatch { times: 3, values: 4 },
            },
            SampleOutcome::Cancelled { id: "c".to_string() },
        ];
        let lines = csv_lines(&outcomes);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], CSV_HEADER);

        let header_cols = CSV_HEADER.split(',').count();
        for line in &lines[1..] {
            assert_eq!(line.split(',').count(), header_cols, "{line}");
        }
        assert!(lines[1].contains(",ok,"));
        assert!(lines[2].contains(",failed,optimizer did not converge"));
        // Non-finite numbers are left blank.
        let failed: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(failed[6], "");
        assert_eq!(failed[8], "");
        assert_eq!(failed[9], "");
        let ok: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(ok[9], "0.0000000000");
        assert!(lines[3].starts_with("b,") && lines[3].contains(",rejected,times has 3 entries"));
        assert!(lines[4].ends_with(",cancelled,"));
    }

    #[test]
    fn csv_field_quotes_delimiters() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
