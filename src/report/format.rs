//! Formatted terminal output for a batch run.
//!
//! We keep formatting code in one place so:
//! - the fitting and aggregation code stays clean and testable
//! - output changes are localized

use crate::analysis::{KindSummary, ModelComparison};
use crate::app::pipeline::BatchRun;
use crate::domain::{FitConfig, FitResult, ModelKind, SampleOutcome};

/// Format the run summary (settings, per-model statistics, paired comparison).
pub fn format_run_summary(run: &BatchRun, config: &FitConfig) -> String {
    let mut out = String::new();

    out.push_str("=== gfit - growth attractor fit ===\n");
    out.push_str(&format!(
        "Target: {:.3} ± {:.3} | baseline: {}\n",
        config.criteria.target,
        config.criteria.tolerance,
        config.baseline.display_name(),
    ));
    out.push_str(&format!(
        "Samples: n={} | rejected={} | cancelled={}\n",
        run.outcomes.len(),
        run.rejected(),
        run.cancelled(),
    ));

    out.push_str("\nModel summary:\n");
    for k in &run.summary.kinds {
        out.push_str(&format_kind(k));
    }

    out.push_str("\nAttractor vs baseline:\n");
    out.push_str(&format_comparison(&run.summary.comparison));

    out
}

fn format_kind(k: &KindSummary) -> String {
    format!(
        "  {:<10} fits={} ok={} failed={} converged={} rate={} util={} ± {} mean SSE={}\n",
        k.model_kind.display_name(),
        k.total,
        k.succeeded,
        k.failed,
        k.converged,
        fmt_pct(k.convergence_rate.map(|r| r * 100.0)),
        fmt_opt(k.mean_utilization, 4),
        fmt_opt(k.std_utilization, 4),
        fmt_sci(k.mean_sse),
    )
}

fn format_comparison(c: &ModelComparison) -> String {
    if c.pairs == 0 {
        return "  no samples where both models succeeded\n".to_string();
    }
    let mut out = String::new();
    out.push_str(&format!(
        "  pairs={} | attractor better on {}/{}\n",
        c.pairs, c.attractor_better, c.pairs
    ));
    out.push_str(&format!(
        "  mean SSE: attractor={} baseline={} | reduction={}\n",
        fmt_sci(c.mean_sse_attractor),
        fmt_sci(c.mean_sse_baseline),
        fmt_pct(c.sse_reduction_pct),
    ));
    out.push_str(&format!(
        "  paired t={} p={}\n",
        fmt_opt(c.t_statistic, 3),
        fmt_sci(c.p_value),
    ));
    out
}

/// Per-sample table: one line per sample with both model fits side by side.
pub fn format_sample_table(run: &BatchRun) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<24} {:>12} {:>8} {:>5} {:>12} {:>8} {:>5} {:<}\n",
            "id", "sse_attr", "u_attr", "conv", "sse_base", "u_base", "conv", "status"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<24} {:-<12} {:-<8} {:-<5} {:-<12} {:-<8} {:-<5} {:-<6}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for outcome in &run.outcomes {
        let line = match outcome {
            SampleOutcome::Fitted { id, .. } => {
                let a = outcome.fit(ModelKind::Attractor);
                let b = outcome.fit(ModelKind::Baseline);
                let status = [a, b]
                    .iter()
                    .flatten()
                    .find_map(|f| f.failure.as_deref())
                    .unwrap_or("ok");
                format!(
                    "{:<24} {} {} {}",
                    truncate(id, 24),
                    fmt_fit_cols(a),
                    fmt_fit_cols(b),
                    status
                )
            }
            SampleOutcome::Rejected { id, error } => {
                format!("{:<24} rejected: {error}", truncate(id, 24))
            }
            SampleOutcome::Cancelled { id } => format!("{:<24} cancelled", truncate(id, 24)),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

fn fmt_fit_cols(fit: Option<&FitResult>) -> String {
    match fit.filter(|f| f.fit_succeeded) {
        Some(f) => format!(
            "{:>12.4e} {:>8.4} {:>5}",
            f.residual_error,
            f.final_utilization,
            if f.converged { "yes" } else { "no" }
        ),
        None => format!("{:>12} {:>8} {:>5}", "-", "-", "-"),
    }
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|x| format!("{x:.decimals$}")).unwrap_or_else(|| "n/a".to_string())
}

fn fmt_sci(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4e}")).unwrap_or_else(|| "n/a".to_string())
}

fn fmt_pct(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.1}%")).unwrap_or_else(|| "n/a".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use crate::error::InputError;
    use std::collections::BTreeMap;

    fn fit(id: &str, kind: ModelKind, sse: f64, u: f64) -> FitResult {
        FitResult {
            sample_id: id.to_string(),
            model_kind: kind,
            baseline_form: None,
            parameters: BTreeMap::new(),
            residual_error: sse,
            rmse: sse.sqrt(),
            final_utilization: u,
            target_distance: Some(u - 0.85),
            converged: (u - 0.85).abs() <= 0.02,
            stable_points: 0,
            fit_succeeded: true,
            iterations: 8,
            failure: None,
        }
    }

    fn run() -> BatchRun {
        let outcomes = vec![
            SampleOutcome::Fitted {
                id: "curve-1".to_string(),
                fits: vec![
                    fit("curve-1", ModelKind::Attractor, 0.01, 0.851),
                    fit("curve-1", ModelKind::Baseline, 0.4, 0.99),
                ],
            },
            SampleOutcome::Rejected {
                id: "curve-2".to_string(),
                error: InputError::TooFewPoints { found: 3, required: 6 },
            },
        ];
        let fits: Vec<FitResult> = outcomes.iter().flat_map(|o| o.fits().to_vec()).collect();
        BatchRun {
            summary: aggregate(&fits).with_input_errors(1),
            outcomes,
        }
    }

    #[test]
    fn summary_mentions_counts_and_missing_statistics() {
        let text = format_run_summary(&run(), &FitConfig::default());
        assert!(text.contains("Samples: n=2 | rejected=1 | cancelled=0"));
        assert!(text.contains("Attractor"));
        // One succeeded fit per kind: no standard deviation, no t-test.
        assert!(text.contains("± n/a"));
        assert!(text.contains("pairs=1"));
        assert!(text.contains("p=n/a"));
    }

    #[test]
    fn table_has_row_per_sample() {
        let table = format_sample_table(&run());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("curve-1"));
        assert!(lines[2].ends_with("ok"));
        assert!(lines[3].contains("rejected: 3 points, need at least 6"));
    }

    #[test]
    fn truncate_marks_cut_ids() {
        assert_eq!(truncate("short", 24), "short");
        assert_eq!(truncate("abcdefgh", 5), "abcd.");
    }
}
