//! Batch aggregation.
//!
//! Collapses per-sample `FitResult`s into per-model summaries and a paired
//! Attractor vs Baseline comparison. Failed fits are counted but excluded from
//! every statistic. Anything undefined (empty groups, n < 2, zero variance)
//! comes back as `None`.
//!
//! The summary depends only on the multiset of inputs: values are sorted before
//! reduction and pairs are keyed by sample id.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{FitResult, ModelKind};
use crate::math::{mean, paired_t_test, sample_std};

/// Statistics for one model kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindSummary {
    pub model_kind: ModelKind,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub converged: usize,
    pub not_converged: usize,
    /// `converged / succeeded`.
    pub convergence_rate: Option<f64>,
    pub mean_utilization: Option<f64>,
    pub std_utilization: Option<f64>,
    pub mean_sse: Option<f64>,
}

/// Attractor vs Baseline on samples where both fits succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelComparison {
    pub pairs: usize,
    pub mean_sse_attractor: Option<f64>,
    pub mean_sse_baseline: Option<f64>,
    /// `(baseline - attractor) / baseline * 100` on the mean SSEs.
    pub sse_reduction_pct: Option<f64>,
    /// Paired t statistic on `sse_baseline - sse_attractor`.
    pub t_statistic: Option<f64>,
    pub p_value: Option<f64>,
    /// Pairs where the attractor SSE is strictly lower.
    pub attractor_better: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// One entry per model kind, in `ModelKind::ALL` order.
    pub kinds: Vec<KindSummary>,
    /// Samples rejected before fitting.
    pub input_errors: usize,
    pub comparison: ModelComparison,
}

impl BatchSummary {
    pub fn kind(&self, kind: ModelKind) -> Option<&KindSummary> {
        self.kinds.iter().find(|k| k.model_kind == kind)
    }

    /// Fold `n` samples rejected before fitting into the summary.
    ///
    /// A rejected sample counts as one failed fit for every model kind.
    pub fn with_input_errors(mut self, n: usize) -> Self {
        self.input_errors += n;
        for k in &mut self.kinds {
            k.total += n;
            k.failed += n;
        }
        self
    }

    /// Total failed fits across all kinds.
    pub fn failed(&self) -> usize {
        self.kinds.iter().map(|k| k.failed).sum()
    }
}

/// Summarize a batch of fit results.
pub fn aggregate(results: &[FitResult]) -> BatchSummary {
    let kinds = ModelKind::ALL
        .iter()
        .map(|&kind| summarize_kind(kind, results))
        .collect();

    BatchSummary {
        kinds,
        input_errors: 0,
        comparison: compare(results),
    }
}

fn summarize_kind(kind: ModelKind, results: &[FitResult]) -> KindSummary {
    let group: Vec<&FitResult> = results.iter().filter(|r| r.model_kind == kind).collect();
    let ok: Vec<&FitResult> = group.iter().copied().filter(|r| r.fit_succeeded).collect();

    let converged = ok.iter().filter(|r| r.converged).count();
    let utilizations: Vec<f64> = ok.iter().map(|r| r.final_utilization).collect();
    let sses: Vec<f64> = ok.iter().map(|r| r.residual_error).collect();

    KindSummary {
        model_kind: kind,
        total: group.len(),
        succeeded: ok.len(),
        failed: group.len() - ok.len(),
        converged,
        not_converged: ok.len() - converged,
        convergence_rate: (!ok.is_empty()).then(|| converged as f64 / ok.len() as f64),
        mean_utilization: mean(&utilizations),
        std_utilization: sample_std(&utilizations),
        mean_sse: mean(&sses),
    }
}

fn compare(results: &[FitResult]) -> ModelComparison {
    let attractor = sse_by_sample(results, ModelKind::Attractor);
    let baseline = sse_by_sample(results, ModelKind::Baseline);

    // BTreeMap iteration gives pairs in sample-id order.
    let pairs: Vec<(f64, f64)> = attractor
        .iter()
        .filter_map(|(id, &a)| baseline.get(id).map(|&b| (a, b)))
        .collect();

    let sse_a: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let sse_b: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let diffs: Vec<f64> = pairs.iter().map(|(a, b)| b - a).collect();

    let mean_a = mean(&sse_a);
    let mean_b = mean(&sse_b);
    let reduction = match (mean_a, mean_b) {
        (Some(a), Some(b)) if b > 0.0 => Some((b - a) / b * 100.0),
        _ => None,
    };
    let test = paired_t_test(&diffs);

    ModelComparison {
        pairs: pairs.len(),
        mean_sse_attractor: mean_a,
        mean_sse_baseline: mean_b,
        sse_reduction_pct: reduction,
        t_statistic: test.map(|t| t.t),
        p_value: test.map(|t| t.p_value),
        attractor_better: pairs.iter().filter(|(a, b)| a < b).count(),
    }
}

/// Successful SSEs for `kind` keyed by sample id. A repeated id keeps its
/// smallest SSE so the choice does not depend on input order.
fn sse_by_sample(results: &[FitResult], kind: ModelKind) -> BTreeMap<&str, f64> {
    let mut out: BTreeMap<&str, f64> = BTreeMap::new();
    for r in results.iter().filter(|r| r.model_kind == kind && r.fit_succeeded) {
        out.entry(r.sample_id.as_str())
            .and_modify(|v| {
                if r.residual_error.total_cmp(v).is_lt() {
                    *v = r.residual_error;
                }
            })
            .or_insert(r.residual_error);
    }
    out
}
