//! Linear least squares solver.
//!
//! Every Levenberg–Marquardt iteration solves a small damped linear problem
//!
//! ```text
//! minimize ‖J δ + r‖² + λ ‖D δ‖²
//! ```
//!
//! which we express as one stacked, tall least-squares system
//! `[J; √λ D] δ = [-r; 0]` and hand to this module.
//!
//! Implementation choices:
//! - SVD so tall (more rows than columns) and rank-deficient systems are both
//!   handled; `QR::solve` is intended for square systems.
//! - Parameter counts are tiny (2–3 columns), so SVD cost is negligible next to
//!   evaluating the model.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Singular values below `rcond × σ_max` are treated as zero. The cutoff is
/// relative because Jacobian columns carry the units of their parameter (a
/// capacity column can be orders of magnitude larger than a rate column).
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    let sigma_max = svd.singular_values.max();
    if !(sigma_max.is_finite() && sigma_max > 0.0) {
        return None;
    }

    // Retry with a looser cutoff if the strict solve yields garbage.
    for rcond in RCOND_LADDER {
        let Ok(beta) = svd.solve(y, rcond * sigma_max) else {
            continue;
        };
        if beta.iter().all(|v| v.is_finite()) {
            return Some(beta);
        }
    }

    None
}

const RCOND_LADDER: [f64; 3] = [1e-14, 1e-12, 1e-10];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_line_is_recovered() {
        // Points on y = 1 - 0.5 t with unequal spacing.
        let t = [0.0, 0.5, 2.0, 3.5];
        let x = DMatrix::from_fn(4, 2, |i, j| if j == 0 { 1.0 } else { t[i] });
        let y = DVector::from_iterator(4, t.iter().map(|ti| 1.0 - 0.5 * ti));

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-12, "{beta}");
        assert!((beta[1] + 0.5).abs() < 1e-12, "{beta}");
    }

    #[test]
    fn stacked_damping_rows_shrink_the_step() {
        // y = 2 + 3x on x = [0, 1, 2], plus two damping rows (λ = 1, D = I).
        let x = DMatrix::from_row_slice(
            5,
            2,
            &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 0.0, 0.0, 1.0],
        );
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0, 0.0, 0.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!(beta[1] > 0.0 && beta[1] < 3.0);
    }

    #[test]
    fn zero_matrix_is_unsolvable() {
        let x = DMatrix::<f64>::zeros(3, 2);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert!(solve_least_squares(&x, &y).is_none());
    }
}
