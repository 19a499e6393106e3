//! Least squares solvers.
//!
//! The joint fitting solver regresses the spectrum on one column per transition
//! series (that series' unit-scale model curve):
//!
//! ```text
//! minimize Σ_i (y_i - x_i^T β)^2    subject to β ≥ 0
//! ```
//!
//! Implementation choices:
//! - SVD solve, since the design matrix is tall (channels ≫ series) and overlapping
//!   series can make columns nearly collinear.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Non-negativity via a small active-set loop: drop the most negative
//!   coefficient, re-solve with the remaining columns, repeat. A subsystem the
//!   SVD cannot resolve loses its weakest column and is re-solved the same way.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.ncols() == 0 || x.nrows() != y.len() {
        return None;
    }
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Least squares with every coefficient constrained to `≥ 0`.
///
/// Columns that are entirely zero or contain non-finite values, and columns
/// dropped while the solver cannot resolve the system, get a coefficient of `0`
/// instead of failing the whole system. The result always has one entry per
/// column of `x`.
pub fn solve_non_negative(x: &DMatrix<f64>, y: &DVector<f64>) -> Vec<f64> {
    let mut beta = vec![0.0; x.ncols()];
    if x.nrows() != y.len() {
        return beta;
    }

    let mut active: Vec<usize> = (0..x.ncols())
        .filter(|&j| {
            let col = x.column(j);
            col.iter().all(|v| v.is_finite()) && col.iter().any(|v| *v != 0.0)
        })
        .collect();

    while !active.is_empty() {
        let sub = x.select_columns(active.iter());
        let Some(solution) = solve_least_squares(&sub, y) else {
            let weakest = (0..active.len())
                .min_by(|&a, &b| sub.column(a).norm().total_cmp(&sub.column(b).norm()))
                .unwrap_or(0);
            active.remove(weakest);
            continue;
        };

        let most_negative = solution
            .iter()
            .enumerate()
            .filter(|(_, v)| **v < 0.0)
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i);

        match most_negative {
            Some(i) => {
                active.remove(i);
            }
            None => {
                for (k, &j) in active.iter().enumerate() {
                    beta[j] = solution[k];
                }
                break;
            }
        }
    }

    beta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn non_negative_drops_negative_columns() {
        // y is exactly 2 * col0; col1 would only fit with a negative weight.
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 2.0, 1.0, 1.0, 3.0, 0.0, 1.0]);
        let y = DVector::from_row_slice(&[2.0, 4.0, 2.0, -0.5]);
        let beta = solve_non_negative(&x, &y);
        assert_eq!(beta.len(), 2);
        assert!(beta.iter().all(|b| *b >= 0.0));
        assert_eq!(beta[1], 0.0);
    }

    #[test]
    fn zero_columns_get_zero_weight() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let y = DVector::from_row_slice(&[2.0, 4.0, 6.0]);
        let beta = solve_non_negative(&x, &y);
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert_eq!(beta[1], 0.0);
    }

    #[test]
    fn non_finite_column_does_not_zero_the_rest() {
        let x = DMatrix::from_row_slice(3, 3, &[1.0, 5.0, 0.0, 2.0, f64::NAN, 1.0, 3.0, 1.0, 0.0]);
        let y = DVector::from_row_slice(&[2.0, 7.0, 6.0]);
        let beta = solve_non_negative(&x, &y);
        assert_eq!(beta[1], 0.0);
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[2] - 3.0).abs() < 1e-10);
    }
}
