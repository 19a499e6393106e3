//! Mathematical utilities: peak shapes and least squares.

pub mod ols;
pub mod shape;

pub use ols::*;
pub use shape::*;

/// Map NaN / infinite values to `0`.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
