//! Multi-series solvers.
//!
//! A solver fits every series of a `FittingSet` against one spectrum and returns
//! the fitted curves together with the residual. Solvers are pure: they never
//! touch the set or the spectrum they are given, keep no state between calls, and
//! produce identical output for identical input.
//!
//! - `Greedy` walks the set in insertion order, fitting each series against the
//!   running residual and subtracting it before moving on. Earlier series claim
//!   shared signal first; callers use set order to express priority.
//! - `LeastSquares` regresses the spectrum on all unit-scale curves at once
//!   (non-negative, SVD-based), so the outcome does not depend on set order. It
//!   does not use the per-series curve fitter.

use clap::ValueEnum;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::fit::fitter::CurveFitter;
use crate::fit::set::{FittingResult, FittingResultSet, FittingSet};
use crate::math::{finite_or_zero, solve_non_negative};
use crate::models::Curve;
use crate::spectrum::Spectrum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FittingSolver {
    Greedy,
    LeastSquares,
}

impl FittingSolver {
    pub fn display_name(self) -> &'static str {
        match self {
            FittingSolver::Greedy => "greedy",
            FittingSolver::LeastSquares => "least-squares",
        }
    }

    pub fn solve(self, data: &Spectrum, set: &FittingSet, fitter: CurveFitter) -> FittingResultSet {
        if set.is_empty() {
            return FittingResultSet::from_results(data, Vec::new());
        }
        let results = match self {
            FittingSolver::Greedy => solve_greedy(data, set, fitter),
            FittingSolver::LeastSquares => solve_joint(data, set),
        };
        FittingResultSet::from_results(data, results)
    }
}

fn solve_greedy(data: &Spectrum, set: &FittingSet, fitter: CurveFitter) -> Vec<FittingResult> {
    let params = set.parameters();
    let mut residual = data.to_builder();
    let mut results = Vec::with_capacity(set.len());
    for ts in set.iter() {
        let curve = Curve::new(ts, params, data.len());
        let result = fitter.fit_curve(&curve, residual.values_mut());
        residual.subtract(result.curve());
        trace!(series = %ts, scale = result.scale(), "greedy fit");
        results.push(result);
    }
    results
}

fn solve_joint(data: &Spectrum, set: &FittingSet) -> Vec<FittingResult> {
    let params = set.parameters();
    let n = data.len();
    let curves: Vec<Curve> = set.iter().map(|ts| Curve::new(ts, params, n)).collect();

    let mut x = DMatrix::<f64>::zeros(n, curves.len());
    for (j, curve) in curves.iter().enumerate() {
        for (i, v) in curve.values().iter().enumerate() {
            x[(i, j)] = v;
        }
    }
    let y = DVector::<f64>::from_iterator(n, data.iter().map(finite_or_zero));

    let scales = solve_non_negative(&x, &y);
    curves
        .iter()
        .zip(scales)
        .map(|(curve, scale)| {
            let scale = finite_or_zero(scale).max(0.0);
            if scale == 0.0 {
                trace!(series = %curve.series(), "joint fit dropped series");
            }
            let fitted = curve.scaled(scale);
            let total = finite_or_zero(fitted.sum());
            FittingResult::new(curve.series().clone(), fitted, total, scale)
        })
        .collect()
}
