//! Curve fitting.
//!
//! Responsibilities:
//!
//! - hold fitting parameters (calibration, peak shape, detector widths)
//! - fit a single series' model curve against a spectrum
//! - keep ordered fitting sets and their results
//! - fit whole sets (greedy or joint least squares)

pub mod fitter;
pub mod params;
pub mod set;
pub mod solver;

pub use fitter::*;
pub use params::*;
pub use set::*;
pub use solver::*;
