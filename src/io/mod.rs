//! Input/output helpers.
//!
//! - plain-text spectra and peak-table JSON (`spectrum`)
//! - run report JSON read/write (`report`)

pub mod report;
pub mod spectrum;

pub use report::*;
pub use spectrum::*;
