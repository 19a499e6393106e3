//! Reporting utilities: plain-text summaries of proposals and fits.

pub mod format;

pub use format::*;
