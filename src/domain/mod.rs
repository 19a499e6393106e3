//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the run configuration (`RunConfig`, `SpectrumSource`)
//! - exported report records (`RunReport`, `SeriesFit`)

pub mod types;

pub use types::*;
