//! Data sources.
//!
//! - seeded synthetic spectra for demos and tests (`synthetic`)

pub mod synthetic;

pub use synthetic::*;
