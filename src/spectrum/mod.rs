//! Spectral data types: channel intensities and the channel ↔ energy mapping.

pub mod calibration;
pub mod buffer;

pub use calibration::*;
pub use buffer::*;
