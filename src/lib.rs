//! `xrf-fit` library crate.
//!
//! The binary (`xrf`) is a thin wrapper around this library so that:
//!
//! - the fitting and proposal engine is testable without spawning processes
//! - front-ends other than the CLI can drive `controller::FittingModel`
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod controller;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod peak;
pub mod report;
pub mod search;
pub mod spectrum;
