//! Read/write run report JSON files.
//!
//! A report is the portable record of one run:
//! - fitting parameters and strategies
//! - proposals (by identifier) in acceptance order
//! - per-series fit sums and the leftover residual
//!
//! The schema is defined by `domain::RunReport`.

use std::fs::File;
use std::path::Path;

use crate::domain::RunReport;
use crate::error::AppError;

pub fn write_report_json(path: &Path, report: &RunReport) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::compute(format!("Failed to create report JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::compute(format!("Failed to write report JSON: {e}")))?;
    Ok(())
}

pub fn read_report_json(path: &Path) -> Result<RunReport, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::invalid_input(format!("Failed to open report JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::invalid_input(format!("Invalid report JSON: {e}")))
}
