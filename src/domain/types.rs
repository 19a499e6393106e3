//! Shared run-level types.
//!
//! These types are kept plain and serializable so they can be:
//!
//! - built from CLI flags
//! - passed through the pipeline without dragging clap along
//! - exported to JSON and reloaded later

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fit::{CurveFitter, FittingParameters, FittingResultSet, FittingSolver};
use crate::search::SearcherKind;

/// Where the spectrum comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SpectrumSource {
    /// Plain-text counts file.
    File(PathBuf),
    /// Seeded synthetic spectrum built from peak-table series.
    Synthetic {
        /// Series identifiers, e.g. `Fe:K`.
        elements: Vec<String>,
        seed: u64,
        /// Peak height (counts) of each rendered series.
        height: f64,
        /// Continuum level at 0 keV.
        background: f64,
        noise: bool,
    },
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: SpectrumSource,
    /// Optional peak-table JSON replacing the built-in table.
    pub peak_table: Option<PathBuf>,
    pub parameters: FittingParameters,
    pub fitter: CurveFitter,
    pub solver: FittingSolver,
    pub searcher: SearcherKind,
    /// Series fitted before anything is proposed.
    pub selected: Vec<String>,
    pub export: Option<PathBuf>,
}

/// One fitted series in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesFit {
    pub series: String,
    pub scale: f64,
    pub fit_sum: f64,
    pub intensity: f64,
}

impl SeriesFit {
    pub fn from_results(results: &FittingResultSet) -> Vec<SeriesFit> {
        results
            .iter()
            .map(|r| SeriesFit {
                series: r.series().identifier(),
                scale: r.scale(),
                fit_sum: r.fit_sum(),
                intensity: r.intensity(),
            })
            .collect()
    }
}

/// JSON export of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub channels: usize,
    pub parameters: FittingParameters,
    pub fitter: CurveFitter,
    pub solver: FittingSolver,
    pub searcher: SearcherKind,
    /// Proposed series identifiers, in acceptance order.
    pub proposals: Vec<String>,
    /// Whether the proposals were committed before fitting.
    pub committed: bool,
    pub fits: Vec<SeriesFit>,
    /// Sum of the residual after all fits.
    pub residual_sum: f64,
}
