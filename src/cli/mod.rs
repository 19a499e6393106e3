//! Command-line parsing for the XRF peak proposal tool.
//!
//! Argument parsing and command dispatch stay separate from the fitting and
//! search code; the app layer turns these structs into a `RunConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::fit::{CurveFitter, DEFAULT_FWHM_BASE, EscapeKind, FittingSolver};
use crate::logging::{LogFormat, LogLevel};
use crate::math::PeakShape;
use crate::search::SearcherKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "xrf", version, about = "XRF peak proposal and fitting")]
pub struct Cli {
    /// Diagnostic log level (overridden by RUST_LOG).
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Diagnostic log format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search the whole spectrum for unexplained peaks and propose series for them.
    Detect(DetectArgs),
    /// Rank candidate series for a single channel.
    Propose(ProposeArgs),
    /// Fit a fixed list of series and print the fit table.
    Fit(FitArgs),
}

/// Spectrum source, calibration and fitting options shared by every command.
#[derive(Debug, Args, Clone)]
pub struct SpectrumArgs {
    /// Plain-text counts file. Without it a synthetic spectrum is generated.
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Peak-table JSON replacing the built-in table.
    #[arg(long, value_name = "JSON")]
    pub peak_table: Option<PathBuf>,

    /// Series rendered into the synthetic spectrum (comma separated).
    #[arg(long, value_delimiter = ',', default_value = "Fe:K,Cu:K,Ca:K")]
    pub elements: Vec<String>,

    /// Random seed for synthetic noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Peak height (counts) of each synthetic series.
    #[arg(long, default_value_t = 2000.0)]
    pub height: f64,

    /// Synthetic continuum level at 0 keV (counts per channel).
    #[arg(long, default_value_t = 20.0)]
    pub background: f64,

    /// Render the synthetic spectrum without Poisson noise.
    #[arg(long)]
    pub no_noise: bool,

    /// Number of channels (ignored for file input, which sets its own length).
    #[arg(long, default_value_t = 2048)]
    pub channels: usize,

    /// Energy (keV) at the start of channel 0.
    #[arg(long, default_value_t = 0.0)]
    pub min_energy: f64,

    /// Energy (keV) at the end of the last channel.
    #[arg(long, default_value_t = 20.48)]
    pub max_energy: f64,

    /// Electronic-noise FWHM term (keV).
    #[arg(long, default_value_t = DEFAULT_FWHM_BASE)]
    pub fwhm_base: f64,

    #[arg(long, value_enum, default_value_t = PeakShape::Gaussian)]
    pub shape: PeakShape,

    #[arg(long, value_enum, default_value_t = EscapeKind::None)]
    pub escape: EscapeKind,

    #[arg(long, value_enum, default_value_t = CurveFitter::UnderCurve)]
    pub fitter: CurveFitter,

    #[arg(long, value_enum, default_value_t = FittingSolver::Greedy)]
    pub solver: FittingSolver,

    #[arg(long, value_enum, default_value_t = SearcherKind::Derivative)]
    pub searcher: SearcherKind,

    /// Series already fitted before anything is proposed (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct DetectArgs {
    #[command(flatten)]
    pub spectrum: SpectrumArgs,

    /// Add the proposals to the selections and print the resulting fit.
    #[arg(long)]
    pub commit: bool,

    /// Write a JSON run report.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ProposeArgs {
    #[command(flatten)]
    pub spectrum: SpectrumArgs,

    /// Channel to explain.
    #[arg(long)]
    pub channel: usize,

    /// Proposal being replaced (e.g. `Fe:K`); it is re-offered among the guesses.
    #[arg(long)]
    pub current: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub spectrum: SpectrumArgs,

    /// Series to fit, in fitting order (comma separated, `+` joins pile-up components).
    #[arg(long, value_delimiter = ',', required = true)]
    pub series: Vec<String>,

    /// Write a JSON run report.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn detect_parses_shared_flags() {
        let cli = Cli::parse_from([
            "xrf",
            "detect",
            "--elements",
            "Fe:K,Zn:K",
            "--solver",
            "least-squares",
            "--commit",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.log_level, LogLevel::Debug);
        let Command::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        assert!(args.commit);
        assert_eq!(args.spectrum.elements, vec!["Fe:K", "Zn:K"]);
        assert_eq!(args.spectrum.solver, FittingSolver::LeastSquares);
        assert!(args.spectrum.input.is_none());
    }

    #[test]
    fn fit_requires_series() {
        assert!(Cli::try_parse_from(["xrf", "fit"]).is_err());
        let cli = Cli::try_parse_from(["xrf", "fit", "--series", "Fe:K,Fe:K+Ca:K"]).unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.series, vec!["Fe:K", "Fe:K+Ca:K"]);
    }
}
