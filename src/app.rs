//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - loads or generates the spectrum
//! - runs peak proposal or fitting
//! - prints reports and writes optional exports

use std::io::Write;

use clap::Parser;
use tracing::info;

use crate::cli::{Command, DetectArgs, FitArgs, ProposeArgs, SpectrumArgs};
use crate::domain::{RunConfig, SpectrumSource};
use crate::error::AppError;
use crate::fit::FittingParameters;
use crate::logging::{LogConfig, init_logging};
use crate::search::ProgressEvent;
use crate::spectrum::EnergyCalibration;

pub mod pipeline;

/// Number of nearest table series listed by `xrf propose`.
const NEAREST_LINES_SHOWN: usize = 3;

/// Entry point for the `xrf` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(&LogConfig {
        level: cli.log_level,
        format: cli.log_format,
        filter: None,
    });

    match cli.command {
        Command::Detect(args) => handle_detect(args),
        Command::Propose(args) => handle_propose(args),
        Command::Fit(args) => handle_fit(args),
    }
}

fn handle_detect(args: DetectArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args.spectrum, args.export.clone())?;
    let mut model = pipeline::build_model(&config)?;
    println!("{}", crate::report::format_run_header(&model));

    let outcome = pipeline::run_detect(&model, print_progress)?;
    eprintln!();
    let Some(found) = outcome.proposals().map(|fits| fits.to_vec()) else {
        return Err(AppError::compute("Peak proposal was aborted."));
    };
    println!("{}", crate::report::format_proposals(&found, model.parameters()));

    for ts in &found {
        model.add_proposal(ts.clone())?;
    }
    if args.commit {
        let committed = model.commit_proposals()?;
        info!(committed, "committed proposals");
        println!("{}", crate::report::format_fit_summary(&model.selection_results()));
    }

    if let Some(path) = &config.export {
        let report = pipeline::build_report(&mut model, &found, args.commit);
        crate::io::write_report_json(path, &report)?;
        println!("Wrote report to {}", path.display());
    }
    Ok(())
}

fn handle_propose(args: ProposeArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args.spectrum, None)?;
    let mut model = pipeline::build_model(&config)?;
    if args.channel >= model.data().len() {
        return Err(AppError::invalid_input(format!(
            "Channel {} is outside the spectrum (0..{}).",
            args.channel,
            model.data().len()
        )));
    }
    let current = match &args.current {
        Some(id) => {
            let ts = model.registry().from_identifier(id)?;
            model.add_proposal(ts.clone())?;
            Some(ts)
        }
        None => None,
    };

    println!("{}", crate::report::format_run_header(&model));
    let energy = model.parameters().calibration.energy_from_channel(args.channel as f64);
    let guesses = model.propose_from_channel(args.channel, current.as_ref());
    println!("{}", crate::report::format_guesses(args.channel, energy, &guesses));

    let mut nearest = model.registry().nearest_to_energy(energy);
    nearest.truncate(NEAREST_LINES_SHOWN);
    println!("{}", crate::report::format_nearest_lines(energy, &nearest));
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let mut config = run_config_from_args(&args.spectrum, args.export.clone())?;
    config.selected.extend(args.series.iter().cloned());
    let mut model = pipeline::build_model(&config)?;
    println!("{}", crate::report::format_run_header(&model));
    println!("{}", crate::report::format_fit_summary(&model.selection_results()));

    if let Some(path) = &config.export {
        let report = pipeline::build_report(&mut model, &[], false);
        crate::io::write_report_json(path, &report)?;
        println!("Wrote report to {}", path.display());
    }
    Ok(())
}

fn print_progress(event: &ProgressEvent) {
    let mut err = std::io::stderr();
    let _ = match event {
        ProgressEvent::StageStarted { stage, .. } => write!(err, "\n{}...", stage.name()),
        ProgressEvent::UnitCompleted {
            stage,
            completed,
            work_units,
        } => write!(err, "\r{}... {completed}/{work_units}", stage.name()),
        ProgressEvent::Finished(state) => write!(err, "\nDone: {state:?}"),
    };
    let _ = err.flush();
}

fn run_config_from_args(args: &SpectrumArgs, export: Option<std::path::PathBuf>) -> Result<RunConfig, AppError> {
    if args.channels == 0 {
        return Err(AppError::invalid_input("--channels must be > 0."));
    }
    if !(args.min_energy.is_finite() && args.max_energy.is_finite() && args.max_energy > args.min_energy) {
        return Err(AppError::invalid_input("--max-energy must be greater than --min-energy."));
    }
    if !(args.height.is_finite() && args.height >= 0.0) {
        return Err(AppError::invalid_input("--height must be >= 0."));
    }

    let source = match &args.input {
        Some(path) => SpectrumSource::File(path.clone()),
        None => SpectrumSource::Synthetic {
            elements: args.elements.clone(),
            seed: args.seed,
            height: args.height,
            background: args.background,
            noise: !args.no_noise,
        },
    };
    let parameters = FittingParameters::new(EnergyCalibration::new(args.min_energy, args.max_energy, args.channels))
        .with_shape(args.shape)
        .with_escape(args.escape)
        .with_fwhm_base(args.fwhm_base);

    Ok(RunConfig {
        source,
        peak_table: args.peak_table.clone(),
        parameters,
        fitter: args.fitter,
        solver: args.solver,
        searcher: args.searcher,
        selected: args.select.clone(),
        export,
    })
}
