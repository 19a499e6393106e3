//! Shared pipeline logic used by every subcommand.
//!
//! spectrum load/generation -> peak table -> fitting model -> proposals/fits -> report
//!
//! The command handlers in `app` only decide what to print.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::controller::FittingModel;
use crate::data::{SyntheticConfig, generate_spectrum};
use crate::domain::{RunConfig, RunReport, SeriesFit, SpectrumSource};
use crate::error::AppError;
use crate::fit::FittingParameters;
use crate::peak::{PeakTable, TransitionSeries};
use crate::search::{PeakSearcher, ProgressEvent, ProposalOutcome, SearcherKind};
use crate::spectrum::{EnergyCalibration, Spectrum};

/// Local-maximum threshold as a fraction of the tallest channel.
const LOCAL_MAXIMUM_FRACTION: f64 = 0.02;

/// Built-in table unless a peak-table file is configured.
pub fn load_registry(config: &RunConfig) -> Result<Arc<PeakTable>, AppError> {
    let table = match &config.peak_table {
        Some(path) => crate::io::read_peak_table(path)?,
        None => PeakTable::builtin(),
    };
    if table.is_empty() {
        return Err(AppError::empty_data("Peak table contains no series."));
    }
    Ok(Arc::new(table))
}

/// Load or generate the spectrum. File input keeps the configured energy range
/// but takes its channel count from the file.
pub fn load_spectrum(config: &RunConfig, registry: &PeakTable) -> Result<(Spectrum, FittingParameters), AppError> {
    let mut parameters = config.parameters.clone();
    match &config.source {
        SpectrumSource::File(path) => {
            let data = crate::io::read_spectrum(path)?;
            let cal = parameters.calibration;
            parameters.calibration = EnergyCalibration::new(cal.min_energy(), cal.max_energy(), data.len());
            info!(path = %path.display(), channels = data.len(), "loaded spectrum");
            Ok((data, parameters))
        }
        SpectrumSource::Synthetic {
            elements,
            seed,
            height,
            background,
            noise,
        } => {
            let components = elements
                .iter()
                .map(|id| registry.from_identifier(id).map(|ts| (ts, *height)))
                .collect::<Result<Vec<_>, _>>()?;
            let synthetic = generate_spectrum(&SyntheticConfig {
                parameters: parameters.clone(),
                components,
                background: *background,
                seed: *seed,
                noise: *noise,
            })?;
            info!(seed, series = elements.len(), "generated synthetic spectrum");
            Ok((synthetic.spectrum, parameters))
        }
    }
}

pub fn searcher_for(kind: SearcherKind, data: &Spectrum) -> PeakSearcher {
    match kind {
        SearcherKind::Derivative => PeakSearcher::derivative(),
        SearcherKind::LocalMaximum => PeakSearcher::local_maximum((data.max() * LOCAL_MAXIMUM_FRACTION).max(1.0)),
    }
}

/// Parse a list of identifiers against the registry.
pub fn resolve_series(registry: &PeakTable, identifiers: &[String]) -> Result<Vec<TransitionSeries>, AppError> {
    identifiers.iter().map(|id| registry.from_identifier(id)).collect()
}

/// Model with the spectrum, strategies and pre-selected series of `config`.
pub fn build_model(config: &RunConfig) -> Result<FittingModel, AppError> {
    if !(config.parameters.fwhm_base.is_finite() && config.parameters.fwhm_base > 0.0) {
        return Err(AppError::invalid_input("FWHM base must be finite and > 0."));
    }
    let registry = load_registry(config)?;
    let (data, parameters) = load_spectrum(config, &registry)?;
    if data.is_empty() {
        return Err(AppError::empty_data("Spectrum contains no channels."));
    }
    let searcher = searcher_for(config.searcher, &data);
    let mut model = FittingModel::new(data, parameters, Arc::clone(&registry)).with_strategies(
        config.fitter,
        config.solver,
        searcher,
    );
    for ts in resolve_series(&registry, &config.selected)? {
        model.add_selection(ts)?;
    }
    debug!(selected = model.selections().len(), "fitting model ready");
    Ok(model)
}

/// Run an automatic search on a worker thread, forwarding progress until the
/// job finishes.
pub fn run_detect(model: &FittingModel, mut on_event: impl FnMut(&ProgressEvent)) -> Result<ProposalOutcome, AppError> {
    let job = model.autodetect()?;
    for event in job.events().iter() {
        on_event(&event);
        if matches!(event, ProgressEvent::Finished(_)) {
            break;
        }
    }
    Ok(job.wait())
}

/// Snapshot of the model's fits. Proposals are reported after the selections
/// they were fitted on top of.
pub fn build_report(model: &mut FittingModel, proposals: &[TransitionSeries], committed: bool) -> RunReport {
    let selected = model.selection_results();
    let proposed = model.proposal_results();
    let mut fits = SeriesFit::from_results(&selected);
    fits.extend(SeriesFit::from_results(&proposed));
    RunReport {
        tool: format!("xrf {}", env!("CARGO_PKG_VERSION")),
        generated_at: Utc::now(),
        channels: model.data().len(),
        parameters: model.parameters().clone(),
        fitter: model.fitter(),
        solver: model.solver(),
        searcher: model.searcher().kind(),
        proposals: proposals.iter().map(TransitionSeries::identifier).collect(),
        committed,
        fits,
        residual_sum: proposed.residual().sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{CurveFitter, FittingSolver};

    fn synthetic_config(elements: &[&str]) -> RunConfig {
        RunConfig {
            source: SpectrumSource::Synthetic {
                elements: elements.iter().map(|s| s.to_string()).collect(),
                seed: 7,
                height: 1500.0,
                background: 0.0,
                noise: false,
            },
            peak_table: None,
            parameters: FittingParameters::new(EnergyCalibration::new(0.0, 20.48, 2048)),
            fitter: CurveFitter::UnderCurve,
            solver: FittingSolver::Greedy,
            searcher: SearcherKind::Derivative,
            selected: Vec::new(),
            export: None,
        }
    }

    #[test]
    fn detect_finds_the_rendered_series() {
        let mut model = build_model(&synthetic_config(&["Fe:K"])).unwrap();
        let mut events = 0;
        let outcome = run_detect(&model, |_| events += 1).unwrap();
        let found = outcome.proposals().unwrap().to_vec();
        assert_eq!(found.iter().map(|ts| ts.identifier()).collect::<Vec<_>>(), vec!["Fe:K"]);
        assert!(events >= 3);

        for ts in &found {
            model.add_proposal(ts.clone()).unwrap();
        }
        let report = build_report(&mut model, &found, false);
        assert_eq!(report.proposals, vec!["Fe:K"]);
        assert_eq!(report.fits.len(), 1);
        assert!(report.fits[0].intensity > 1000.0);
    }

    #[test]
    fn unknown_series_are_rejected() {
        let err = build_model(&synthetic_config(&["Xx:K"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let mut config = synthetic_config(&["Fe:K"]);
        config.selected = vec!["Fe:Q".to_string()];
        assert_eq!(build_model(&config).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn local_maximum_threshold_tracks_the_data() {
        let data = Spectrum::new(vec![0.0, 500.0, 0.0]);
        match searcher_for(SearcherKind::LocalMaximum, &data) {
            PeakSearcher::LocalMaximum { threshold, .. } => assert!((threshold - 10.0).abs() < 1e-12),
            other => panic!("unexpected searcher {other:?}"),
        }
        assert_eq!(searcher_for(SearcherKind::Derivative, &data), PeakSearcher::derivative());
    }
}
