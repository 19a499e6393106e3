//! Formatted terminal output.
//!
//! Formatting lives in one place so the fitting and search code stays free of
//! presentation concerns.

use crate::controller::FittingModel;
use crate::fit::{FittingParameters, FittingResultSet};
use crate::peak::TransitionSeries;
use crate::search::Guess;
use crate::spectrum::Spectrum;

/// Header describing the spectrum and fitting setup.
pub fn format_run_header(model: &FittingModel) -> String {
    let data = model.data();
    let p = model.parameters();
    let (lo, hi) = p.calibration.energy_range();
    let mut out = String::new();
    out.push_str("=== xrf - peak proposal and fitting ===\n");
    out.push_str(&format!(
        "Spectrum: {} channels | {:.3}-{:.3} keV | total counts {:.0} | max {:.0}\n",
        data.len(),
        lo,
        hi,
        data.sum(),
        data.max()
    ));
    out.push_str(&format!(
        "Fitting: shape={} escape={:?} fwhm_base={:.3} keV | fitter={} solver={} searcher={:?}\n",
        p.shape.display_name(),
        p.escape,
        p.fwhm_base,
        model.fitter().display_name(),
        model.solver().display_name(),
        model.searcher().kind(),
    ));
    out
}

/// Series proposed by an automatic search.
pub fn format_proposals(proposals: &[TransitionSeries], parameters: &FittingParameters) -> String {
    let mut out = String::new();
    if proposals.is_empty() {
        out.push_str("No new series proposed.\n");
        return out;
    }
    out.push_str(&format!("Proposed series ({}):\n", proposals.len()));
    for (i, ts) in proposals.iter().enumerate() {
        let line = ts
            .strongest_transition()
            .map(|t| {
                let channel = parameters
                    .calibration
                    .nearest_channel(t.energy())
                    .map_or_else(|| "-".to_string(), |c| c.to_string());
                format!("{:.3} keV (ch {channel})", t.energy())
            })
            .unwrap_or_default();
        out.push_str(&format!("  {:>2}. {:<16} {:?} {}\n", i + 1, ts.identifier(), ts.mode(), line));
    }
    out
}

/// Table series whose strongest line lies closest to `energy`.
pub fn format_nearest_lines(energy: f64, nearest: &[(TransitionSeries, f64)]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Nearest table lines to {energy:.3} keV:\n"));
    for (ts, distance) in nearest {
        out.push_str(&format!("  {:<16} {:.3} keV away\n", ts.identifier(), distance));
    }
    out
}

/// Ranked guesses for a single channel.
pub fn format_guesses(channel: usize, energy: f64, guesses: &[Guess]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Channel {channel} ({energy:.3} keV):\n"));
    if guesses.is_empty() {
        out.push_str("  no plausible candidates\n");
        return out;
    }
    for (i, (ts, score)) in guesses.iter().enumerate() {
        out.push_str(&format!("  {:>2}. {:<16} score {:.4e}\n", i + 1, ts.identifier(), score));
    }
    out
}

/// Per-series fit table plus residual summary.
pub fn format_fit_summary(results: &FittingResultSet) -> String {
    let mut out = String::new();
    out.push_str("Fits:\n");
    if results.is_empty() {
        out.push_str("  (none)\n");
    }
    for r in results.iter() {
        out.push_str(&format!(
            "  {:<16} scale {:>10.2} | height {:>10.2} | sum {:>12.1}\n",
            r.series().identifier(),
            r.scale(),
            r.intensity(),
            r.fit_sum()
        ));
    }
    let residual = results.residual();
    out.push_str(&format!(
        "Residual: sum {:.1} | max {:.1}\n",
        residual.sum(),
        residual.max()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::FittingResult;
    use std::sync::Arc;

    use crate::peak::{Element, PeakTable, Shell, Transition};
    use crate::spectrum::EnergyCalibration;

    fn fe() -> TransitionSeries {
        let el = Element::from_symbol("Fe").unwrap();
        TransitionSeries::primary(el, Shell::K, vec![Transition::new(6.40, 1.0).unwrap()]).unwrap()
    }

    #[test]
    fn proposals_list_identifiers_and_channels() {
        let params = FittingParameters::new(EnergyCalibration::new(0.0, 20.48, 2048));
        let text = format_proposals(&[fe()], &params);
        assert!(text.contains("Fe:K"));
        assert!(text.contains("ch 640"));
        assert!(format_proposals(&[], &params).contains("No new series"));
    }

    #[test]
    fn header_names_the_strategies() {
        let params = FittingParameters::new(EnergyCalibration::new(0.0, 10.24, 1024));
        let model = FittingModel::new(Spectrum::zeros(1024), params, Arc::new(PeakTable::builtin()));
        let text = format_run_header(&model);
        assert!(text.contains("1024 channels"));
        assert!(text.contains("fitter=under-curve solver=greedy"));
    }

    #[test]
    fn guesses_are_numbered_in_order() {
        let text = format_guesses(640, 6.4, &[(fe(), 0.9)]);
        assert!(text.starts_with("Channel 640 (6.400 keV)"));
        assert!(text.contains(" 1. Fe:K"));
        assert!(format_guesses(3, 0.03, &[]).contains("no plausible candidates"));
    }

    #[test]
    fn fit_summary_lists_every_series() {
        let data = Spectrum::new(vec![3.0, 5.0]);
        let r = FittingResult::new(fe(), Spectrum::new(vec![1.0, 4.0]), 5.0, 4.0);
        let set = FittingResultSet::from_results(&data, vec![r]);
        let text = format_fit_summary(&set);
        assert!(text.contains("Fe:K"));
        assert!(text.contains("Residual: sum 3.0 | max 2.0"));
    }
}
