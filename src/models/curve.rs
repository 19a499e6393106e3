//! Model curves for transition series.
//!
//! A model curve is the series' line pattern rendered on the channel axis at unit
//! scale: every line (plus its detector escape peaks) contributes
//! `relative_intensity * shape(E_channel - E_line, FWHM(E_line))`. Fitting only
//! ever chooses a single scale factor for this curve.
//!
//! The curve also records its "intense" channels, the channels where the curve
//! reaches at least `INTENSE_FRACTION` of its maximum. Under-curve fitting and the
//! fit-quality scorers only look at those channels; far tails carry no
//! information about the series.

use crate::fit::FittingParameters;
use crate::peak::{Transition, TransitionSeries};
use crate::spectrum::Spectrum;

/// Fraction of the curve maximum above which a channel counts as intense.
pub const INTENSE_FRACTION: f64 = 0.05;

/// A series' unit-scale curve over a fixed number of channels.
#[derive(Debug, Clone)]
pub struct Curve {
    series: TransitionSeries,
    values: Spectrum,
    intense_channels: Vec<usize>,
}

impl Curve {
    pub fn new(series: &TransitionSeries, parameters: &FittingParameters, channels: usize) -> Self {
        let lines = modelled_lines(series, parameters);
        let calibration = &parameters.calibration;

        let mut values = vec![0.0; channels];
        if !calibration.is_zero() {
            for (i, slot) in values.iter_mut().enumerate() {
                let energy = calibration.energy_from_channel(i as f64);
                *slot = lines
                    .iter()
                    .map(|line| line_value(parameters, line, energy))
                    .sum();
            }
        }

        let max = values.iter().copied().fold(0.0, f64::max);
        let intense_channels = if max > 0.0 {
            values
                .iter()
                .enumerate()
                .filter(|(_, v)| **v >= max * INTENSE_FRACTION)
                .map(|(i, _)| i)
                .collect()
        } else {
            Vec::new()
        };

        Self {
            series: series.clone(),
            values: Spectrum::new(values),
            intense_channels,
        }
    }

    pub fn series(&self) -> &TransitionSeries {
        &self.series
    }

    /// Unit-scale curve values.
    pub fn values(&self) -> &Spectrum {
        &self.values
    }

    pub fn intense_channels(&self) -> &[usize] {
        &self.intense_channels
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The curve multiplied by `scale`.
    pub fn scaled(&self, scale: f64) -> Spectrum {
        Spectrum::new(self.values.iter().map(|v| v * scale).collect())
    }
}

/// The series' lines plus any escape peaks implied by the parameters.
pub fn modelled_lines(series: &TransitionSeries, parameters: &FittingParameters) -> Vec<Transition> {
    let mut lines: Vec<Transition> = series.transitions().to_vec();
    let escape = parameters.escape;
    for t in series.transitions() {
        if t.energy() <= escape.edge() {
            continue;
        }
        for &(lost, ratio) in escape.lines() {
            if let Ok(line) = Transition::new(t.energy() - lost, t.relative_intensity() * ratio) {
                lines.push(line);
            }
        }
    }
    lines
}

/// Contribution of one line at `energy`.
pub fn line_value(parameters: &FittingParameters, line: &Transition, energy: f64) -> f64 {
    let fwhm = parameters.fwhm_for(line);
    line.relative_intensity() * parameters.shape.value(energy - line.energy(), fwhm, parameters.lorentz_fwhm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::EscapeKind;
    use crate::peak::{Element, Shell};
    use crate::spectrum::EnergyCalibration;

    fn single_line(energy: f64) -> TransitionSeries {
        let el = Element::from_symbol("Fe").unwrap();
        TransitionSeries::primary(el, Shell::K, vec![Transition::new(energy, 1.0).unwrap()]).unwrap()
    }

    #[test]
    fn curve_peaks_at_line_channel() {
        let params = FittingParameters::new(EnergyCalibration::new(0.0, 20.48, 2048));
        let curve = Curve::new(&single_line(6.40), &params, 2048);
        assert_eq!(curve.values().max_channel(), Some(640));
        assert!((curve.values().get(640) - 1.0).abs() < 1e-9);
        assert!(curve.intense_channels().contains(&640));
        assert!(!curve.intense_channels().contains(&100));
    }

    #[test]
    fn zero_calibration_gives_empty_curve() {
        let params = FittingParameters::default();
        let curve = Curve::new(&single_line(6.40), &params, 128);
        assert_eq!(curve.values().sum(), 0.0);
        assert!(curve.intense_channels().is_empty());
    }

    #[test]
    fn escape_peaks_are_added_above_the_edge() {
        let params = FittingParameters::new(EnergyCalibration::new(0.0, 20.48, 2048))
            .with_escape(EscapeKind::Silicon);
        let lines = modelled_lines(&single_line(6.40), &params);
        assert_eq!(lines.len(), 2);
        assert!((lines[1].energy() - 4.66).abs() < 1e-9);

        let low = modelled_lines(&single_line(1.5), &params);
        assert_eq!(low.len(), 1);
    }
}
