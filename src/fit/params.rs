//! Parameters shared by every curve in a fitting run.

use std::hash::{Hash, Hasher};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::math::{FWHM_PER_SIGMA, PeakShape};
use crate::peak::Transition;
use crate::spectrum::EnergyCalibration;

/// Fano factor of a silicon detector.
const FANO_SI: f64 = 0.114;

/// Mean energy (keV) to create one electron-hole pair in silicon.
const PAIR_ENERGY_SI: f64 = 0.00376;

/// Default electronic-noise FWHM term (keV).
pub const DEFAULT_FWHM_BASE: f64 = 0.080;

/// Default natural (Lorentzian) line width used by the Voigt shape (keV).
pub const DEFAULT_LORENTZ_FWHM: f64 = 0.004;

/// Detector escape peaks added to every modelled line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EscapeKind {
    None,
    Silicon,
    Germanium,
}

impl EscapeKind {
    /// Absorption edge (keV) a line must exceed to produce escape peaks.
    pub fn edge(self) -> f64 {
        match self {
            EscapeKind::None => f64::INFINITY,
            EscapeKind::Silicon => 1.839,
            EscapeKind::Germanium => 11.103,
        }
    }

    /// Escaping fluorescence lines: (energy lost in keV, intensity ratio).
    pub fn lines(self) -> &'static [(f64, f64)] {
        match self {
            EscapeKind::None => &[],
            EscapeKind::Silicon => &[(1.740, 0.012)],
            EscapeKind::Germanium => &[(9.886, 0.08), (10.982, 0.012)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittingParameters {
    pub calibration: EnergyCalibration,
    pub shape: PeakShape,
    pub escape: EscapeKind,
    /// Electronic-noise contribution to the FWHM (keV).
    pub fwhm_base: f64,
    /// Natural line width for the Voigt shape (keV).
    pub lorentz_fwhm: f64,
}

impl FittingParameters {
    pub fn new(calibration: EnergyCalibration) -> Self {
        Self {
            calibration,
            shape: PeakShape::Gaussian,
            escape: EscapeKind::None,
            fwhm_base: DEFAULT_FWHM_BASE,
            lorentz_fwhm: DEFAULT_LORENTZ_FWHM,
        }
    }

    pub fn with_shape(mut self, shape: PeakShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_escape(mut self, escape: EscapeKind) -> Self {
        self.escape = escape;
        self
    }

    pub fn with_fwhm_base(mut self, fwhm_base: f64) -> Self {
        self.fwhm_base = fwhm_base;
        self
    }

    /// Detector resolution at `energy`:
    /// `sqrt(base² + (2.3548)²·F·ε·E)` (silicon Fano statistics).
    pub fn fwhm(&self, energy: f64) -> f64 {
        let statistical = FWHM_PER_SIGMA * FWHM_PER_SIGMA * FANO_SI * PAIR_ENERGY_SI * energy.max(0.0);
        (self.fwhm_base * self.fwhm_base + statistical).sqrt()
    }

    pub fn fwhm_for(&self, transition: &Transition) -> f64 {
        self.fwhm(transition.energy())
    }

    /// Feed every parameter into `state`; floats are hashed by bit pattern.
    pub fn hash_content<H: Hasher>(&self, state: &mut H) {
        self.calibration.min_energy().to_bits().hash(state);
        self.calibration.max_energy().to_bits().hash(state);
        self.calibration.channels().hash(state);
        self.shape.hash(state);
        self.escape.hash(state);
        self.fwhm_base.to_bits().hash(state);
        self.lorentz_fwhm.to_bits().hash(state);
    }
}

impl Default for FittingParameters {
    fn default() -> Self {
        Self::new(EnergyCalibration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fwhm_grows_with_energy() {
        let p = FittingParameters::default();
        assert!((p.fwhm(0.0) - DEFAULT_FWHM_BASE).abs() < 1e-12);
        let fe = p.fwhm(6.4);
        assert!(fe > 0.14 && fe < 0.16, "FWHM at Fe Kα was {fe}");
        assert!(p.fwhm(15.0) > fe);
    }

    #[test]
    fn escape_lines_only_with_detector_kind() {
        assert!(EscapeKind::None.lines().is_empty());
        assert_eq!(EscapeKind::Silicon.lines().len(), 1);
        assert!(EscapeKind::None.edge().is_infinite());
    }
}
