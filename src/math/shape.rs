//! Parametric peak shapes.
//!
//! Every shape is normalized to unit height at the line centre and parameterized
//! by its full width at half maximum, so a fitted scale reads directly as a peak
//! height:
//!
//! - Gaussian: `exp(-x² / 2σ²)` with `σ = FWHM / (2·sqrt(2·ln 2))`
//! - Lorentzian: `1 / (1 + (x/γ)²)` with `γ = FWHM / 2`
//! - pseudo-Voigt: equal mix of the two at the same FWHM
//! - Voigt: Gaussian detector response convolved with the natural Lorentzian line
//!   width, evaluated with the Thompson–Cox–Hastings pseudo-Voigt approximation.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// `2·sqrt(2·ln 2)`: FWHM of a unit-σ Gaussian.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

/// Mixing fraction of the fixed pseudo-Voigt shape.
const PSEUDO_VOIGT_ETA: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PeakShape {
    Gaussian,
    Lorentzian,
    #[value(name = "pseudo-voigt")]
    #[serde(rename = "pseudo-voigt")]
    PseudoVoigt,
    Voigt,
}

impl PeakShape {
    pub fn display_name(self) -> &'static str {
        match self {
            PeakShape::Gaussian => "Gaussian",
            PeakShape::Lorentzian => "Lorentzian",
            PeakShape::PseudoVoigt => "pseudo-Voigt",
            PeakShape::Voigt => "Voigt",
        }
    }

    /// Unit-height shape value at `offset` from the centre.
    ///
    /// `fwhm` is the detector (Gaussian) width; `lorentz_fwhm` is the natural line
    /// width and is only used by `Voigt`. Degenerate widths evaluate to `0`.
    pub fn value(self, offset: f64, fwhm: f64, lorentz_fwhm: f64) -> f64 {
        if !(fwhm.is_finite() && fwhm > 0.0) {
            return 0.0;
        }
        match self {
            PeakShape::Gaussian => gaussian(offset, fwhm),
            PeakShape::Lorentzian => lorentzian(offset, fwhm),
            PeakShape::PseudoVoigt => {
                PSEUDO_VOIGT_ETA * lorentzian(offset, fwhm) + (1.0 - PSEUDO_VOIGT_ETA) * gaussian(offset, fwhm)
            }
            PeakShape::Voigt => {
                let fl = lorentz_fwhm.max(0.0);
                let (f, eta) = tch_parameters(fwhm, fl);
                eta * lorentzian(offset, f) + (1.0 - eta) * gaussian(offset, f)
            }
        }
    }
}

fn gaussian(offset: f64, fwhm: f64) -> f64 {
    let sigma = fwhm / FWHM_PER_SIGMA;
    let z = offset / sigma;
    (-0.5 * z * z).exp()
}

fn lorentzian(offset: f64, fwhm: f64) -> f64 {
    let gamma = fwhm / 2.0;
    let z = offset / gamma;
    1.0 / (1.0 + z * z)
}

/// Total FWHM and Lorentzian fraction of the TCH pseudo-Voigt.
fn tch_parameters(fg: f64, fl: f64) -> (f64, f64) {
    let f = (fg.powi(5)
        + 2.69269 * fg.powi(4) * fl
        + 2.42843 * fg.powi(3) * fl.powi(2)
        + 4.47163 * fg.powi(2) * fl.powi(3)
        + 0.07842 * fg * fl.powi(4)
        + fl.powi(5))
    .powf(0.2);
    let r = fl / f;
    let eta = (1.36603 * r - 0.47719 * r * r + 0.11116 * r * r * r).clamp(0.0, 1.0);
    (f, eta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_have_unit_height_and_half_max_at_hwhm() {
        for shape in [PeakShape::Gaussian, PeakShape::Lorentzian, PeakShape::PseudoVoigt] {
            assert!((shape.value(0.0, 0.15, 0.0) - 1.0).abs() < 1e-12);
            assert!((shape.value(0.075, 0.15, 0.0) - 0.5).abs() < 1e-9, "{shape:?}");
        }
    }

    #[test]
    fn voigt_reduces_to_gaussian_without_natural_width() {
        for &x in &[0.0, 0.02, 0.1, 0.3] {
            let v = PeakShape::Voigt.value(x, 0.15, 0.0);
            let g = PeakShape::Gaussian.value(x, 0.15, 0.0);
            assert!((v - g).abs() < 1e-9);
        }
        // natural width broadens the line
        assert!(PeakShape::Voigt.value(0.1, 0.15, 0.02) > PeakShape::Gaussian.value(0.1, 0.15, 0.0));
    }

    #[test]
    fn degenerate_width_is_zero() {
        assert_eq!(PeakShape::Gaussian.value(0.0, 0.0, 0.0), 0.0);
        assert_eq!(PeakShape::Lorentzian.value(0.0, f64::NAN, 0.0), 0.0);
    }
}
