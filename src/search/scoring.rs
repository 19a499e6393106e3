//! Candidate scoring.
//!
//! A scorer rates how well a transition series explains the signal at hand:
//! higher is better, never NaN. The proposal pipeline combines several scorers
//! multiplicatively through `CompoundFittingScorer`, so a single zero acts as a
//! veto for the whole candidate.
//!
//! Scores of the individual scorers live in `[0, 1]`.

use std::sync::Arc;

use crate::fit::{CurveFitter, FittingParameters};
use crate::math::finite_or_zero;
use crate::models::Curve;
use crate::peak::{PeakTable, TransitionSeries};
use crate::spectrum::{EnergyCalibration, Spectrum};

/// Lines further than this many half widths from the target energy earn nothing.
pub const PROXIMITY_CUTOFF: f64 = 10.0;

/// Lines weaker than this are ignored by the fast fit estimate.
pub const FAST_FIT_MIN_INTENSITY: f64 = 0.05;

/// Composite candidates with more base components than this are vetoed.
pub const MAX_PILEUP_COMPONENTS: usize = 2;

pub trait FittingScorer: Send + Sync {
    fn score(&self, ts: &TransitionSeries) -> f64;
}

/// Rewards series with a strong line close to a target energy.
#[derive(Debug, Clone)]
pub struct EnergyProximityScorer {
    energy: f64,
    parameters: FittingParameters,
}

impl EnergyProximityScorer {
    pub fn new(energy: f64, parameters: FittingParameters) -> Self {
        Self { energy, parameters }
    }
}

impl FittingScorer for EnergyProximityScorer {
    fn score(&self, ts: &TransitionSeries) -> f64 {
        let mut best: f64 = 0.0;
        for t in ts.transitions() {
            let hwhm = self.parameters.fwhm_for(t) / 2.0;
            if !(hwhm > 0.0) {
                continue;
            }
            let d = (self.energy - t.energy()).abs() / hwhm;
            if d > PROXIMITY_CUTOFF {
                continue;
            }
            best = best.max(t.relative_intensity().sqrt() / (1.0 + d * d));
        }
        finite_or_zero(best)
    }
}

/// Cheap fit-quality estimate: how tall could the series be at its line
/// channels without exceeding the residual there?
#[derive(Debug, Clone)]
pub struct FastFittingScorer {
    residual: Spectrum,
    residual_max: f64,
    parameters: FittingParameters,
}

impl FastFittingScorer {
    pub fn new(residual: Spectrum, parameters: FittingParameters) -> Self {
        let residual_max = residual.max();
        Self {
            residual,
            residual_max,
            parameters,
        }
    }
}

impl FittingScorer for FastFittingScorer {
    fn score(&self, ts: &TransitionSeries) -> f64 {
        if !(self.residual_max > 0.0) {
            return 0.0;
        }
        let calibration = &self.parameters.calibration;
        let mut height = f64::INFINITY;
        for t in ts.transitions() {
            if t.relative_intensity() < FAST_FIT_MIN_INTENSITY {
                continue;
            }
            let Some(channel) = calibration.nearest_channel(t.energy()) else {
                continue;
            };
            let available = self.residual.get(channel).max(0.0);
            height = height.min(available / t.relative_intensity());
        }
        if !height.is_finite() {
            return 0.0;
        }
        finite_or_zero((height / self.residual_max).clamp(0.0, 1.0).sqrt())
    }
}

/// Vetoes summations of more than two series.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoComplexPileupScorer;

impl FittingScorer for NoComplexPileupScorer {
    fn score(&self, ts: &TransitionSeries) -> f64 {
        if ts.base_components().len() > MAX_PILEUP_COMPONENTS { 0.0 } else { 1.0 }
    }
}

/// Composite candidates are only plausible when each of their sources shows up
/// in the raw data.
#[derive(Debug, Clone)]
pub struct PileupSourceScorer {
    data: Spectrum,
    data_max: f64,
    calibration: EnergyCalibration,
    registry: Arc<PeakTable>,
}

impl PileupSourceScorer {
    pub fn new(data: Spectrum, calibration: EnergyCalibration, registry: Arc<PeakTable>) -> Self {
        let data_max = data.max();
        Self {
            data,
            data_max,
            calibration,
            registry,
        }
    }

    fn source_strength(&self, source: &TransitionSeries) -> f64 {
        let Some(line) = source.strongest_transition() else {
            return 0.0;
        };
        let Some(channel) = self.calibration.nearest_channel(line.energy()) else {
            return 0.0;
        };
        (self.data.get(channel) / self.data_max).clamp(0.0, 1.0).sqrt()
    }
}

impl FittingScorer for PileupSourceScorer {
    fn score(&self, ts: &TransitionSeries) -> f64 {
        if !ts.is_composite() {
            return 1.0;
        }
        if !(self.data_max > 0.0) {
            return 0.0;
        }
        let mut score: f64 = 1.0;
        for key in ts.base_components() {
            let strength = match self.registry.get(key.element, key.shell) {
                Some(source) => self.source_strength(source),
                None => 0.0,
            };
            score = score.min(strength);
        }
        finite_or_zero(score)
    }
}

/// Fit quality from an actual curve fit against the residual.
///
/// The score combines how much of the available signal under the curve's
/// intense channels the fit accounts for with how tall the fit is relative to
/// the residual maximum.
#[derive(Debug, Clone)]
pub struct CurveFittingScorer {
    residual: Spectrum,
    residual_max: f64,
    parameters: FittingParameters,
    fitter: CurveFitter,
}

impl CurveFittingScorer {
    pub fn new(residual: Spectrum, parameters: FittingParameters, fitter: CurveFitter) -> Self {
        let residual_max = residual.max();
        Self {
            residual,
            residual_max,
            parameters,
            fitter,
        }
    }
}

impl FittingScorer for CurveFittingScorer {
    fn score(&self, ts: &TransitionSeries) -> f64 {
        if !(self.residual_max > 0.0) {
            return 0.0;
        }
        let curve = Curve::new(ts, &self.parameters, self.residual.len());
        let result = self.fitter.fit_curve(&curve, self.residual.values());

        let mut fitted = 0.0;
        let mut available = 0.0;
        for &i in curve.intense_channels() {
            fitted += result.curve().get(i).max(0.0);
            available += self.residual.get(i).max(0.0);
        }
        if !(available > 0.0) {
            return 0.0;
        }
        let coverage = (fitted / available).clamp(0.0, 1.0);
        let strength = (result.intensity() / self.residual_max).clamp(0.0, 1.0);
        finite_or_zero((coverage * strength).sqrt())
    }
}

/// Weighted product of scorers: `Π (score_i * w_i / Σw)`.
///
/// A nested compound counts as a single weighted term of its parent.
#[derive(Default)]
pub struct CompoundFittingScorer {
    terms: Vec<(Box<dyn FittingScorer>, f64)>,
    total_weight: f64,
}

impl CompoundFittingScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, scorer: impl FittingScorer + 'static, weight: f64) {
        self.terms.push((Box::new(scorer), weight));
        self.total_weight += weight;
    }

    pub fn with(mut self, scorer: impl FittingScorer + 'static, weight: f64) -> Self {
        self.add(scorer, weight);
        self
    }
}

impl FittingScorer for CompoundFittingScorer {
    fn score(&self, ts: &TransitionSeries) -> f64 {
        if !(self.total_weight > 0.0) {
            return if self.terms.is_empty() { 1.0 } else { 0.0 };
        }
        let mut factors: Vec<f64> = self
            .terms
            .iter()
            .map(|(scorer, weight)| finite_or_zero(scorer.score(ts)) * (weight / self.total_weight))
            .collect();
        // multiply in a fixed order so the result does not depend on insertion order
        factors.sort_by(f64::total_cmp);
        finite_or_zero(factors.iter().product())
    }
}

impl std::fmt::Debug for CompoundFittingScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompoundFittingScorer")
            .field("terms", &self.terms.len())
            .field("total_weight", &self.total_weight)
            .finish()
    }
}
