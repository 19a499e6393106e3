//! Fitting sets and fitting results.
//!
//! A `FittingSet` is the ordered list of series to fit plus the parameters they
//! are fit with. Order matters: the greedy solver fits series in insertion order,
//! so earlier series get first claim on shared signal.
//!
//! Parameters are held behind an `Arc` so that the "selected" and "proposed" sets
//! of a session can share one parameter snapshot; see `controller::FittingModel`.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;

use crate::error::AppError;
use crate::fit::params::FittingParameters;
use crate::peak::TransitionSeries;
use crate::spectrum::{Spectrum, SpectrumBuilder};

/// Ordered collection of unique transition series.
#[derive(Debug, Clone)]
pub struct FittingSet {
    series: Vec<TransitionSeries>,
    parameters: Arc<FittingParameters>,
}

impl FittingSet {
    pub fn new(parameters: Arc<FittingParameters>) -> Self {
        Self {
            series: Vec::new(),
            parameters,
        }
    }

    pub fn with_parameters(parameters: FittingParameters) -> Self {
        Self::new(Arc::new(parameters))
    }

    /// An empty set sharing this set's parameters.
    pub fn empty_like(&self) -> Self {
        Self::new(Arc::clone(&self.parameters))
    }

    pub fn parameters(&self) -> &FittingParameters {
        &self.parameters
    }

    pub fn shared_parameters(&self) -> &Arc<FittingParameters> {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: Arc<FittingParameters>) {
        self.parameters = parameters;
    }

    /// Append `ts`. Returns `Ok(false)` when it is already present.
    pub fn add(&mut self, ts: TransitionSeries) -> Result<bool, AppError> {
        validate(&ts)?;
        if self.series.contains(&ts) {
            return Ok(false);
        }
        self.series.push(ts);
        Ok(true)
    }

    pub fn add_all(&mut self, series: impl IntoIterator<Item = TransitionSeries>) -> Result<(), AppError> {
        for ts in series {
            self.add(ts)?;
        }
        Ok(())
    }

    /// Insert `ts` at `index` (clamped to the end). Duplicates are a no-op.
    pub fn insert_at(&mut self, index: usize, ts: TransitionSeries) -> Result<bool, AppError> {
        validate(&ts)?;
        if self.series.contains(&ts) {
            return Ok(false);
        }
        let index = index.min(self.series.len());
        self.series.insert(index, ts);
        Ok(true)
    }

    /// Remove `ts`; returns whether anything was removed.
    pub fn remove(&mut self, ts: &TransitionSeries) -> bool {
        let before = self.series.len();
        self.series.retain(|s| s != ts);
        self.series.len() != before
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }

    /// Copy of this set without `ts`.
    pub fn without(&self, ts: &TransitionSeries) -> Self {
        let mut copy = self.clone();
        copy.remove(ts);
        copy
    }

    pub fn contains(&self, ts: &TransitionSeries) -> bool {
        self.series.contains(ts)
    }

    pub fn series(&self) -> &[TransitionSeries] {
        &self.series
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransitionSeries> {
        self.series.iter()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Move each listed series one place towards the front.
    pub fn move_up(&mut self, targets: &[TransitionSeries]) {
        for ts in targets {
            if let Some(i) = self.position(ts) {
                if i > 0 {
                    self.series.swap(i, i - 1);
                }
            }
        }
    }

    /// Move each listed series one place towards the back.
    pub fn move_down(&mut self, targets: &[TransitionSeries]) {
        for ts in targets.iter().rev() {
            if let Some(i) = self.position(ts) {
                if i + 1 < self.series.len() {
                    self.series.swap(i, i + 1);
                }
            }
        }
    }

    /// Move the series at `from` so that it lands before the item currently at
    /// `to` (list-drag semantics).
    pub fn move_to(&mut self, from: usize, to: usize) {
        if from >= self.series.len() {
            return;
        }
        let to = if to > from { to - 1 } else { to };
        let ts = self.series.remove(from);
        let to = to.min(self.series.len());
        self.series.insert(to, ts);
    }

    fn position(&self, ts: &TransitionSeries) -> Option<usize> {
        self.series.iter().position(|s| s == ts)
    }

    /// Feed series identities (in order) and parameters into `state`.
    pub fn hash_content<H: Hasher>(&self, state: &mut H) {
        self.series.hash(state);
        self.parameters.hash_content(state);
    }
}

fn validate(ts: &TransitionSeries) -> Result<(), AppError> {
    if ts.transition_count() == 0 {
        return Err(AppError::invalid_input(format!(
            "Transition series {ts} has no transitions."
        )));
    }
    Ok(())
}

/// One fitted series.
#[derive(Debug, Clone, Serialize)]
pub struct FittingResult {
    series: TransitionSeries,
    #[serde(skip)]
    curve: Spectrum,
    fit_sum: f64,
    scale: f64,
}

impl FittingResult {
    pub fn new(series: TransitionSeries, curve: Spectrum, fit_sum: f64, scale: f64) -> Self {
        Self {
            series,
            curve,
            fit_sum,
            scale,
        }
    }

    pub fn series(&self) -> &TransitionSeries {
        &self.series
    }

    /// The fitted (scaled) curve.
    pub fn curve(&self) -> &Spectrum {
        &self.curve
    }

    /// Total intensity under the fitted curve.
    pub fn fit_sum(&self) -> f64 {
        self.fit_sum
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Peak height of the fitted curve (0 when not finite).
    pub fn intensity(&self) -> f64 {
        crate::math::finite_or_zero(self.curve.max())
    }
}

/// All fitted series of one solve, plus what is left over.
#[derive(Debug, Clone)]
pub struct FittingResultSet {
    results: Vec<FittingResult>,
    residual: Spectrum,
}

impl FittingResultSet {
    /// Assemble a result set; the residual is `data - Σ curves`.
    pub fn from_results(data: &Spectrum, results: Vec<FittingResult>) -> Self {
        let mut residual = data.to_builder();
        for r in &results {
            residual.subtract(&r.curve);
        }
        Self {
            results,
            residual: residual.freeze(),
        }
    }

    pub fn results(&self) -> &[FittingResult] {
        &self.results
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FittingResult> {
        self.results.iter()
    }

    pub fn residual(&self) -> &Spectrum {
        &self.residual
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Channel-wise sum of every fitted curve.
    pub fn total_fit(&self) -> Spectrum {
        let mut total = SpectrumBuilder::zeros(self.residual.len());
        for r in &self.results {
            total.add_scaled(&r.curve, 1.0);
        }
        total.freeze()
    }

    pub fn fit_for(&self, ts: &TransitionSeries) -> Option<&FittingResult> {
        self.results.iter().find(|r| &r.series == ts)
    }

    /// The fitted series contributing most at `channel`, if any contributes more
    /// than one count there.
    pub fn best_at_channel(&self, channel: usize) -> Option<&FittingResult> {
        let mut best: Option<&FittingResult> = None;
        let mut best_value = 1.0;
        for r in &self.results {
            if !r.curve.in_bounds(channel) {
                continue;
            }
            let v = r.curve.get(channel);
            if v > best_value {
                best_value = v;
                best = Some(r);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peak::{Element, Shell, Transition};

    fn ts(symbol: &str) -> TransitionSeries {
        let el = Element::from_symbol(symbol).unwrap();
        TransitionSeries::primary(el, Shell::K, vec![Transition::new(5.0, 1.0).unwrap()]).unwrap()
    }

    fn ids(set: &FittingSet) -> Vec<String> {
        set.iter().map(|s| s.identifier()).collect()
    }

    #[test]
    fn duplicates_and_absent_removals_are_no_ops() {
        let mut set = FittingSet::with_parameters(FittingParameters::default());
        assert!(set.add(ts("Fe")).unwrap());
        assert!(!set.add(ts("Fe")).unwrap());
        assert!(!set.insert_at(0, ts("Fe")).unwrap());
        assert_eq!(set.len(), 1);
        assert!(!set.remove(&ts("Cu")));
        assert!(set.remove(&ts("Fe")));
        assert!(set.is_empty());
    }

    #[test]
    fn reordering() {
        let mut set = FittingSet::with_parameters(FittingParameters::default());
        set.add_all(["Ca", "Fe", "Cu", "Zn"].map(ts)).unwrap();
        set.move_up(&[ts("Cu")]);
        assert_eq!(ids(&set), ["Ca:K", "Cu:K", "Fe:K", "Zn:K"]);
        set.move_down(&[ts("Ca"), ts("Cu")]);
        assert_eq!(ids(&set), ["Fe:K", "Ca:K", "Cu:K", "Zn:K"]);
        set.move_to(0, 3);
        assert_eq!(ids(&set), ["Ca:K", "Cu:K", "Fe:K", "Zn:K"]);
        set.insert_at(99, ts("Ni")).unwrap();
        assert_eq!(set.series().last().unwrap().identifier(), "Ni:K");
    }

    #[test]
    fn sets_share_parameters() {
        let shared = Arc::new(FittingParameters::default());
        let a = FittingSet::new(Arc::clone(&shared));
        let b = a.empty_like();
        assert!(Arc::ptr_eq(a.shared_parameters(), b.shared_parameters()));
    }

    #[test]
    fn residual_is_data_minus_curves() {
        let data = Spectrum::new(vec![10.0, 10.0, 10.0]);
        let r1 = FittingResult::new(ts("Fe"), Spectrum::new(vec![1.0, 5.0, 0.0]), 6.0, 1.0);
        let r2 = FittingResult::new(ts("Cu"), Spectrum::new(vec![0.0, 2.0, 3.0]), 5.0, 1.0);
        let set = FittingResultSet::from_results(&data, vec![r1, r2]);
        assert_eq!(set.residual().values(), &[9.0, 3.0, 7.0]);
        assert_eq!(set.total_fit().values(), &[1.0, 7.0, 3.0]);
        assert_eq!(set.best_at_channel(1).unwrap().series().identifier(), "Fe:K");
        assert_eq!(set.best_at_channel(2).unwrap().series().identifier(), "Cu:K");
        assert!(set.best_at_channel(0).is_none());
    }
}
