//! Fitting session state.
//!
//! `FittingModel` owns what an interactive session works on:
//!
//! - the spectrum being analyzed
//! - the "selected" set (accepted fits) and the "proposed" set (suggestions not
//!   yet committed), which always share one parameter snapshot
//! - the strategy choices (fitter, solver, searcher)
//! - memoized fitting results
//!
//! Results are cached under a content hash of (spectrum, set, parameters,
//! strategies). Any change to those inputs produces a new key, so a cached
//! result is never served for different inputs; `invalidate` drops the cache
//! outright.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;

use crate::error::AppError;
use crate::fit::{CurveFitter, EscapeKind, FittingParameters, FittingResultSet, FittingSet, FittingSolver};
use crate::math::{PeakShape, finite_or_zero};
use crate::peak::{PeakTable, TransitionSeries};
use crate::search::{Guess, PeakProposal, PeakSearcher, ProposalJob, ProposalOutcome, ProposalRequest};
use crate::spectrum::{EnergyCalibration, Spectrum};

/// Guesses returned by an interactive channel lookup.
pub const DEFAULT_PROPOSAL_GUESSES: usize = 6;

#[derive(Debug, Clone)]
struct CachedResults {
    key: u64,
    results: FittingResultSet,
}

#[derive(Debug)]
pub struct FittingModel {
    data: Spectrum,
    registry: Arc<PeakTable>,
    selections: FittingSet,
    proposals: FittingSet,
    fitter: CurveFitter,
    solver: FittingSolver,
    searcher: PeakSearcher,
    selection_cache: Option<CachedResults>,
    proposal_cache: Option<CachedResults>,
}

impl FittingModel {
    pub fn new(data: Spectrum, parameters: FittingParameters, registry: Arc<PeakTable>) -> Self {
        let selections = FittingSet::with_parameters(parameters);
        let proposals = selections.empty_like();
        Self {
            data,
            registry,
            selections,
            proposals,
            fitter: CurveFitter::UnderCurve,
            solver: FittingSolver::Greedy,
            searcher: PeakSearcher::default(),
            selection_cache: None,
            proposal_cache: None,
        }
    }

    pub fn with_strategies(mut self, fitter: CurveFitter, solver: FittingSolver, searcher: PeakSearcher) -> Self {
        self.fitter = fitter;
        self.solver = solver;
        self.searcher = searcher;
        self
    }

    pub fn data(&self) -> &Spectrum {
        &self.data
    }

    pub fn set_data(&mut self, data: Spectrum) {
        self.data = data;
        self.invalidate();
    }

    pub fn registry(&self) -> &Arc<PeakTable> {
        &self.registry
    }

    pub fn selections(&self) -> &FittingSet {
        &self.selections
    }

    pub fn proposals(&self) -> &FittingSet {
        &self.proposals
    }

    pub fn parameters(&self) -> &FittingParameters {
        self.selections.parameters()
    }

    pub fn fitter(&self) -> CurveFitter {
        self.fitter
    }

    pub fn solver(&self) -> FittingSolver {
        self.solver
    }

    pub fn searcher(&self) -> PeakSearcher {
        self.searcher
    }

    /// Drop all memoized results.
    pub fn invalidate(&mut self) {
        self.selection_cache = None;
        self.proposal_cache = None;
    }

    // Selections

    pub fn add_selection(&mut self, ts: TransitionSeries) -> Result<bool, AppError> {
        self.selections.add(ts)
    }

    pub fn insert_selection(&mut self, index: usize, ts: TransitionSeries) -> Result<bool, AppError> {
        self.selections.insert_at(index, ts)
    }

    pub fn remove_selection(&mut self, ts: &TransitionSeries) -> bool {
        self.selections.remove(ts)
    }

    pub fn clear_selections(&mut self) {
        self.selections.clear();
    }

    pub fn move_selections_up(&mut self, targets: &[TransitionSeries]) {
        self.selections.move_up(targets);
    }

    pub fn move_selections_down(&mut self, targets: &[TransitionSeries]) {
        self.selections.move_down(targets);
    }

    pub fn move_selection(&mut self, from: usize, to: usize) {
        self.selections.move_to(from, to);
    }

    // Proposals

    pub fn add_proposal(&mut self, ts: TransitionSeries) -> Result<bool, AppError> {
        self.proposals.add(ts)
    }

    pub fn remove_proposal(&mut self, ts: &TransitionSeries) -> bool {
        self.proposals.remove(ts)
    }

    pub fn clear_proposals(&mut self) {
        self.proposals.clear();
    }

    /// Move every proposal (in order) into the selections.
    pub fn commit_proposals(&mut self) -> Result<usize, AppError> {
        let mut committed = 0;
        for ts in self.proposals.series().to_vec() {
            if self.selections.add(ts)? {
                committed += 1;
            }
        }
        self.proposals.clear();
        debug!(committed, "committed proposals");
        Ok(committed)
    }

    // Parameters. Both sets always receive the same snapshot.

    fn update_parameters(&mut self, update: impl FnOnce(&mut FittingParameters)) {
        let mut parameters = self.selections.parameters().clone();
        update(&mut parameters);
        let shared = Arc::new(parameters);
        self.selections.set_parameters(Arc::clone(&shared));
        self.proposals.set_parameters(shared);
    }

    pub fn set_calibration(&mut self, calibration: EnergyCalibration) {
        self.update_parameters(|p| p.calibration = calibration);
    }

    pub fn set_shape(&mut self, shape: PeakShape) {
        self.update_parameters(|p| p.shape = shape);
    }

    pub fn set_escape(&mut self, escape: EscapeKind) {
        self.update_parameters(|p| p.escape = escape);
    }

    pub fn set_fwhm_base(&mut self, fwhm_base: f64) -> Result<(), AppError> {
        if !(fwhm_base.is_finite() && fwhm_base > 0.0) {
            return Err(AppError::invalid_input(format!("FWHM base must be > 0 (got {fwhm_base}).")));
        }
        self.update_parameters(|p| p.fwhm_base = fwhm_base);
        Ok(())
    }

    pub fn set_fitter(&mut self, fitter: CurveFitter) {
        self.fitter = fitter;
    }

    pub fn set_solver(&mut self, solver: FittingSolver) {
        self.solver = solver;
    }

    pub fn set_searcher(&mut self, searcher: PeakSearcher) {
        self.searcher = searcher;
    }

    // Results

    /// Selected series fitted against the data.
    pub fn selection_results(&mut self) -> FittingResultSet {
        let key = self.content_key(&self.selections, None);
        if let Some(cached) = self.selection_cache.as_ref().filter(|c| c.key == key) {
            return cached.results.clone();
        }
        let results = self.solver.solve(&self.data, &self.selections, self.fitter);
        self.selection_cache = Some(CachedResults {
            key,
            results: results.clone(),
        });
        results
    }

    /// Proposed series fitted against what the selections leave over.
    pub fn proposal_results(&mut self) -> FittingResultSet {
        let base = self.selection_results();
        let key = self.content_key(&self.proposals, Some(&self.selections));
        if let Some(cached) = self.proposal_cache.as_ref().filter(|c| c.key == key) {
            return cached.results.clone();
        }
        let results = self.solver.solve(base.residual(), &self.proposals, self.fitter);
        self.proposal_cache = Some(CachedResults {
            key,
            results: results.clone(),
        });
        results
    }

    /// Signal left after both selections and proposals are fitted.
    pub fn residual(&mut self) -> Spectrum {
        self.proposal_results().residual().clone()
    }

    /// Peak height of a fitted series, from selections or proposals; `0` when
    /// the series is not fitted or its fit is not finite.
    pub fn series_intensity(&mut self, ts: &TransitionSeries) -> f64 {
        let selected = self.selection_results();
        if let Some(r) = selected.fit_for(ts) {
            return finite_or_zero(r.intensity());
        }
        self.proposal_results()
            .fit_for(ts)
            .map_or(0.0, |r| finite_or_zero(r.intensity()))
    }

    /// The fitted series contributing most at `channel`.
    pub fn select_at_channel(&mut self, channel: usize) -> Option<TransitionSeries> {
        let selected = self.selection_results();
        let proposed = self.proposal_results();
        let best = [selected.best_at_channel(channel), proposed.best_at_channel(channel)]
            .into_iter()
            .flatten()
            .max_by(|a, b| a.curve().get(channel).total_cmp(&b.curve().get(channel)));
        best.map(|r| r.series().clone())
    }

    /// Registry series that are neither selected nor proposed.
    pub fn unfitted_series(&self) -> Vec<TransitionSeries> {
        self.registry
            .all()
            .iter()
            .filter(|ts| !self.selections.contains(ts) && !self.proposals.contains(ts))
            .cloned()
            .collect()
    }

    // Proposal engine

    /// Ranked suggestions for `channel`, given the current selections and
    /// proposals. `current` is the proposal being replaced, if any.
    pub fn propose_from_channel(&self, channel: usize, current: Option<&TransitionSeries>) -> Vec<Guess> {
        let proposal = PeakProposal {
            data: &self.data,
            existing: &self.selections,
            registry: &self.registry,
            fitter: self.fitter,
            solver: self.solver,
        };
        proposal.from_channel(&self.proposals, channel, current, DEFAULT_PROPOSAL_GUESSES)
    }

    /// Snapshot of the inputs for an automatic search.
    pub fn proposal_request(&self) -> ProposalRequest {
        ProposalRequest {
            data: self.data.clone(),
            existing: self.selections.clone(),
            registry: Arc::clone(&self.registry),
            searcher: self.searcher,
            fitter: self.fitter,
            solver: self.solver,
        }
    }

    /// Start an automatic search on a worker thread.
    pub fn autodetect(&self) -> Result<ProposalJob, AppError> {
        ProposalJob::spawn(self.proposal_request())
    }

    /// Add the series found by an automatic search to the selections. Returns
    /// how many were added; an aborted run changes nothing.
    pub fn apply_autodetect(&mut self, outcome: &ProposalOutcome) -> Result<usize, AppError> {
        let Some(found) = outcome.proposals() else {
            return Ok(0);
        };
        let mut added = 0;
        for ts in found {
            if self.selections.add(ts.clone())? {
                added += 1;
            }
        }
        debug!(added, "applied automatic proposals");
        Ok(added)
    }

    fn content_key(&self, set: &FittingSet, base: Option<&FittingSet>) -> u64 {
        let mut hasher = DefaultHasher::new();
        for v in self.data.iter() {
            v.to_bits().hash(&mut hasher);
        }
        set.hash_content(&mut hasher);
        if let Some(base) = base {
            base.hash_content(&mut hasher);
        }
        self.fitter.hash(&mut hasher);
        self.solver.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Curve;
    use crate::peak::{Element, Shell, Transition};

    fn series(symbol: &str, energy: f64) -> TransitionSeries {
        let el = Element::from_symbol(symbol).unwrap();
        TransitionSeries::primary(el, Shell::K, vec![Transition::new(energy, 1.0).unwrap()]).unwrap()
    }

    fn model() -> (FittingModel, TransitionSeries, TransitionSeries) {
        let params = FittingParameters::new(EnergyCalibration::new(0.0, 10.24, 1024));
        let fe = series("Fe", 6.40);
        let cu = series("Cu", 8.05);
        let mut table = PeakTable::new();
        table.add_series(fe.clone()).unwrap();
        table.add_series(cu.clone()).unwrap();
        table.add_series(series("Ca", 3.69)).unwrap();

        let mut data = Spectrum::new(vec![1.0; 1024]).to_builder();
        data.add_scaled(Curve::new(&fe, &params, 1024).values(), 900.0);
        data.add_scaled(Curve::new(&cu, &params, 1024).values(), 400.0);
        (FittingModel::new(data.freeze(), params, Arc::new(table)), fe, cu)
    }

    #[test]
    fn parameter_changes_reach_both_sets() {
        let (mut m, _, _) = model();
        m.set_shape(PeakShape::Lorentzian);
        m.set_escape(EscapeKind::Silicon);
        assert!(Arc::ptr_eq(
            m.selections().shared_parameters(),
            m.proposals().shared_parameters()
        ));
        assert_eq!(m.proposals().parameters().shape, PeakShape::Lorentzian);
        assert_eq!(m.proposals().parameters().escape, EscapeKind::Silicon);
        assert!(m.set_fwhm_base(-1.0).is_err());
    }

    #[test]
    fn results_are_memoized_per_content() {
        let (mut m, fe, _) = model();
        m.add_selection(fe.clone()).unwrap();
        let first = m.selection_results();
        let again = m.selection_results();
        assert_eq!(first.residual(), again.residual());

        m.set_shape(PeakShape::Lorentzian);
        let changed = m.selection_results();
        assert_ne!(first.residual(), changed.residual());

        m.invalidate();
        assert_eq!(m.selection_results().residual(), changed.residual());
    }

    #[test]
    fn proposals_fit_against_selection_residual_and_commit() {
        let (mut m, fe, cu) = model();
        m.add_selection(fe.clone()).unwrap();
        m.add_proposal(cu.clone()).unwrap();

        assert!((m.series_intensity(&fe) - 901.0).abs() < 2.0);
        assert!((m.series_intensity(&cu) - 401.0).abs() < 2.0);
        assert_eq!(m.series_intensity(&series("Ca", 3.69)), 0.0);
        assert_eq!(m.select_at_channel(640), Some(fe.clone()));
        assert_eq!(m.select_at_channel(805), Some(cu.clone()));
        assert_eq!(m.select_at_channel(100), None);

        let unfitted: Vec<String> = m.unfitted_series().iter().map(|s| s.identifier()).collect();
        assert_eq!(unfitted, ["Ca:K"]);

        assert_eq!(m.commit_proposals().unwrap(), 1);
        assert!(m.proposals().is_empty());
        assert_eq!(m.selections().series(), &[fe, cu]);
    }

    #[test]
    fn channel_proposals_and_autodetect() {
        let (mut m, fe, cu) = model();
        let guesses = m.propose_from_channel(640, None);
        assert_eq!(guesses.first().map(|g| &g.0), Some(&fe));
        assert!(guesses.len() <= DEFAULT_PROPOSAL_GUESSES);

        let outcome = m.autodetect().unwrap().wait();
        assert_eq!(outcome.proposals(), Some(&[fe.clone(), cu.clone()][..]));
        assert_eq!(m.apply_autodetect(&outcome).unwrap(), 2);
        assert_eq!(m.apply_autodetect(&ProposalOutcome::Aborted).unwrap(), 0);
        assert_eq!(m.selections().len(), 2);
    }
}
