//! Peak proposal: turning detected peaks into suggested transition series.
//!
//! Pipeline:
//!
//! 1. find peaks, dropping those already explained by an existing fit
//! 2. build a ranked guess list for every peak (in parallel)
//! 3. walk the peaks in order and greedily accept the best fresh guess, skipping
//!    peaks whose guesses include a series accepted earlier in the pass
//!
//! Candidate ranking is two-tier: a cheap compound scorer shortlists the whole
//! candidate universe, then a compound scorer including a real curve fit orders
//! the shortlist.

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::fit::{CurveFitter, FittingSet, FittingSolver};
use crate::peak::{PeakTable, SIGNIFICANT_INTENSITY, TransitionSeries};
use crate::search::job::{CancelToken, ProgressEvent, ProposalOutcome, Stage};
use crate::search::scoring::{
    CompoundFittingScorer, CurveFittingScorer, EnergyProximityScorer, FastFittingScorer, FittingScorer,
    NoComplexPileupScorer, PileupSourceScorer,
};
use crate::search::searcher::PeakSearcher;
use crate::spectrum::Spectrum;

/// Guesses kept per channel during an automatic search.
pub const SEARCH_GUESS_COUNT: usize = 5;

/// A series with its ranking score (higher is better).
pub type Guess = (TransitionSeries, f64);

/// Read-only inputs shared by every step of a proposal run.
#[derive(Debug, Clone, Copy)]
pub struct PeakProposal<'a> {
    pub data: &'a Spectrum,
    pub existing: &'a FittingSet,
    pub registry: &'a Arc<PeakTable>,
    pub fitter: CurveFitter,
    pub solver: FittingSolver,
}

impl PeakProposal<'_> {
    /// Ranked candidate series for `channel`, best first, at most `guess_count`.
    ///
    /// `proposals` holds tentatively accepted series. When `current` is one of
    /// them it is left out while solving (so its copy does not absorb the
    /// signal) and is offered again as a candidate.
    pub fn from_channel(
        &self,
        proposals: &FittingSet,
        channel: usize,
        current: Option<&TransitionSeries>,
        guess_count: usize,
    ) -> Vec<Guess> {
        let current = current.filter(|ts| proposals.contains(ts));
        let working = match current {
            Some(ts) => proposals.without(ts),
            None => proposals.clone(),
        };

        let fitted = self.solver.solve(self.data, self.existing, self.fitter);
        let proposed = self.solver.solve(fitted.residual(), &working, self.fitter);
        let residual = proposed.residual().clone();

        let candidates = self.candidates(&working, current);
        let parameters = self.existing.parameters();
        let energy = parameters.calibration.energy_from_channel(channel as f64);

        let fast = self.fast_scorer(energy, &residual);
        let mut shortlist: Vec<Guess> = candidates
            .into_par_iter()
            .map(|ts| {
                let score = fast.score(&ts);
                (ts, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();
        sort_best_first(&mut shortlist);
        shortlist.truncate(guess_count);

        let good = CompoundFittingScorer::new()
            .with(self.fast_scorer(energy, &residual), 23.0)
            .with(
                CurveFittingScorer::new(residual, parameters.clone(), self.fitter),
                10.0,
            );
        let mut ranked: Vec<Guess> = shortlist
            .into_par_iter()
            .map(|(ts, _)| {
                let score = good.score(&ts);
                (ts, score)
            })
            .collect();
        sort_best_first(&mut ranked);
        trace!(channel, guesses = ranked.len(), "ranked channel");
        ranked
    }

    /// Registry series plus pairwise summations of fitted and proposed series,
    /// minus anything already fitted or proposed. `current` is re-offered.
    fn candidates(&self, working: &FittingSet, current: Option<&TransitionSeries>) -> Vec<TransitionSeries> {
        let sources: Vec<&TransitionSeries> = self
            .existing
            .iter()
            .chain(working.iter())
            .filter(|ts| Some(*ts) != current)
            .collect();

        let mut pool: Vec<TransitionSeries> = self.registry.all().to_vec();
        for a in &sources {
            for b in &sources {
                pool.push(a.summation(b));
            }
        }

        let mut seen: HashSet<TransitionSeries> = HashSet::with_capacity(pool.len());
        let mut out = Vec::with_capacity(pool.len());
        for ts in pool {
            if self.existing.contains(&ts) || working.contains(&ts) {
                continue;
            }
            if seen.insert(ts.clone()) {
                out.push(ts);
            }
        }
        if let Some(ts) = current {
            if seen.insert(ts.clone()) {
                out.push(ts.clone());
            }
        }
        out
    }

    fn fast_scorer(&self, energy: f64, residual: &Spectrum) -> CompoundFittingScorer {
        let parameters = self.existing.parameters();
        CompoundFittingScorer::new()
            .with(EnergyProximityScorer::new(energy, parameters.clone()), 10.0)
            .with(FastFittingScorer::new(residual.clone(), parameters.clone()), 10.0)
            .with(NoComplexPileupScorer, 2.0)
            .with(
                PileupSourceScorer::new(self.data.clone(), parameters.calibration, self.registry.clone()),
                1.0,
            )
    }

    /// Peak channels not already explained by a strong line of an existing fit.
    fn unexplained_peaks(&self, searcher: &PeakSearcher) -> Vec<usize> {
        let parameters = self.existing.parameters();
        let mut peaks = searcher.search(self.data);
        peaks.retain(|&channel| {
            let energy = parameters.calibration.energy_from_channel(channel as f64);
            let explained = self.existing.iter().any(|ts| {
                ts.transitions().iter().any(|t| {
                    if t.relative_intensity() < SIGNIFICANT_INTENSITY {
                        return false;
                    }
                    let hwhm = parameters.fwhm_for(t) / 2.0;
                    t.energy() - hwhm < energy && energy < t.energy() + hwhm
                })
            });
            if explained {
                trace!(channel, "peak already explained by existing fits");
            }
            !explained
        });
        peaks
    }

    /// Full automatic search. Cancellation is honoured after peak finding and
    /// before each channel of the greedy pass; an aborted run yields no
    /// proposals at all.
    pub fn search(
        &self,
        searcher: &PeakSearcher,
        cancel: &CancelToken,
        progress: &mut dyn FnMut(ProgressEvent),
    ) -> ProposalOutcome {
        progress(ProgressEvent::StageStarted {
            stage: Stage::FindingPeaks,
            work_units: 1,
        });
        let peaks = self.unexplained_peaks(searcher);
        debug!(peaks = peaks.len(), "peak search finished");
        if cancel.is_cancelled() {
            info!("proposal search cancelled after peak finding");
            return ProposalOutcome::Aborted;
        }

        let mut proposals = self.existing.empty_like();
        let raw_guesses: Vec<Vec<Guess>> = peaks
            .par_iter()
            .map(|&channel| self.from_channel(&proposals, channel, None, SEARCH_GUESS_COUNT))
            .collect();
        progress(ProgressEvent::UnitCompleted {
            stage: Stage::FindingPeaks,
            completed: 1,
            work_units: 1,
        });

        progress(ProgressEvent::StageStarted {
            stage: Stage::IdentifyingFittings,
            work_units: peaks.len(),
        });
        let mut new_fits: Vec<TransitionSeries> = Vec::new();
        for (done, (&channel, raw)) in peaks.iter().zip(&raw_guesses).enumerate() {
            if cancel.is_cancelled() {
                info!(channel, "proposal search cancelled");
                return ProposalOutcome::Aborted;
            }

            if raw.iter().any(|(ts, _)| new_fits.contains(ts)) {
                debug!(channel, "guesses include an accepted series; skipping");
            } else {
                let fresh = self.from_channel(&proposals, channel, None, SEARCH_GUESS_COUNT);
                match fresh.into_iter().next() {
                    Some((ts, score)) if !self.existing.contains(&ts) => {
                        debug!(channel, series = %ts, score, "accepted proposal");
                        match proposals.add(ts.clone()) {
                            Ok(_) => new_fits.push(ts),
                            Err(e) => warn!(channel, error = %e, "rejected proposal"),
                        }
                    }
                    Some((ts, _)) => debug!(channel, series = %ts, "best guess is already fitted"),
                    None => debug!(channel, "no plausible candidate"),
                }
            }

            progress(ProgressEvent::UnitCompleted {
                stage: Stage::IdentifyingFittings,
                completed: done + 1,
                work_units: peaks.len(),
            });
        }

        info!(proposals = new_fits.len(), "proposal search completed");
        ProposalOutcome::Completed(new_fits)
    }
}

fn sort_best_first(guesses: &mut [Guess]) {
    guesses.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}
