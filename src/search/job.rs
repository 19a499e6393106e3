//! Background proposal jobs.
//!
//! `ProposalJob::spawn` runs `PeakProposal::search` on its own worker thread.
//! The caller keeps a handle that can:
//!
//! - request cancellation (`cancel`)
//! - read the current state (`state`)
//! - receive progress events (`events`, a crossbeam channel)
//! - collect the terminal outcome (`wait` / `try_result`)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::fit::{CurveFitter, FittingSet, FittingSolver};
use crate::peak::{PeakTable, TransitionSeries};
use crate::search::proposal::PeakProposal;
use crate::search::searcher::PeakSearcher;
use crate::spectrum::Spectrum;

/// Cooperative cancellation flag shared between a job and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    FindingPeaks,
    IdentifyingFittings,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::FindingPeaks, Stage::IdentifyingFittings];

    pub fn name(self) -> &'static str {
        match self {
            Stage::FindingPeaks => "Finding Peaks",
            Stage::IdentifyingFittings => "Identifying Fittings",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running(Stage),
    Completed,
    Aborted,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A stage started and will report `work_units` completions.
    StageStarted { stage: Stage, work_units: usize },
    /// One unit of `stage` finished (`completed` of `work_units`).
    UnitCompleted { stage: Stage, completed: usize, work_units: usize },
    /// The job reached a terminal state.
    Finished(JobState),
}

/// Result of a proposal run. `Aborted` is distinct from completing with no
/// proposals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalOutcome {
    Completed(Vec<TransitionSeries>),
    Aborted,
}

impl ProposalOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, ProposalOutcome::Aborted)
    }

    pub fn proposals(&self) -> Option<&[TransitionSeries]> {
        match self {
            ProposalOutcome::Completed(fits) => Some(fits),
            ProposalOutcome::Aborted => None,
        }
    }
}

/// Owned inputs of one proposal run. `existing` is a snapshot; the job never
/// touches the caller's set.
#[derive(Debug, Clone)]
pub struct ProposalRequest {
    pub data: Spectrum,
    pub existing: FittingSet,
    pub registry: Arc<PeakTable>,
    pub searcher: PeakSearcher,
    pub fitter: CurveFitter,
    pub solver: FittingSolver,
}

impl ProposalRequest {
    /// Run the pipeline on the current thread.
    pub fn run(&self, cancel: &CancelToken, progress: &mut dyn FnMut(ProgressEvent)) -> ProposalOutcome {
        let proposal = PeakProposal {
            data: &self.data,
            existing: &self.existing,
            registry: &self.registry,
            fitter: self.fitter,
            solver: self.solver,
        };
        proposal.search(&self.searcher, cancel, progress)
    }
}

/// Handle to a proposal run on a worker thread.
pub struct ProposalJob {
    cancel: CancelToken,
    state: Arc<Mutex<JobState>>,
    events: Receiver<ProgressEvent>,
    handle: Option<JoinHandle<ProposalOutcome>>,
    outcome: Option<ProposalOutcome>,
}

impl ProposalJob {
    pub fn spawn(request: ProposalRequest) -> Result<Self, AppError> {
        Self::spawn_with_token(request, CancelToken::new())
    }

    /// Spawn with a caller-provided token (which may already be cancelled).
    pub fn spawn_with_token(request: ProposalRequest, cancel: CancelToken) -> Result<Self, AppError> {
        let (tx, rx) = unbounded();
        let state = Arc::new(Mutex::new(JobState::Pending));

        let worker_state = Arc::clone(&state);
        let worker_cancel = cancel.clone();
        let handle = std::thread::Builder::new()
            .name("peak-proposal".to_string())
            .spawn(move || run_worker(request, worker_cancel, worker_state, tx))
            .map_err(|e| AppError::compute(format!("Failed to start proposal worker: {e}")))?;

        Ok(Self {
            cancel,
            state,
            events: rx,
            handle: Some(handle),
            outcome: None,
        })
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn state(&self) -> JobState {
        read_state(&self.state)
    }

    pub fn stages(&self) -> [Stage; 2] {
        Stage::ALL
    }

    pub fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    /// The outcome if the worker has finished, without blocking.
    pub fn try_result(&mut self) -> Option<ProposalOutcome> {
        if self.outcome.is_none() && self.handle.as_ref().is_some_and(|h| h.is_finished()) {
            self.join();
        }
        self.outcome.clone()
    }

    /// Block until the worker finishes.
    pub fn wait(mut self) -> ProposalOutcome {
        self.join();
        self.outcome.take().unwrap_or(ProposalOutcome::Aborted)
    }

    fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let outcome = match handle.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("proposal worker panicked; treating run as aborted");
                write_state(&self.state, JobState::Aborted);
                ProposalOutcome::Aborted
            }
        };
        self.outcome = Some(outcome);
    }
}

fn run_worker(
    request: ProposalRequest,
    cancel: CancelToken,
    state: Arc<Mutex<JobState>>,
    tx: Sender<ProgressEvent>,
) -> ProposalOutcome {
    let mut progress = |event: ProgressEvent| {
        match &event {
            ProgressEvent::StageStarted { stage, .. } => write_state(&state, JobState::Running(*stage)),
            ProgressEvent::Finished(terminal) => write_state(&state, *terminal),
            ProgressEvent::UnitCompleted { .. } => {}
        }
        // The owner may have dropped its receiver; the run continues regardless.
        let _ = tx.send(event);
    };
    let outcome = request.run(&cancel, &mut progress);
    let terminal = if outcome.is_aborted() {
        JobState::Aborted
    } else {
        JobState::Completed
    };
    debug!(?terminal, "proposal worker finished");
    progress(ProgressEvent::Finished(terminal));
    outcome
}

fn read_state(state: &Mutex<JobState>) -> JobState {
    match state.lock() {
        Ok(guard) => *guard,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

fn write_state(state: &Mutex<JobState>, value: JobState) {
    match state.lock() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}
