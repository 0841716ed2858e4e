//! Bookkeeping of finished trials: history, best-so-far, and stop criteria.

mod builder;
mod persistence;

use std::collections::HashMap;
use std::path::PathBuf;

pub use builder::CalibratorBuilder;
pub use persistence::{CalibrationSnapshot, HistoryEntry};

use crate::error::{Error, Result};
use crate::problem::ProblemInfo;
use crate::scheduler::Scheduler;
use crate::trial::{Submission, TraceEntry};
use crate::types::{Evaluation, ExitCriterion, Map, TrialId};

/// Best non-transient trial recorded so far.
#[derive(Clone, Debug, PartialEq)]
pub struct Best {
    /// Identifier of the trial.
    pub id: TrialId,
    /// Its objective.
    pub objective: f64,
    /// Its parameter vector.
    pub parameters: Vec<f64>,
}

/// Wraps a [`Scheduler`] and records every trial the first time its result
/// is read.
///
/// The calibrator is a [`Scheduler`] itself, so algorithms run on it
/// unchanged. Reading the same trial twice returns the cached evaluation and
/// records nothing. Cleaning a trial drops its cached evaluation along with
/// the trial itself; the history keeps it. Transient trials count toward the evaluation and cost
/// budgets but never change the best-so-far.
///
/// Stopping is cooperative: once a budget is exceeded or the tolerance is
/// reached, [`is_finished`](Scheduler::is_finished) turns true and the
/// [`Loop`](crate::Loop) stops before the next round.
pub struct Calibrator<S> {
    scheduler: S,
    tolerance: f64,
    maximum_evaluations: Option<usize>,
    maximum_cost: Option<f64>,
    log_path: Option<PathBuf>,
    reference_state: Option<Vec<f64>>,
    problem_metadata: Map,
    method_details: Map,
    submissions: HashMap<TrialId, Submission>,
    results: HashMap<TrialId, Evaluation>,
    history: Vec<HistoryEntry>,
    evaluations: usize,
    total_cost: f64,
    best: Option<Best>,
    finished: bool,
    success: bool,
    exit_criterion: Option<ExitCriterion>,
}

impl<S: Scheduler> Calibrator<S> {
    /// Creates a builder around `scheduler`.
    #[must_use]
    pub fn builder(scheduler: S) -> CalibratorBuilder<S> {
        CalibratorBuilder::new(scheduler)
    }

    /// A calibrator without limits or log.
    #[must_use]
    pub fn new(scheduler: S) -> Self {
        Self::builder(scheduler).build()
    }

    /// The wrapped scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Mutable access to the wrapped scheduler.
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Unwraps the scheduler.
    pub fn into_inner(self) -> S {
        self.scheduler
    }

    /// Recorded trials in completion order.
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Best non-transient trial so far.
    #[must_use]
    pub fn best(&self) -> Option<&Best> {
        self.best.as_ref()
    }

    /// Whether the tolerance criterion ended the calibration.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Why the calibration stopped, if it did.
    #[must_use]
    pub fn exit_criterion(&self) -> Option<ExitCriterion> {
        self.exit_criterion
    }

    /// Replaces the algorithm description stored in the snapshot.
    pub fn set_method_details(&mut self, details: Map) {
        self.method_details = details;
    }

    fn record(&mut self, id: TrialId, evaluation: &Evaluation) -> Result<()> {
        let submission = self.submissions.get(&id).ok_or(Error::UnknownTrial(id))?;
        let cost = self.scheduler.cost(id)?;
        let transient = submission.is_transient();

        self.evaluations += 1;
        self.total_cost += cost;
        self.history.push(HistoryEntry {
            id,
            parameters: submission.x().to_vec(),
            simulator_parameters: self.scheduler.simulator_parameters(id)?.clone(),
            objective: evaluation.objective,
            state: evaluation.state.clone(),
            annotations: submission.annotation_map().clone(),
            evaluations: self.evaluations,
            total_cost: self.total_cost,
            cost,
            transient,
        });

        if self
            .maximum_evaluations
            .is_some_and(|maximum| self.evaluations > maximum)
        {
            self.finished = true;
            self.exit_criterion = Some(ExitCriterion::MaximumEvaluations);
            trace_warn!(evaluations = self.evaluations, "maximum evaluations reached");
        }
        if self
            .maximum_cost
            .is_some_and(|maximum| self.total_cost > maximum)
        {
            self.finished = true;
            self.exit_criterion = Some(ExitCriterion::MaximumCost);
            trace_warn!(total_cost = self.total_cost, "maximum cost reached");
        }

        let improves = !evaluation.objective.is_nan()
            && self
                .best
                .as_ref()
                .is_none_or(|best| evaluation.objective < best.objective);
        if !self.finished && !transient && improves {
            let delta = self
                .best
                .as_ref()
                .map_or(f64::INFINITY, |best| best.objective - evaluation.objective);
            self.best = Some(Best {
                id,
                objective: evaluation.objective,
                parameters: submission.x().to_vec(),
            });
            trace_info!(
                objective = evaluation.objective,
                delta,
                evaluations = self.evaluations,
                total_cost = self.total_cost,
                "new best objective"
            );

            if delta <= self.tolerance {
                self.finished = true;
                self.success = true;
                self.exit_criterion = Some(ExitCriterion::Tolerance);
                trace_info!("tolerance reached");
            }
        }

        if let Some(path) = &self.log_path {
            self.save(path)?;
        }
        Ok(())
    }
}

impl<S: Scheduler> Scheduler for Calibrator<S> {
    fn information(&self) -> &ProblemInfo {
        self.scheduler.information()
    }

    fn submit(&mut self, submission: Submission) -> Result<TrialId> {
        let id = self.scheduler.submit(submission.clone())?;
        self.submissions.insert(id, submission);
        Ok(id)
    }

    fn wait(&mut self, ids: &[TrialId]) -> Result<()> {
        self.scheduler.wait(ids)
    }

    fn wait_all(&mut self) -> Result<()> {
        self.scheduler.wait_all()
    }

    fn ready(&mut self, id: TrialId) -> Result<bool> {
        self.scheduler.ready(id)
    }

    fn get(&mut self, id: TrialId) -> Result<Evaluation> {
        if let Some(evaluation) = self.results.get(&id) {
            return Ok(evaluation.clone());
        }
        if !self.submissions.contains_key(&id) {
            return Err(Error::UnknownTrial(id));
        }
        let evaluation = self.scheduler.get(id)?;
        self.record(id, &evaluation)?;
        self.results.insert(id, evaluation.clone());
        Ok(evaluation)
    }

    fn clean(&mut self, ids: &[TrialId]) -> Result<()> {
        self.scheduler.clean(ids)?;
        for id in ids {
            self.submissions.remove(id);
            self.results.remove(id);
        }
        Ok(())
    }

    fn simulator_parameters(&self, id: TrialId) -> Result<&Map> {
        self.scheduler.simulator_parameters(id)
    }

    fn clean_finished(&mut self) -> Result<()> {
        self.scheduler.clean_finished()?;
        let scheduler = &self.scheduler;
        self.submissions
            .retain(|&id, _| scheduler.simulator_parameters(id).is_ok());
        self.results
            .retain(|&id, _| scheduler.simulator_parameters(id).is_ok());
        Ok(())
    }

    fn converged(&mut self, id: TrialId) -> Result<bool> {
        self.scheduler.converged(id)
    }

    fn cost(&self, id: TrialId) -> Result<f64> {
        self.scheduler.cost(id)
    }

    fn fetch_trace(&mut self) -> Vec<TraceEntry> {
        self.scheduler.fetch_trace()
    }

    fn evaluations(&self) -> usize {
        self.scheduler.evaluations()
    }

    fn total_cost(&self) -> f64 {
        self.scheduler.total_cost()
    }

    fn is_finished(&self) -> bool {
        self.finished || self.scheduler.is_finished()
    }
}
