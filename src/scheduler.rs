//! The scheduling interface shared by [`Evaluator`](crate::Evaluator) and
//! [`Calibrator`](crate::Calibrator).

use crate::error::Result;
use crate::problem::ProblemInfo;
use crate::trial::{Submission, TraceEntry};
use crate::types::{Evaluation, Map, TrialId};

/// Asynchronous trial execution as seen by an algorithm.
///
/// Algorithms only hold [`TrialId`]s. They must [`clean`](Self::clean) every
/// identifier they no longer need; otherwise simulator resources leak.
///
/// `wait` is the only operation that blocks. Trials start in submission
/// order but may finish in any order.
pub trait Scheduler {
    /// Capabilities of the underlying problem.
    fn information(&self) -> &ProblemInfo;

    /// Registers a new pending trial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArity`](crate::Error::InvalidArity) if the
    /// vector length does not match the problem, or any error raised while
    /// parameterizing.
    fn submit(&mut self, submission: Submission) -> Result<TrialId>;

    /// Blocks until all `ids` are finished.
    ///
    /// # Errors
    ///
    /// Propagates simulator and evaluation failures.
    fn wait(&mut self, ids: &[TrialId]) -> Result<()>;

    /// Blocks until every submitted trial is finished.
    ///
    /// # Errors
    ///
    /// Propagates simulator and evaluation failures.
    fn wait_all(&mut self) -> Result<()>;

    /// Runs one polling round and reports whether `id` is finished.
    ///
    /// # Errors
    ///
    /// Propagates simulator and evaluation failures.
    fn ready(&mut self, id: TrialId) -> Result<bool>;

    /// Objective and state of `id`, waiting for it first.
    ///
    /// # Errors
    ///
    /// Propagates simulator and evaluation failures.
    fn get(&mut self, id: TrialId) -> Result<Evaluation>;

    /// Objective and state of several trials, waiting for all of them first.
    ///
    /// # Errors
    ///
    /// Propagates simulator and evaluation failures.
    fn get_many(&mut self, ids: &[TrialId]) -> Result<Vec<Evaluation>> {
        self.wait(ids)?;
        ids.iter().map(|&id| self.get(id)).collect()
    }

    /// Waits for `ids`, then releases them.
    ///
    /// # Errors
    ///
    /// Propagates simulator failures.
    fn clean(&mut self, ids: &[TrialId]) -> Result<()>;

    /// Simulator configuration of `id`: the problem's parameterization with
    /// the submission's extra parameters merged in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTrial`](crate::Error::UnknownTrial) if `id` was
    /// never submitted or is already cleaned.
    fn simulator_parameters(&self, id: TrialId) -> Result<&Map>;

    /// Releases every currently finished trial.
    ///
    /// # Errors
    ///
    /// Propagates simulator failures.
    fn clean_finished(&mut self) -> Result<()>;

    /// Whether the simulated system converged during the finished trial `id`.
    ///
    /// # Errors
    ///
    /// Fails if `id` is unknown or not finished.
    fn converged(&mut self, id: TrialId) -> Result<bool>;

    /// Cost of the finished trial `id`.
    ///
    /// # Errors
    ///
    /// Fails if `id` is unknown or not finished.
    fn cost(&self, id: TrialId) -> Result<f64>;

    /// Drains the trials finished since the previous call.
    fn fetch_trace(&mut self) -> Vec<TraceEntry>;

    /// Number of finished evaluations.
    fn evaluations(&self) -> usize;

    /// Cost spent on finished evaluations.
    fn total_cost(&self) -> f64;

    /// Whether bookkeeping decided that the run should stop.
    fn is_finished(&self) -> bool {
        false
    }
}
