//! The outer calibration loop.

use crate::algorithm::Algorithm;
use crate::error::Result;
use crate::scheduler::Scheduler;
use crate::tracker::Tracker;
use crate::trial::TraceEntry;

/// Result of [`Loop::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct LoopOutcome {
    /// Parameters of the best non-transient trial, if any finished.
    pub x: Option<Vec<f64>>,
    /// Objective of the best non-transient trial.
    pub objective: Option<f64>,
    /// Number of [`Algorithm::advance`] calls.
    pub rounds: usize,
    /// Evaluations spent during this run.
    pub evaluations: usize,
    /// Cost spent during this run.
    pub cost: f64,
}

/// Repeatedly advances an algorithm until a budget or threshold is hit.
///
/// Before every round the loop stops if more than `maximum_cost` or
/// `maximum_evaluations` were spent since [`run`](Self::run) started, if the
/// best non-transient objective fell below `threshold`, or if the scheduler
/// reports [`is_finished`](Scheduler::is_finished).
///
/// # Examples
///
/// ```
/// use simcal::Loop;
///
/// let driver = Loop::new().threshold(1e-4).maximum_evaluations(500);
/// assert_eq!(driver.best_objective(), None);
/// ```
#[derive(Clone, Debug)]
pub struct Loop {
    maximum_cost: f64,
    maximum_evaluations: Option<usize>,
    threshold: f64,
    objective: Option<f64>,
    x: Option<Vec<f64>>,
}

impl Default for Loop {
    fn default() -> Self {
        Self::new()
    }
}

impl Loop {
    /// A loop without budgets and a threshold of zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            maximum_cost: f64::INFINITY,
            maximum_evaluations: None,
            threshold: 0.0,
            objective: None,
            x: None,
        }
    }

    /// Stop once more than `maximum` cost was spent.
    #[must_use]
    pub fn maximum_cost(mut self, maximum: f64) -> Self {
        self.maximum_cost = maximum;
        self
    }

    /// Stop once more than `maximum` evaluations were spent.
    #[must_use]
    pub fn maximum_evaluations(mut self, maximum: usize) -> Self {
        self.maximum_evaluations = Some(maximum);
        self
    }

    /// Stop once the best objective is below `threshold`.
    #[must_use]
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Best non-transient objective seen by this loop.
    #[must_use]
    pub fn best_objective(&self) -> Option<f64> {
        self.objective
    }

    /// Parameters of the best non-transient objective.
    #[must_use]
    pub fn best_x(&self) -> Option<&[f64]> {
        self.x.as_deref()
    }

    fn process(&mut self, entry: &TraceEntry) {
        if entry.transient {
            return;
        }
        if self.objective.is_none_or(|best| entry.objective < best) {
            self.objective = Some(entry.objective);
            self.x = Some(entry.x.clone());
            trace_debug!(objective = entry.objective, x = ?entry.x, "loop found new best");
        }
    }

    /// Runs `algorithm` on `scheduler` until a stop condition holds.
    ///
    /// # Errors
    ///
    /// Propagates any error from the algorithm, the scheduler, or the
    /// tracker.
    pub fn run(
        &mut self,
        scheduler: &mut dyn Scheduler,
        algorithm: &mut dyn Algorithm,
        mut tracker: Option<&mut dyn Tracker>,
    ) -> Result<LoopOutcome> {
        let initial_evaluations = scheduler.evaluations();
        let initial_cost = scheduler.total_cost();
        let mut rounds = 0;

        trace_info!(algorithm = algorithm.name(), "starting calibration loop");

        loop {
            let cost = scheduler.total_cost() - initial_cost;
            let evaluations = scheduler.evaluations() - initial_evaluations;

            if cost > self.maximum_cost {
                trace_warn!(cost, "stopping: cost limit reached");
                break;
            }
            if self
                .maximum_evaluations
                .is_some_and(|maximum| evaluations > maximum)
            {
                trace_warn!(evaluations, "stopping: evaluation limit reached");
                break;
            }
            if self.objective.is_some_and(|best| best < self.threshold) {
                trace_info!("stopping: objective below threshold");
                break;
            }
            if scheduler.is_finished() {
                trace_info!("stopping: calibration finished");
                break;
            }

            algorithm.advance(scheduler)?;
            rounds += 1;

            for entry in scheduler.fetch_trace() {
                self.process(&entry);
                if let Some(tracker) = tracker.as_deref_mut() {
                    tracker.notify(&entry)?;
                }
            }

            if self.objective.is_some() {
                trace_info!(objective = ?self.objective, x = ?self.x, round = rounds, "best objective so far");
            }
        }

        Ok(LoopOutcome {
            x: self.x.clone(),
            objective: self.objective,
            rounds,
            evaluations: scheduler.evaluations() - initial_evaluations,
            cost: scheduler.total_cost() - initial_cost,
        })
    }
}
