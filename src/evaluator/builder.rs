use core::time::Duration;

use crate::error::{Error, Result};
use crate::problem::Problem;
use crate::simulator::Simulator;

use super::Evaluator;

/// A builder for [`Evaluator`] instances.
///
/// Created via [`Evaluator::builder()`].
///
/// # Defaults
///
/// - `parallel`: 1
/// - `interval`: zero (poll without sleeping)
/// - `follow_trace`: true
pub struct EvaluatorBuilder<P, S> {
    problem: P,
    simulator: S,
    parallel: usize,
    interval: Duration,
    follow_trace: bool,
}

impl<P, S> EvaluatorBuilder<P, S>
where
    P: Problem,
    S: Simulator<Output = P::Output>,
{
    pub(super) fn new(problem: P, simulator: S) -> Self {
        Self {
            problem,
            simulator,
            parallel: 1,
            interval: Duration::ZERO,
            follow_trace: true,
        }
    }

    /// Maximum number of trials running at the same time.
    #[must_use]
    pub fn parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sleep between two polling rounds.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Whether finished trials are recorded for [`fetch_trace`](crate::Scheduler::fetch_trace).
    #[must_use]
    pub fn follow_trace(mut self, follow_trace: bool) -> Self {
        self.follow_trace = follow_trace;
        self
    }

    /// Builds the evaluator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `parallel` is zero or the problem
    /// information is inconsistent.
    pub fn build(self) -> Result<Evaluator<P, S>> {
        if self.parallel == 0 {
            return Err(Error::InvalidConfig("parallel must be at least 1".into()));
        }
        let info = self.problem.information();
        info.validate()?;
        Ok(Evaluator {
            problem: self.problem,
            simulator: self.simulator,
            info,
            parallel: self.parallel,
            interval: self.interval,
            follow_trace: self.follow_trace,
            next_id: 0,
            trials: std::collections::HashMap::new(),
            pending: std::collections::VecDeque::new(),
            running: Vec::new(),
            finished: Vec::new(),
            evaluations: 0,
            total_cost: 0.0,
            trace: Vec::new(),
        })
    }
}
