use std::collections::HashMap;
use std::path::PathBuf;

use crate::problem::Problem;
use crate::scheduler::Scheduler;
use crate::types::Map;

use super::Calibrator;

/// A builder for [`Calibrator`] instances.
///
/// Created via [`Calibrator::builder()`].
///
/// # Defaults
///
/// - `tolerance`: -1 (never stops on tolerance)
/// - `maximum_evaluations`, `maximum_cost`: unbounded
/// - no snapshot log
pub struct CalibratorBuilder<S> {
    scheduler: S,
    tolerance: f64,
    maximum_evaluations: Option<usize>,
    maximum_cost: Option<f64>,
    log_path: Option<PathBuf>,
    reference_state: Option<Vec<f64>>,
    problem_metadata: Map,
    method_details: Map,
}

impl<S: Scheduler> CalibratorBuilder<S> {
    pub(super) fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            tolerance: -1.0,
            maximum_evaluations: None,
            maximum_cost: None,
            log_path: None,
            reference_state: None,
            problem_metadata: Map::new(),
            method_details: Map::new(),
        }
    }

    /// Stop successfully once an improvement of the best objective is at most
    /// `tolerance`.
    #[must_use]
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Stop once more than `maximum` evaluations were recorded.
    #[must_use]
    pub fn maximum_evaluations(mut self, maximum: usize) -> Self {
        self.maximum_evaluations = Some(maximum);
        self
    }

    /// Stop once more than `maximum` cost was spent.
    #[must_use]
    pub fn maximum_cost(mut self, maximum: f64) -> Self {
        self.maximum_cost = Some(maximum);
        self
    }

    /// Rewrite a JSON snapshot to `path` after every recorded trial.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Reference state stored in the snapshot.
    #[must_use]
    pub fn reference_state(mut self, state: Vec<f64>) -> Self {
        self.reference_state = Some(state);
        self
    }

    /// Problem description stored in the snapshot.
    #[must_use]
    pub fn problem_metadata(mut self, metadata: Map) -> Self {
        self.problem_metadata = metadata;
        self
    }

    /// Copies the reference state and metadata of `problem` into the snapshot.
    #[must_use]
    pub fn describe<P: Problem>(mut self, problem: &P) -> Self {
        self.reference_state = problem.reference_state();
        self.problem_metadata = problem.metadata();
        self
    }

    /// Algorithm description stored in the snapshot.
    #[must_use]
    pub fn method_details(mut self, details: Map) -> Self {
        self.method_details = details;
        self
    }

    /// Builds the calibrator.
    #[must_use]
    pub fn build(self) -> Calibrator<S> {
        Calibrator {
            scheduler: self.scheduler,
            tolerance: self.tolerance,
            maximum_evaluations: self.maximum_evaluations,
            maximum_cost: self.maximum_cost,
            log_path: self.log_path,
            reference_state: self.reference_state,
            problem_metadata: self.problem_metadata,
            method_details: self.method_details,
            submissions: HashMap::new(),
            results: HashMap::new(),
            history: Vec::new(),
            evaluations: 0,
            total_cost: 0.0,
            best: None,
            finished: false,
            success: false,
            exit_criterion: None,
        }
    }
}
