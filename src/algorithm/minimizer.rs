//! Adapter that drives a synchronous `argmin` solver through the scheduler.
//!
//! Every cost evaluation requested by the solver becomes exactly one trial:
//! submit, wait, get, clean. The solver never sees trial ids or the
//! simulator, only objectives.

use core::cell::RefCell;

use argmin::core::{CostFunction, Executor};
use argmin::solver::neldermead::NelderMead;
use serde_json::json;

use crate::error::{Error, Result};
use crate::problem::ProblemInfo;
use crate::scheduler::Scheduler;
use crate::trial::Submission;

use super::{Algorithm, evaluate_batch};

/// Runs a full `argmin` Nelder-Mead minimization per round.
///
/// The next round restarts from the best point found so far, with a fresh
/// initial simplex around it.
pub struct MinimizerAdapter {
    current: Vec<f64>,
    best: Option<(Vec<f64>, f64)>,
    max_iterations: u64,
    sd_tolerance: f64,
    initial_step: f64,
    iteration: usize,
}

impl MinimizerAdapter {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> MinimizerAdapterBuilder {
        MinimizerAdapterBuilder::default()
    }

    /// Point the next round starts from.
    #[must_use]
    pub fn current(&self) -> &[f64] {
        &self.current
    }

    /// Best point and objective seen by any round.
    #[must_use]
    pub fn best(&self) -> Option<(&[f64], f64)> {
        self.best.as_ref().map(|(x, f)| (x.as_slice(), *f))
    }

    /// Completed rounds.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    fn initial_simplex(&self) -> Vec<Vec<f64>> {
        let mut simplex = vec![self.current.clone()];
        for d in 0..self.current.len() {
            let mut vertex = self.current.clone();
            vertex[d] += self.initial_step;
            simplex.push(vertex);
        }
        simplex
    }
}

/// Cost function view of a scheduler.
struct SchedulerCost<'a, 's> {
    scheduler: RefCell<&'s mut dyn Scheduler>,
    failure: &'a RefCell<Option<Error>>,
    best: &'a RefCell<Option<(Vec<f64>, f64)>>,
    iteration: usize,
}

/// Aborts the solver once the scheduler reports it is finished.
#[derive(Debug, thiserror::Error)]
#[error("scheduler finished")]
struct Finished;

impl CostFunction for SchedulerCost<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> core::result::Result<Self::Output, argmin::core::Error> {
        let mut scheduler = self.scheduler.borrow_mut();
        if scheduler.is_finished() {
            return Err(Finished.into());
        }
        let submission = Submission::new(x.clone())
            .annotation("type", json!("minimizer"))
            .annotation("iteration", json!(self.iteration));
        match evaluate_batch(&mut **scheduler, vec![submission]) {
            Ok(evaluations) => {
                let objective = evaluations[0].objective;
                let mut best = self.best.borrow_mut();
                if best.as_ref().is_none_or(|(_, f)| objective < *f) {
                    *best = Some((x.clone(), objective));
                }
                Ok(objective)
            }
            Err(error) => {
                let message = error.to_string();
                *self.failure.borrow_mut() = Some(error);
                Err(argmin::core::Error::msg(message))
            }
        }
    }
}

impl Algorithm for MinimizerAdapter {
    fn name(&self) -> &'static str {
        "minimizer"
    }

    fn advance(&mut self, scheduler: &mut dyn Scheduler) -> Result<()> {
        self.iteration += 1;
        trace_info!(iteration = self.iteration, "starting minimizer round");

        let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(self.initial_simplex())
            .with_sd_tolerance(self.sd_tolerance)
            .map_err(|e| Error::Minimizer(e.to_string()))?;

        let failure = RefCell::new(None);
        let best = RefCell::new(None);
        let cost = SchedulerCost {
            scheduler: RefCell::new(scheduler),
            failure: &failure,
            best: &best,
            iteration: self.iteration,
        };
        let max_iterations = self.max_iterations;
        let outcome = Executor::new(cost, solver)
            .configure(|state| state.max_iters(max_iterations))
            .run();

        if let Some(error) = failure.take() {
            return Err(error);
        }
        let finished = match outcome {
            Ok(_) => false,
            Err(error) if error.downcast_ref::<Finished>().is_some() => true,
            Err(error) => return Err(Error::Minimizer(error.to_string())),
        };
        trace_debug!(finished, best = ?best.borrow(), "minimizer round finished");

        if let Some((x, objective)) = best.take() {
            if self.best.as_ref().is_none_or(|(_, f)| objective < *f) {
                self.best = Some((x.clone(), objective));
            }
            if !finished {
                self.current = x;
            }
        }
        Ok(())
    }
}

/// Builder for [`MinimizerAdapter`].
///
/// # Defaults
///
/// - `max_iterations`: 100
/// - `sd_tolerance`: 1e-6
/// - `initial_step`: 0.1
#[derive(Debug, Clone)]
pub struct MinimizerAdapterBuilder {
    max_iterations: u64,
    sd_tolerance: f64,
    initial_step: f64,
}

impl Default for MinimizerAdapterBuilder {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            sd_tolerance: 1e-6,
            initial_step: 0.1,
        }
    }
}

impl MinimizerAdapterBuilder {
    /// Solver iterations per round.
    #[must_use]
    pub fn max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Standard deviation of the simplex values below which a round stops.
    #[must_use]
    pub fn sd_tolerance(mut self, tolerance: f64) -> Self {
        self.sd_tolerance = tolerance;
        self
    }

    /// Offset of the initial simplex vertices along each axis.
    #[must_use]
    pub fn initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }

    /// Builds the adapter starting at the problem's initial values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] without initial values and
    /// [`Error::InvalidConfig`] for a zero iteration budget or a zero step.
    pub fn build(self, info: &ProblemInfo) -> Result<MinimizerAdapter> {
        let current = info.require_initial_values("minimizer")?.to_vec();
        if self.max_iterations == 0 || self.initial_step == 0.0 || !self.initial_step.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "invalid minimizer settings: {self:?}"
            )));
        }
        Ok(MinimizerAdapter {
            current,
            best: None,
            max_iterations: self.max_iterations,
            sd_tolerance: self.sd_tolerance,
            initial_step: self.initial_step,
            iteration: 0,
        })
    }
}
