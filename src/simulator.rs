//! The simulator capability.

use crate::error::Result;
use crate::types::{Map, TrialId};

/// An external simulator executing one parameterized trial per identifier.
///
/// Implementations usually wrap an operating-system process. `run` must not
/// block until the trial completes; completion is discovered by polling
/// [`ready`](Self::ready).
pub trait Simulator {
    /// Raw result handed to [`Problem::evaluate`](crate::Problem::evaluate).
    type Output;

    /// Starts the trial `id` with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Simulator`](crate::Error::Simulator) if the run cannot
    /// be started.
    fn run(&mut self, id: TrialId, parameters: &Map) -> Result<()>;

    /// Whether the trial `id` has completed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Simulator`](crate::Error::Simulator) if the run failed.
    fn ready(&mut self, id: TrialId) -> Result<bool>;

    /// Raw result of a completed trial.
    ///
    /// # Errors
    ///
    /// Fails if the trial is not ready.
    fn get(&mut self, id: TrialId) -> Result<Self::Output>;

    /// Releases resources of a completed trial.
    ///
    /// # Errors
    ///
    /// Fails if the trial is not finished.
    fn clean(&mut self, id: TrialId) -> Result<()>;

    /// Execution cost of a completed trial. Used when the problem does not
    /// provide a cost itself.
    ///
    /// # Errors
    ///
    /// Fails if the cost cannot be determined.
    fn cost(&mut self, _id: TrialId) -> Result<f64> {
        Ok(1.0)
    }

    /// Whether the simulated system reached equilibrium during the trial.
    ///
    /// Only warm-starting algorithms such as Opdyts consult this signal.
    ///
    /// # Errors
    ///
    /// Fails if the convergence information cannot be read.
    fn converged(&mut self, _id: TrialId) -> Result<bool> {
        Ok(false)
    }
}
