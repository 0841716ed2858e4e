//! Calibration algorithms.
//!
//! Every algorithm is a stateful strategy that, given a [`Scheduler`],
//! submits the next batch of parameter vectors, waits for them, and updates
//! its private state. One call to [`Algorithm::advance`] is one round.
//!
//! | Algorithm | Needs | Trials per round |
//! |-----------|-------|------------------|
//! | [`RandomWalk`] | `bounds` | `parallel` |
//! | [`Fdsa`] | `initial_values` | `2N` (+1 objective) |
//! | [`Spsa`] | `initial_values` | 2 (+1 objective) |
//! | [`CmaEs`] | `initial_values` | λ |
//! | [`NelderMead`] | `bounds` | 1 to `N` |
//! | [`MinimizerAdapter`] | `initial_values` | one per cost call |
//! | [`Opdyts`] | `initial_values`, `number_of_states` | candidates + transitions |
//! | [`BatchBayesianOptimization`] | `bounds` | batch size |

pub mod bbo;
pub mod cma_es;
pub mod fdsa;
mod gains;
pub mod minimizer;
pub mod nelder_mead;
pub mod opdyts;
pub mod random_walk;
pub mod spsa;

pub use bbo::BatchBayesianOptimization;
pub use cma_es::CmaEs;
pub use fdsa::Fdsa;
pub use gains::GainSchedule;
pub use minimizer::MinimizerAdapter;
pub use nelder_mead::NelderMead;
pub use opdyts::Opdyts;
pub use random_walk::RandomWalk;
pub use spsa::Spsa;

use crate::error::Result;
use crate::scheduler::Scheduler;
use crate::trial::Submission;
use crate::types::{Evaluation, TrialId};

/// A stateful calibration strategy.
pub trait Algorithm {
    /// Short human-readable name.
    fn name(&self) -> &'static str;

    /// Runs one round: submit, wait, read, update, clean.
    ///
    /// Implementations check [`Scheduler::is_finished`] at safe points and
    /// return early once it is set.
    ///
    /// # Errors
    ///
    /// Propagates scheduler failures and algorithm-specific numerical
    /// failures.
    fn advance(&mut self, scheduler: &mut dyn Scheduler) -> Result<()>;
}

impl<A: Algorithm + ?Sized> Algorithm for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn advance(&mut self, scheduler: &mut dyn Scheduler) -> Result<()> {
        (**self).advance(scheduler)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Submits every submission, waits for the batch, reads the evaluations, and
/// releases the trials.
pub(crate) fn evaluate_batch(
    scheduler: &mut dyn Scheduler,
    submissions: Vec<Submission>,
) -> Result<Vec<Evaluation>> {
    let ids = submissions
        .into_iter()
        .map(|submission| scheduler.submit(submission))
        .collect::<Result<Vec<TrialId>>>()?;
    scheduler.wait(&ids)?;
    let evaluations = scheduler.get_many(&ids)?;
    scheduler.clean(&ids)?;
    Ok(evaluations)
}

/// Indices of `values` sorted ascending; NaN sorts last.
pub(crate) fn argsort(values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    indices
}

/// Uniform sample inside per-dimension bounds.
pub(crate) fn uniform_in_bounds(rng: &mut fastrand::Rng, bounds: &[(f64, f64)]) -> Vec<f64> {
    bounds
        .iter()
        .map(|&(low, high)| low + rng.f64() * (high - low))
        .collect()
}

/// Rademacher vector: every entry is -1 or +1 with equal probability.
pub(crate) fn rademacher(rng: &mut fastrand::Rng, n: usize) -> Vec<f64> {
    (0..n)
        .map(|_| if rng.bool() { 1.0 } else { -1.0 })
        .collect()
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> fastrand::Rng {
    seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed)
}
