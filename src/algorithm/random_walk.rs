//! Uniform random search inside the problem bounds.

use crate::error::Result;
use crate::problem::ProblemInfo;
use crate::scheduler::Scheduler;
use crate::trial::Submission;

use super::{Algorithm, seeded_rng, uniform_in_bounds};

/// Samples uniformly within the declared bounds, `parallel` trials per round.
///
/// The only state is the random number generator, so two walks with the same
/// seed submit the same vectors.
///
/// # Examples
///
/// ```
/// use simcal::ProblemInfo;
/// use simcal::algorithm::RandomWalk;
///
/// let info = ProblemInfo::new(2).with_bounds(vec![(0.0, 1.0), (-5.0, 5.0)]);
/// let walk = RandomWalk::builder().parallel(4).seed(0).build(&info).unwrap();
/// assert_eq!(walk.iteration(), 0);
/// ```
pub struct RandomWalk {
    rng: fastrand::Rng,
    bounds: Vec<(f64, f64)>,
    parallel: usize,
    iteration: usize,
}

impl RandomWalk {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> RandomWalkBuilder {
        RandomWalkBuilder::default()
    }

    /// Completed rounds.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

impl Algorithm for RandomWalk {
    fn name(&self) -> &'static str {
        "random walk"
    }

    fn advance(&mut self, scheduler: &mut dyn Scheduler) -> Result<()> {
        if scheduler.is_finished() {
            return Ok(());
        }
        self.iteration += 1;
        trace_info!(iteration = self.iteration, "starting random walk iteration");

        let mut ids = Vec::with_capacity(self.parallel);
        for _ in 0..self.parallel {
            let x = uniform_in_bounds(&mut self.rng, &self.bounds);
            ids.push(scheduler.submit(Submission::new(x))?);
        }

        scheduler.wait(&ids)?;
        // Read through the scheduler so that a calibrator records the batch.
        scheduler.get_many(&ids)?;
        scheduler.clean(&ids)
    }
}

/// Builder for [`RandomWalk`].
///
/// # Defaults
///
/// - `parallel`: 1
/// - `seed`: random
#[derive(Debug, Clone)]
pub struct RandomWalkBuilder {
    parallel: usize,
    seed: Option<u64>,
}

impl Default for RandomWalkBuilder {
    fn default() -> Self {
        Self {
            parallel: 1,
            seed: None,
        }
    }
}

impl RandomWalkBuilder {
    /// Samples per round.
    #[must_use]
    pub fn parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }

    /// Seed for reproducible walks.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the walk for `info`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`](crate::Error::MissingCapability)
    /// without bounds and [`Error::InvalidConfig`](crate::Error::InvalidConfig)
    /// if `parallel` is zero.
    pub fn build(self, info: &ProblemInfo) -> Result<RandomWalk> {
        if self.parallel == 0 {
            return Err(crate::Error::InvalidConfig(
                "random walk needs at least one sample per round".into(),
            ));
        }
        let bounds = info.require_bounds("random walk")?.to_vec();
        Ok(RandomWalk {
            rng: seeded_rng(self.seed),
            bounds,
            parallel: self.parallel,
            iteration: 0,
        })
    }
}
