//! Nelder-Mead downhill simplex on top of the asynchronous scheduler.

use serde_json::json;

use crate::error::{Error, Result};
use crate::problem::ProblemInfo;
use crate::scheduler::Scheduler;
use crate::trial::Submission;

use super::{Algorithm, argsort, evaluate_batch, seeded_rng};

/// Nelder-Mead with reflection, expansion, contraction, and shrink steps.
///
/// The initial simplex has `N + 1` vertices whose coordinates are drawn from
/// the lower or upper bound of each dimension; draws with two identical
/// vertices are rejected. Every call to `advance` performs one simplex
/// transition, submitting one trial per step (the shrink step submits `N`
/// trials as one batch).
pub struct NelderMead {
    rng: fastrand::Rng,
    bounds: Vec<(f64, f64)>,
    alpha: f64,
    gamma: f64,
    rho: f64,
    sigma: f64,
    simplex: Vec<Vec<f64>>,
    values: Vec<f64>,
    iteration: usize,
}

/// The transition taken by the last round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// The simplex was evaluated for the first time.
    Initialize,
    /// The reflected point replaced the worst vertex.
    Reflect,
    /// The expanded point replaced the worst vertex.
    Expand,
    /// The contracted point replaced the worst vertex.
    Contract,
    /// All vertices moved toward the best one.
    Shrink,
}

impl NelderMead {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> NelderMeadBuilder {
        NelderMeadBuilder::default()
    }

    /// Vertices of the current simplex, best first after the first round.
    #[must_use]
    pub fn simplex(&self) -> &[Vec<f64>] {
        &self.simplex
    }

    /// Objective of each vertex.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Best vertex so far.
    #[must_use]
    pub fn best(&self) -> Option<(&[f64], f64)> {
        let index = argsort(&self.values).into_iter().next()?;
        Some((&self.simplex[index], self.values[index]))
    }

    fn initial_simplex(&mut self) -> Vec<Vec<f64>> {
        let n = self.bounds.len();
        loop {
            let simplex: Vec<Vec<f64>> = (0..=n)
                .map(|_| {
                    self.bounds
                        .iter()
                        .map(|&(low, high)| if self.rng.bool() { high } else { low })
                        .collect()
                })
                .collect();
            let duplicated = simplex
                .iter()
                .enumerate()
                .any(|(i, a)| simplex[i + 1..].iter().any(|b| a == b));
            if !duplicated {
                return simplex;
            }
        }
    }

    fn evaluate_one(
        scheduler: &mut dyn Scheduler,
        x: Vec<f64>,
        step: &str,
        iteration: usize,
    ) -> Result<f64> {
        let submission = Submission::new(x)
            .annotation("step", json!(step))
            .annotation("iteration", json!(iteration));
        Ok(evaluate_batch(scheduler, vec![submission])?[0].objective)
    }

    /// Runs one transition and reports which one was taken.
    ///
    /// # Errors
    ///
    /// Propagates scheduler failures.
    pub fn step(&mut self, scheduler: &mut dyn Scheduler) -> Result<Step> {
        self.iteration += 1;
        trace_info!(iteration = self.iteration, "starting Nelder-Mead iteration");

        if self.simplex.is_empty() {
            let simplex = self.initial_simplex();
            let submissions = simplex
                .iter()
                .map(|x| Submission::new(x.clone()).annotation("step", json!("initialize")))
                .collect();
            self.values = evaluate_batch(scheduler, submissions)?
                .into_iter()
                .map(|e| e.objective)
                .collect();
            self.simplex = simplex;
            return Ok(Step::Initialize);
        }

        let order = argsort(&self.values);
        self.simplex = order.iter().map(|&i| self.simplex[i].clone()).collect();
        self.values = order.iter().map(|&i| self.values[i]).collect();

        let n = self.simplex.len() - 1;
        let worst = self.simplex[n].clone();
        let best_value = self.values[0];
        let second_worst_value = self.values[n - 1];
        let worst_value = self.values[n];

        #[allow(clippy::cast_precision_loss)]
        let centroid: Vec<f64> = (0..n)
            .map(|d| self.simplex[..n].iter().map(|v| v[d]).sum::<f64>() / n as f64)
            .collect();
        let along = |from: &[f64], to: &[f64], factor: f64| -> Vec<f64> {
            from.iter()
                .zip(to)
                .map(|(f, t)| f + factor * (t - f))
                .collect()
        };

        let reflection = along(&centroid, &worst, -self.alpha);
        let reflection_value =
            Self::evaluate_one(scheduler, reflection.clone(), "reflect", self.iteration)?;

        if best_value <= reflection_value && reflection_value <= second_worst_value {
            self.simplex[n] = reflection;
            self.values[n] = reflection_value;
            return Ok(Step::Reflect);
        }

        if reflection_value < best_value {
            let expansion = along(&centroid, &reflection, self.gamma);
            let expansion_value =
                Self::evaluate_one(scheduler, expansion.clone(), "expand", self.iteration)?;
            if expansion_value < reflection_value {
                self.simplex[n] = expansion;
                self.values[n] = expansion_value;
                return Ok(Step::Expand);
            }
            self.simplex[n] = reflection;
            self.values[n] = reflection_value;
            return Ok(Step::Reflect);
        }

        let contraction = along(&centroid, &worst, self.rho);
        let contraction_value =
            Self::evaluate_one(scheduler, contraction.clone(), "contract", self.iteration)?;
        if contraction_value < worst_value {
            self.simplex[n] = contraction;
            self.values[n] = contraction_value;
            return Ok(Step::Contract);
        }

        let best = self.simplex[0].clone();
        let shrunk: Vec<Vec<f64>> = self.simplex[1..]
            .iter()
            .map(|v| along(&best, v, self.sigma))
            .collect();
        let submissions = shrunk
            .iter()
            .map(|x| {
                Submission::new(x.clone())
                    .annotation("step", json!("shrink"))
                    .annotation("iteration", json!(self.iteration))
            })
            .collect();
        let values = evaluate_batch(scheduler, submissions)?;
        for (k, (vertex, evaluation)) in shrunk.into_iter().zip(values).enumerate() {
            self.simplex[k + 1] = vertex;
            self.values[k + 1] = evaluation.objective;
        }
        Ok(Step::Shrink)
    }
}

impl Algorithm for NelderMead {
    fn name(&self) -> &'static str {
        "nelder-mead"
    }

    fn advance(&mut self, scheduler: &mut dyn Scheduler) -> Result<()> {
        if scheduler.is_finished() {
            return Ok(());
        }
        self.step(scheduler)?;
        Ok(())
    }
}

/// Builder for [`NelderMead`].
///
/// # Defaults
///
/// - reflection `alpha` 1, expansion `gamma` 2, contraction `rho` 0.5,
///   shrink `sigma` 0.5
/// - `seed`: random
#[derive(Debug, Clone)]
pub struct NelderMeadBuilder {
    alpha: f64,
    gamma: f64,
    rho: f64,
    sigma: f64,
    seed: Option<u64>,
}

impl Default for NelderMeadBuilder {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            seed: None,
        }
    }
}

impl NelderMeadBuilder {
    /// Reflection coefficient.
    #[must_use]
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Expansion coefficient.
    #[must_use]
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Contraction coefficient.
    #[must_use]
    pub fn rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    /// Shrink coefficient.
    #[must_use]
    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Seed of the initial simplex.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] without bounds and
    /// [`Error::InvalidConfig`] for out-of-range coefficients or degenerate
    /// bounds that cannot produce a non-degenerate simplex.
    pub fn build(self, info: &ProblemInfo) -> Result<NelderMead> {
        let bounds = info.require_bounds("nelder-mead")?.to_vec();
        let coefficients_valid = self.alpha > 0.0
            && self.gamma > 1.0
            && self.rho > 0.0
            && self.rho <= 0.5
            && self.sigma > 0.0
            && self.sigma < 1.0;
        if !coefficients_valid {
            return Err(Error::InvalidConfig(format!(
                "invalid Nelder-Mead coefficients: {self:?}"
            )));
        }
        // N + 1 distinct corners need at least log2(N + 1) non-degenerate
        // dimensions.
        let open = bounds.iter().filter(|(low, high)| low < high).count();
        if open < 64 && (1_usize << open) < bounds.len() + 1 {
            return Err(Error::InvalidConfig(
                "bounds are too narrow to build a non-degenerate simplex".into(),
            ));
        }
        Ok(NelderMead {
            rng: seeded_rng(self.seed),
            bounds,
            alpha: self.alpha,
            gamma: self.gamma,
            rho: self.rho,
            sigma: self.sigma,
            simplex: Vec::new(),
            values: Vec::new(),
            iteration: 0,
        })
    }
}
