//! Simultaneous perturbation stochastic approximation.

use serde_json::json;

use crate::error::Result;
use crate::problem::ProblemInfo;
use crate::scheduler::Scheduler;
use crate::trial::Submission;
use crate::types::Map;

use super::{Algorithm, GainSchedule, evaluate_batch, rademacher, seeded_rng};

/// SPSA: two trials per round, regardless of the dimension.
///
/// Each round draws one Rademacher direction `delta`, evaluates
/// `theta + c_k * delta` and `theta - c_k * delta`, and steps along
/// `-a_k * (f+ - f-) / (2 c_k) / delta`.
pub struct Spsa {
    gains: GainSchedule,
    rng: fastrand::Rng,
    parameters: Vec<f64>,
    gradient: Option<Vec<f64>>,
    compute_objective: bool,
    iteration: usize,
}

impl Spsa {
    /// Creates a builder with the gradient factor `a` and perturbation
    /// factor `c`.
    #[must_use]
    pub fn builder(gradient_factor: f64, perturbation_factor: f64) -> SpsaBuilder {
        SpsaBuilder {
            gains: GainSchedule::new(gradient_factor, perturbation_factor),
            seed: None,
            compute_objective: false,
        }
    }

    /// Current estimate `theta`.
    #[must_use]
    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    /// Gradient estimate of the last round.
    #[must_use]
    pub fn gradient(&self) -> Option<&[f64]> {
        self.gradient.as_deref()
    }

    /// Completed rounds.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

impl Algorithm for Spsa {
    fn name(&self) -> &'static str {
        "spsa"
    }

    fn advance(&mut self, scheduler: &mut dyn Scheduler) -> Result<()> {
        let k = self.iteration + 1;
        trace_info!(iteration = k, "starting SPSA iteration");

        let gradient_length = self.gains.gradient_length(k);
        let perturbation_length = self.gains.perturbation_length(k);
        let direction = rademacher(&mut self.rng, self.parameters.len());

        let annotations = |kind: &str| -> Map {
            let mut map = Map::new();
            map.insert("gradient_length".into(), json!(gradient_length));
            map.insert("perturbation_length".into(), json!(perturbation_length));
            map.insert("direction".into(), json!(direction));
            map.insert("type".into(), json!(kind));
            map
        };

        let shifted = |sign: f64| -> Vec<f64> {
            self.parameters
                .iter()
                .zip(&direction)
                .map(|(theta, d)| theta + sign * perturbation_length * d)
                .collect()
        };

        let evaluations = evaluate_batch(
            scheduler,
            vec![
                Submission::new(shifted(1.0)).annotations(annotations("positive_gradient")),
                Submission::new(shifted(-1.0)).annotations(annotations("negative_gradient")),
            ],
        )?;
        let difference = evaluations[0].objective - evaluations[1].objective;

        let gradient: Vec<f64> = direction
            .iter()
            .map(|d| difference / (2.0 * perturbation_length) / d)
            .collect();
        for (theta, g) in self.parameters.iter_mut().zip(&gradient) {
            *theta -= gradient_length * g;
        }
        self.gradient = Some(gradient);
        self.iteration = k;

        if self.compute_objective && !scheduler.is_finished() {
            evaluate_batch(
                scheduler,
                vec![
                    Submission::new(self.parameters.clone())
                        .annotations(annotations("objective"))
                        .transient(true),
                ],
            )?;
        }
        Ok(())
    }
}

/// Builder for [`Spsa`].
///
/// # Defaults
///
/// - gradient offset `A`: 0, exponents 0.602 and 0.101
/// - `compute_objective`: false
/// - `seed`: random
#[derive(Debug, Clone)]
pub struct SpsaBuilder {
    gains: GainSchedule,
    seed: Option<u64>,
    compute_objective: bool,
}

impl SpsaBuilder {
    /// Stability offset `A` of the gradient gain.
    #[must_use]
    pub fn gradient_offset(mut self, offset: f64) -> Self {
        self.gains.gradient_offset = offset;
        self
    }

    /// Decay exponent `alpha` of the gradient gain.
    #[must_use]
    pub fn gradient_exponent(mut self, exponent: f64) -> Self {
        self.gains.gradient_exponent = exponent;
        self
    }

    /// Decay exponent `gamma` of the perturbation gain.
    #[must_use]
    pub fn perturbation_exponent(mut self, exponent: f64) -> Self {
        self.gains.perturbation_exponent = exponent;
        self
    }

    /// Also evaluate the updated point after every round, as a transient
    /// trial.
    #[must_use]
    pub fn compute_objective(mut self, enabled: bool) -> Self {
        self.compute_objective = enabled;
        self
    }

    /// Seed of the direction sampler.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds SPSA starting at the problem's initial values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`](crate::Error::MissingCapability)
    /// without initial values and
    /// [`Error::InvalidConfig`](crate::Error::InvalidConfig) for invalid gains.
    pub fn build(self, info: &ProblemInfo) -> Result<Spsa> {
        self.gains.validate()?;
        let parameters = info.require_initial_values("spsa")?.to_vec();
        Ok(Spsa {
            gains: self.gains,
            rng: seeded_rng(self.seed),
            parameters,
            gradient: None,
            compute_objective: self.compute_objective,
            iteration: 0,
        })
    }
}
