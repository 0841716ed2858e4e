//! Finite-difference stochastic approximation.

use serde_json::json;

use crate::error::Result;
use crate::problem::ProblemInfo;
use crate::scheduler::Scheduler;
use crate::trial::Submission;
use crate::types::Map;

use super::{Algorithm, GainSchedule, evaluate_batch};

/// FDSA: central differences along every coordinate, `2N` trials per round.
///
/// Same gain sequences as [`Spsa`](super::Spsa), but an exact finite
/// difference per dimension at `N` times the cost.
pub struct Fdsa {
    gains: GainSchedule,
    parameters: Vec<f64>,
    gradient: Option<Vec<f64>>,
    compute_objective: bool,
    iteration: usize,
}

impl Fdsa {
    /// Creates a builder with the gradient factor `a` and perturbation
    /// factor `c`.
    #[must_use]
    pub fn builder(gradient_factor: f64, perturbation_factor: f64) -> FdsaBuilder {
        FdsaBuilder {
            gains: GainSchedule::new(gradient_factor, perturbation_factor),
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

impl Algorithm for Fdsa {
    fn name(&self) -> &'static str {
        "fdsa"
    }

    fn advance(&mut self, scheduler: &mut dyn Scheduler) -> Result<()> {
        let k = self.iteration + 1;
        trace_info!(iteration = k, "starting FDSA iteration");

        let gradient_length = self.gains.gradient_length(k);
        let perturbation_length = self.gains.perturbation_length(k);
        let n = self.parameters.len();

        let annotations = |kind: &str, dimension: Option<usize>| -> Map {
            let mut map = Map::new();
            map.insert("gradient_length".into(), json!(gradient_length));
            map.insert("perturbation_length".into(), json!(perturbation_length));
            if let Some(dimension) = dimension {
                map.insert("dimension".into(), json!(dimension));
            }
            map.insert("type".into(), json!(kind));
            map
        };

        let mut submissions = Vec::with_capacity(2 * n);
        for d in 0..n {
            let mut positive = self.parameters.clone();
            positive[d] += perturbation_length;
            submissions
                .push(Submission::new(positive).annotations(annotations("positive_gradient", Some(d))));

            let mut negative = self.parameters.clone();
            negative[d] -= perturbation_length;
            submissions
                .push(Submission::new(negative).annotations(annotations("negative_gradient", Some(d))));
        }

        let evaluations = evaluate_batch(scheduler, submissions)?;
        let gradient: Vec<f64> = evaluations
            .chunks_exact(2)
            .map(|pair| (pair[0].objective - pair[1].objective) / (2.0 * perturbation_length))
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
                        .annotations(annotations("objective", None))
                        .transient(true),
                ],
            )?;
        }
        Ok(())
    }
}

/// Builder for [`Fdsa`].
///
/// # Defaults
///
/// - gradient offset `A`: 0, exponents 0.602 and 0.101
/// - `compute_objective`: false
#[derive(Debug, Clone)]
pub struct FdsaBuilder {
    gains: GainSchedule,
    compute_objective: bool,
}

impl FdsaBuilder {
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

    /// Builds FDSA starting at the problem's initial values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`](crate::Error::MissingCapability)
    /// without initial values and
    /// [`Error::InvalidConfig`](crate::Error::InvalidConfig) for invalid gains.
    pub fn build(self, info: &ProblemInfo) -> Result<Fdsa> {
        self.gains.validate()?;
        let parameters = info.require_initial_values("fdsa")?.to_vec();
        Ok(Fdsa {
            gains: self.gains,
            parameters,
            gradient: None,
            compute_objective: self.compute_objective,
            iteration: 0,
        })
    }
}
