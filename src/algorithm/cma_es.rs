//! Covariance Matrix Adaptation Evolution Strategy.
//!
//! Each call to [`advance`](super::Algorithm::advance) runs one generation:
//! sample λ candidates from `N(mean, sigma² C)`, evaluate them as one batch,
//! and move the distribution toward the best half.
//!
//! # Algorithm
//!
//! 1. Draw `x_k = mean + sigma * B * (D ∘ z_k)` with `z_k ~ N(0, I)`.
//! 2. Rank the candidates by objective (ascending).
//! 3. Recombine the best `μ = ⌊λ/2⌋` with log-rank weights into the new mean.
//! 4. Update the evolution paths `p_sigma` and `p_c` (Heaviside `h_sigma`).
//! 5. Rank-one plus rank-μ update of `C`, cumulative step-size adaptation.
//! 6. Refresh `B` and `D` from `C` every `λ / (c1 + cμ) / N / 10`
//!    evaluations.
//!
//! Termination is left to the caller.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde_json::json;

use crate::error::{Error, Result};
use crate::problem::ProblemInfo;
use crate::scheduler::Scheduler;
use crate::trial::Submission;

use super::{Algorithm, argsort, evaluate_batch};

/// Rank-based CMA-ES over the problem's parameter vector.
///
/// # Examples
///
/// ```
/// use simcal::ProblemInfo;
/// use simcal::algorithm::CmaEs;
///
/// let info = ProblemInfo::new(2).with_initial_values(vec![0.0, 0.0]);
/// let cma = CmaEs::builder().initial_step_size(0.1).seed(1000).build(&info).unwrap();
/// assert_eq!(cma.population_size(), 6);
/// ```
pub struct CmaEs {
    rng: StdRng,
    constants: CmaEsConstants,
    mean: DVector<f64>,
    sigma: f64,
    c: DMatrix<f64>,
    p_sigma: DVector<f64>,
    p_c: DVector<f64>,
    b: DMatrix<f64>,
    d: DVector<f64>,
    inv_sqrt_c: DMatrix<f64>,
    count_eval: usize,
    eigen_eval: usize,
    iteration: usize,
}

/// Constants derived from the dimension and population size.
#[derive(Clone, Debug)]
struct CmaEsConstants {
    n: usize,
    lambda: usize,
    mu: usize,
    weights: Vec<f64>,
    mu_eff: f64,
    c_sigma: f64,
    d_sigma: f64,
    c_c: f64,
    c_1: f64,
    c_mu: f64,
    chi_n: f64,
}

impl CmaEsConstants {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn new(n: usize, lambda: usize) -> Self {
        let n_f = n as f64;
        let mu = lambda / 2;

        // Log-rank weights
        let log_half_lambda = f64::midpoint(lambda as f64, 1.0).ln();
        let raw_weights: Vec<f64> = (0..mu)
            .map(|i| log_half_lambda - ((i + 1) as f64).ln())
            .collect();
        let w_sum: f64 = raw_weights.iter().sum();
        let weights: Vec<f64> = raw_weights.iter().map(|w| w / w_sum).collect();
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let c_c = (4.0 + mu_eff / n_f) / (n_f + 4.0 + 2.0 * mu_eff / n_f);
        let c_sigma = (mu_eff + 2.0) / (n_f + mu_eff + 5.0);
        let c_1 = 2.0 / ((n_f + 1.3).powi(2) + mu_eff);
        let c_mu = (1.0 - c_1).min(2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((n_f + 2.0).powi(2) + mu_eff));
        let d_sigma = 1.0 + 2.0 * (((mu_eff - 1.0) / (n_f + 1.0)).sqrt() - 1.0).max(0.0) + c_sigma;
        let chi_n = n_f.sqrt() * (1.0 - 1.0 / (4.0 * n_f) + 1.0 / (21.0 * n_f * n_f));

        Self {
            n,
            lambda,
            mu,
            weights,
            mu_eff,
            c_sigma,
            d_sigma,
            c_c,
            c_1,
            c_mu,
            chi_n,
        }
    }
}

impl CmaEs {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> CmaEsBuilder {
        CmaEsBuilder::default()
    }

    /// Number of candidates per generation (λ).
    #[must_use]
    pub fn population_size(&self) -> usize {
        self.constants.lambda
    }

    /// Current distribution mean.
    #[must_use]
    pub fn mean(&self) -> &[f64] {
        self.mean.as_slice()
    }

    /// Current step size.
    #[must_use]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Completed generations.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    fn sample_candidate(&mut self) -> DVector<f64> {
        let rng = &mut self.rng;
        let z: DVector<f64> =
            DVector::from_fn(self.constants.n, |_, _| StandardNormal.sample(&mut *rng));
        &self.mean + self.sigma * (&self.b * self.d.component_mul(&z))
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap
    )]
    fn update(&mut self, ranked: &[&DVector<f64>]) {
        let k = &self.constants;
        let n = k.n;
        let sigma = self.sigma;

        let mut new_mean = DVector::zeros(n);
        for (w, &x) in k.weights.iter().zip(ranked) {
            new_mean += *w * x;
        }
        let mean_diff = &new_mean - &self.mean;

        self.p_sigma = (1.0 - k.c_sigma) * &self.p_sigma
            + (k.c_sigma * (2.0 - k.c_sigma) * k.mu_eff).sqrt() * (&self.inv_sqrt_c * &mean_diff)
                / sigma;

        // Heaviside: stall the rank-one path while p_sigma is long.
        let p_sigma_norm = self.p_sigma.norm();
        let generations = self.count_eval as f64 / k.lambda as f64;
        let h_sigma = p_sigma_norm / (1.0 - (1.0 - k.c_sigma).powf(2.0 * generations)).sqrt() / k.chi_n
            < 1.4 + 2.0 / (n as f64 + 1.0);
        let h = if h_sigma { 1.0 } else { 0.0 };

        self.p_c = (1.0 - k.c_c) * &self.p_c
            + h * (k.c_c * (2.0 - k.c_c) * k.mu_eff).sqrt() * &mean_diff / sigma;

        let delta_h = (1.0 - h) * k.c_c * (2.0 - k.c_c);
        let rank_one = k.c_1 * (&self.p_c * self.p_c.transpose() + delta_h * &self.c);
        let mut rank_mu = DMatrix::zeros(n, n);
        for (w, &x) in k.weights.iter().zip(ranked) {
            let y = (x - &self.mean) / sigma;
            rank_mu += *w * &y * y.transpose();
        }
        self.c = (1.0 - k.c_1 - k.c_mu) * &self.c + rank_one + k.c_mu * rank_mu;

        self.sigma *= ((k.c_sigma / k.d_sigma) * (p_sigma_norm / k.chi_n - 1.0)).exp();
        self.mean = new_mean;

        let eigen_interval = k.lambda as f64 / (k.c_1 + k.c_mu) / n as f64 / 10.0;
        if (self.count_eval - self.eigen_eval) as f64 > eigen_interval {
            self.eigen_eval = self.count_eval;
            self.update_eigen();
        }

        let d_max = self.d.max();
        let d_min = self.d.min();
        if d_max > 1e7 * d_min {
            trace_warn!(d_max, d_min, "CMA-ES covariance condition exceeds 1e14");
        }
    }

    fn update_eigen(&mut self) {
        let n = self.constants.n;

        // Enforce symmetry
        self.c = (&self.c + self.c.transpose()) / 2.0;

        let eigen = self.c.clone().symmetric_eigen();
        self.d = eigen.eigenvalues.map(|lambda| lambda.max(1e-20).sqrt());
        self.b = eigen.eigenvectors;

        let d_inv = DVector::from_fn(n, |i, _| 1.0 / self.d[i]);
        self.inv_sqrt_c = &self.b * DMatrix::from_diagonal(&d_inv) * self.b.transpose();
    }
}

impl Algorithm for CmaEs {
    fn name(&self) -> &'static str {
        "cma-es"
    }

    fn advance(&mut self, scheduler: &mut dyn Scheduler) -> Result<()> {
        if scheduler.is_finished() {
            return Ok(());
        }
        self.iteration += 1;
        trace_info!(iteration = self.iteration, sigma = self.sigma, "starting CMA-ES iteration");

        let lambda = self.constants.lambda;
        self.count_eval += lambda;

        let candidates: Vec<DVector<f64>> = (0..lambda).map(|_| self.sample_candidate()).collect();
        let submissions = candidates
            .iter()
            .map(|x| {
                Submission::new(x.as_slice().to_vec())
                    .annotation("mean", json!(self.mean.as_slice()))
                    .annotation("sigma", json!(self.sigma))
                    .annotation("p_c", json!(self.p_c.as_slice()))
                    .annotation("p_sigma", json!(self.p_sigma.as_slice()))
                    .annotation("iteration", json!(self.iteration))
            })
            .collect();

        let evaluations = evaluate_batch(scheduler, submissions)?;
        let objectives: Vec<f64> = evaluations.iter().map(|e| e.objective).collect();
        if objectives.iter().any(|o| o.is_nan()) {
            return Err(Error::Problem("CMA-ES received a NaN objective".into()));
        }

        let order = argsort(&objectives);
        let ranked: Vec<&DVector<f64>> = order
            .iter()
            .take(self.constants.mu)
            .map(|&i| &candidates[i])
            .collect();
        self.update(&ranked);
        Ok(())
    }
}

/// Builder for [`CmaEs`].
///
/// # Defaults
///
/// - `initial_step_size`: 0.3
/// - `population_size`: `4 + ⌊3 ln N⌋`; smaller requests are raised to it
/// - `seed`: random
#[derive(Debug, Clone)]
pub struct CmaEsBuilder {
    initial_step_size: f64,
    population_size: Option<usize>,
    seed: Option<u64>,
}

impl Default for CmaEsBuilder {
    fn default() -> Self {
        Self {
            initial_step_size: 0.3,
            population_size: None,
            seed: None,
        }
    }
}

impl CmaEsBuilder {
    /// Initial step size `sigma`.
    #[must_use]
    pub fn initial_step_size(mut self, sigma: f64) -> Self {
        self.initial_step_size = sigma;
        self
    }

    /// Requested population size λ.
    #[must_use]
    pub fn population_size(mut self, lambda: usize) -> Self {
        self.population_size = Some(lambda);
        self
    }

    /// Seed of the candidate sampler.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds CMA-ES centered on the problem's initial values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] without initial values and
    /// [`Error::InvalidConfig`] for a non-positive step size.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn build(self, info: &ProblemInfo) -> Result<CmaEs> {
        if !self.initial_step_size.is_finite() || self.initial_step_size <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "initial step size must be positive, got {}",
                self.initial_step_size
            )));
        }
        let initial = info.require_initial_values("cma-es")?;
        let n = info.number_of_parameters;

        let default_lambda = 4 + (3.0 * (n as f64).ln()).floor() as usize;
        let lambda = match self.population_size {
            Some(requested) if requested < default_lambda => {
                trace_warn!(
                    requested,
                    default_lambda,
                    "population size below the recommended minimum, using the minimum"
                );
                default_lambda
            }
            Some(requested) => requested,
            None => default_lambda,
        };

        Ok(CmaEs {
            rng: self
                .seed
                .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64),
            constants: CmaEsConstants::new(n, lambda),
            mean: DVector::from_column_slice(initial),
            sigma: self.initial_step_size,
            c: DMatrix::identity(n, n),
            p_sigma: DVector::zeros(n),
            p_c: DVector::zeros(n),
            b: DMatrix::identity(n, n),
            d: DVector::from_element(n, 1.0),
            inv_sqrt_c: DMatrix::identity(n, n),
            count_eval: 0,
            eigen_eval: 0,
            iteration: 0,
        })
    }
}
