//! Batch Bayesian optimization with a Gaussian-process surrogate.
//!
//! # Algorithm overview
//!
//! 1. **Initial design**: the first round evaluates a Latin hypercube of
//!    `initial_sample_count` points inside the bounds.
//! 2. **Fit GP**: inputs are normalized to `[0, 1]`, objectives are
//!    standardized, and a GP with a Matérn 5/2 kernel (ARD lengthscales set
//!    to the per-dimension spread of the inputs) is fitted via Cholesky
//!    decomposition.
//! 3. **Pick a batch**: `batch_size` points are chosen one at a time by
//!    minimizing the lower confidence bound `μ - κσ` over random candidates.
//!    Each pick is added to the training data with its predicted mean
//!    ("kriging believer") before the next one is chosen, so the batch
//!    spreads out instead of piling onto one minimum.
//!
//! The GP uses at most 200 observations (the best ones) to keep the cubic
//! fitting cost bounded.
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `batch_size` | 4 | Trials per round |
//! | `initial_sample_count` | `batch_size` | Size of the initial design |
//! | `kappa` | 2.0 | Exploration weight of the confidence bound |
//! | `candidate_count` | 1000 | Random candidates per pick |
//! | `noise_variance` | 1e-6 | Observation noise added to the kernel diagonal |
//! | `seed` | random | RNG seed |

use nalgebra::{DMatrix, DVector};
use serde_json::json;

use crate::error::{Error, Result};
use crate::problem::ProblemInfo;
use crate::scheduler::Scheduler;
use crate::trial::Submission;

use super::{Algorithm, argsort, evaluate_batch, seeded_rng};

/// Maximum number of observations the GP is fitted on.
const MAX_TRAIN_POINTS: usize = 200;

/// Batch Bayesian optimization inside the problem bounds.
pub struct BatchBayesianOptimization {
    rng: fastrand::Rng,
    bounds: Vec<(f64, f64)>,
    batch_size: usize,
    initial_sample_count: usize,
    kappa: f64,
    candidate_count: usize,
    noise_variance: f64,
    /// Normalized inputs of every observation.
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
    iteration: usize,
}

impl BatchBayesianOptimization {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> BatchBayesianOptimizationBuilder {
        BatchBayesianOptimizationBuilder::default()
    }

    /// Number of observations collected so far.
    #[must_use]
    pub fn observations(&self) -> usize {
        self.y.len()
    }

    /// Best observation in problem coordinates.
    #[must_use]
    pub fn best(&self) -> Option<(Vec<f64>, f64)> {
        let index = argsort(&self.y).into_iter().next()?;
        Some((self.denormalize(&self.x[index]), self.y[index]))
    }

    /// Completed rounds.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    fn denormalize(&self, u: &[f64]) -> Vec<f64> {
        u.iter()
            .zip(&self.bounds)
            .map(|(v, &(low, high))| low + v * (high - low))
            .collect()
    }

    /// Latin hypercube in `[0, 1]^d`: one point per stratum and dimension.
    fn latin_hypercube(&mut self, count: usize) -> Vec<Vec<f64>> {
        let d = self.bounds.len();
        let mut points = vec![vec![0.0; d]; count];
        for j in 0..d {
            let mut strata: Vec<usize> = (0..count).collect();
            self.rng.shuffle(&mut strata);
            for (point, stratum) in points.iter_mut().zip(strata) {
                #[allow(clippy::cast_precision_loss)]
                let value = (stratum as f64 + self.rng.f64()) / count as f64;
                point[j] = value;
            }
        }
        points
    }

    /// Training set for the surrogate, capped at the best observations.
    fn training_set(&self) -> (Vec<Vec<f64>>, Vec<f64>) {
        if self.y.len() <= MAX_TRAIN_POINTS {
            return (self.x.clone(), self.y.clone());
        }
        argsort(&self.y)
            .into_iter()
            .take(MAX_TRAIN_POINTS)
            .map(|i| (self.x[i].clone(), self.y[i]))
            .unzip()
    }

    fn random_point(&mut self) -> Vec<f64> {
        (0..self.bounds.len()).map(|_| self.rng.f64()).collect()
    }

    /// Chooses the next batch in normalized coordinates.
    fn propose(&mut self) -> Vec<Vec<f64>> {
        let (mut x_train, mut y_train) = self.training_set();
        let mut batch = Vec::with_capacity(self.batch_size);

        for _ in 0..self.batch_size {
            let Some(model) = GpModel::fit(&x_train, &y_train, self.noise_variance) else {
                trace_warn!(
                    observations = y_train.len(),
                    "GP fit failed, falling back to a random point"
                );
                let point = self.random_point();
                batch.push(point);
                continue;
            };

            let mut best_bound = f64::INFINITY;
            let mut best_point = self.random_point();
            for _ in 0..self.candidate_count {
                let candidate = self.random_point();
                let (mean, std) = model.predict(&candidate);
                let bound = mean - self.kappa * std;
                if bound < best_bound {
                    best_bound = bound;
                    best_point = candidate;
                }
            }

            let (believed, _) = model.predict(&best_point);
            x_train.push(best_point.clone());
            y_train.push(model.unstandardize(believed));
            batch.push(best_point);
        }
        batch
    }
}

impl Algorithm for BatchBayesianOptimization {
    fn name(&self) -> &'static str {
        "batch bayesian optimization"
    }

    fn advance(&mut self, scheduler: &mut dyn Scheduler) -> Result<()> {
        if scheduler.is_finished() {
            return Ok(());
        }
        self.iteration += 1;
        trace_info!(
            iteration = self.iteration,
            observations = self.y.len(),
            "starting batch Bayesian optimization iteration"
        );

        let (points, kind) = if self.y.is_empty() {
            (self.latin_hypercube(self.initial_sample_count), "initial")
        } else {
            (self.propose(), "acquisition")
        };

        let submissions = points
            .iter()
            .map(|u| {
                Submission::new(self.denormalize(u))
                    .annotation("type", json!(kind))
                    .annotation("iteration", json!(self.iteration))
            })
            .collect();
        let evaluations = evaluate_batch(scheduler, submissions)?;

        for (u, evaluation) in points.into_iter().zip(evaluations) {
            if !evaluation.objective.is_finite() {
                return Err(Error::Problem(format!(
                    "non-finite objective {} in batch Bayesian optimization",
                    evaluation.objective
                )));
            }
            self.x.push(u);
            self.y.push(evaluation.objective);
        }
        Ok(())
    }
}

/// Builder for [`BatchBayesianOptimization`].
///
/// # Defaults
///
/// - `batch_size`: 4
/// - `initial_sample_count`: the batch size
/// - `kappa`: 2.0
/// - `candidate_count`: 1000
/// - `noise_variance`: 1e-6
/// - `seed`: random
#[derive(Debug, Clone)]
pub struct BatchBayesianOptimizationBuilder {
    batch_size: usize,
    initial_sample_count: Option<usize>,
    kappa: f64,
    candidate_count: usize,
    noise_variance: f64,
    seed: Option<u64>,
}

impl Default for BatchBayesianOptimizationBuilder {
    fn default() -> Self {
        Self {
            batch_size: 4,
            initial_sample_count: None,
            kappa: 2.0,
            candidate_count: 1000,
            noise_variance: 1e-6,
            seed: None,
        }
    }
}

impl BatchBayesianOptimizationBuilder {
    /// Trials per round.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Size of the Latin-hypercube design of the first round.
    #[must_use]
    pub fn initial_sample_count(mut self, count: usize) -> Self {
        self.initial_sample_count = Some(count);
        self
    }

    /// Exploration weight `κ` of the lower confidence bound.
    #[must_use]
    pub fn kappa(mut self, kappa: f64) -> Self {
        self.kappa = kappa;
        self
    }

    /// Random candidates scored per pick.
    #[must_use]
    pub fn candidate_count(mut self, count: usize) -> Self {
        self.candidate_count = count;
        self
    }

    /// Observation noise added to the kernel diagonal. Larger values make
    /// the surrogate smoother.
    #[must_use]
    pub fn noise_variance(mut self, variance: f64) -> Self {
        self.noise_variance = variance;
        self
    }

    /// Seed of the design and candidate sampler.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the optimizer over the problem's bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] without bounds and
    /// [`Error::InvalidConfig`] for a zero batch, design, or candidate count,
    /// a negative `kappa`, or a non-positive noise variance.
    pub fn build(self, info: &ProblemInfo) -> Result<BatchBayesianOptimization> {
        let bounds = info.require_bounds("batch bayesian optimization")?.to_vec();
        let initial_sample_count = self.initial_sample_count.unwrap_or(self.batch_size);
        if self.batch_size == 0 || initial_sample_count == 0 || self.candidate_count == 0 {
            return Err(Error::InvalidConfig(
                "batch size, initial sample count and candidate count must be positive".into(),
            ));
        }
        if self.kappa.is_nan()
            || self.kappa < 0.0
            || self.noise_variance.is_nan()
            || self.noise_variance <= 0.0
        {
            return Err(Error::InvalidConfig(format!(
                "kappa must be non-negative and noise variance positive, got {} and {}",
                self.kappa, self.noise_variance
            )));
        }
        Ok(BatchBayesianOptimization {
            rng: seeded_rng(self.seed),
            bounds,
            batch_size: self.batch_size,
            initial_sample_count,
            kappa: self.kappa,
            candidate_count: self.candidate_count,
            noise_variance: self.noise_variance,
            x: Vec::new(),
            y: Vec::new(),
            iteration: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// Gaussian process
// ---------------------------------------------------------------------------

/// A fitted GP on standardized targets.
struct GpModel {
    /// Cholesky factor of K + σ²I.
    cholesky: nalgebra::linalg::Cholesky<f64, nalgebra::Dyn>,
    /// (K + σ²I)^{-1} y.
    alpha: DVector<f64>,
    x_train: Vec<Vec<f64>>,
    lengthscales: Vec<f64>,
    y_mean: f64,
    y_std: f64,
}

impl GpModel {
    /// Returns `None` on an empty training set or a failed decomposition.
    #[allow(clippy::cast_precision_loss)]
    fn fit(x_train: &[Vec<f64>], y_train: &[f64], noise_variance: f64) -> Option<Self> {
        let n = y_train.len();
        let d = x_train.first()?.len();

        let y_mean = y_train.iter().sum::<f64>() / n as f64;
        let y_var = if n > 1 {
            y_train.iter().map(|&y| (y - y_mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            1.0
        };
        let y_std = y_var.sqrt().max(1e-10);
        let standardized: Vec<f64> = y_train.iter().map(|&y| (y - y_mean) / y_std).collect();

        let lengthscales: Vec<f64> = (0..d)
            .map(|j| {
                let mean = x_train.iter().map(|x| x[j]).sum::<f64>() / n as f64;
                let var = x_train.iter().map(|x| (x[j] - mean).powi(2)).sum::<f64>() / n as f64;
                var.sqrt().max(0.01)
            })
            .collect();

        let k = DMatrix::from_fn(n, n, |i, j| {
            let k = matern52(&x_train[i], &x_train[j], &lengthscales);
            if i == j { k + noise_variance } else { k }
        });
        let cholesky = nalgebra::linalg::Cholesky::new(k)?;
        let alpha = cholesky.solve(&DVector::from_column_slice(&standardized));

        Some(Self {
            cholesky,
            alpha,
            x_train: x_train.to_vec(),
            lengthscales,
            y_mean,
            y_std,
        })
    }

    /// Standardized posterior mean and standard deviation at `x`.
    fn predict(&self, x: &[f64]) -> (f64, f64) {
        let k_star = DVector::from_fn(self.x_train.len(), |i, _| {
            matern52(x, &self.x_train[i], &self.lengthscales)
        });
        let mean = k_star.dot(&self.alpha);
        let v = self.cholesky.solve(&k_star);
        let var = (1.0 - k_star.dot(&v)).max(0.0);
        (mean, var.sqrt())
    }

    fn unstandardize(&self, value: f64) -> f64 {
        value * self.y_std + self.y_mean
    }
}

/// Unit-variance Matérn 5/2 kernel with ARD lengthscales.
///
/// `k(x1, x2) = (1 + √5 r + 5/3 r²) exp(-√5 r)`
fn matern52(x1: &[f64], x2: &[f64], lengthscales: &[f64]) -> f64 {
    let r_sq: f64 = x1
        .iter()
        .zip(x2)
        .zip(lengthscales)
        .map(|((a, b), l)| ((a - b) / l).powi(2))
        .sum();
    let sqrt5_r = (5.0 * r_sq).sqrt();
    (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
}
