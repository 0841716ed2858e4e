//! Approximate selection problem: the distribution over candidates that
//! trades transient performance against equilibrium and uniformity gaps.

use crate::error::{Error, Result};

use super::slsqp::{Region, minimize};

/// One instance of the selection problem.
#[derive(Clone, Debug)]
pub(crate) struct SelectionProblem {
    objectives: Vec<f64>,
    /// `|delta_i|^2` per candidate.
    squared_norms: Vec<f64>,
    v: f64,
    w: f64,
}

/// Gaps of a distribution, recorded for the adaptation problem.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Gaps {
    pub(crate) transient: f64,
    pub(crate) equilibrium: f64,
    pub(crate) uniformity: f64,
}

impl SelectionProblem {
    pub(crate) fn new(objectives: Vec<f64>, deltas: &[Vec<f64>], v: f64, w: f64) -> Self {
        let squared_norms = deltas
            .iter()
            .map(|d| d.iter().map(|x| x * x).sum())
            .collect();
        Self {
            objectives,
            squared_norms,
            v,
            w,
        }
    }

    pub(crate) fn gaps(&self, alpha: &[f64]) -> Gaps {
        let transient = alpha.iter().zip(&self.objectives).map(|(a, f)| a * f).sum();
        let equilibrium = alpha
            .iter()
            .zip(&self.squared_norms)
            .map(|(a, n)| a * a * n)
            .sum::<f64>()
            .sqrt();
        let uniformity = alpha.iter().map(|a| a * a).sum();
        Gaps {
            transient,
            equilibrium,
            uniformity,
        }
    }

    pub(crate) fn objective(&self, alpha: &[f64]) -> f64 {
        let gaps = self.gaps(alpha);
        gaps.transient + self.v * gaps.equilibrium + self.w * gaps.uniformity
    }

    fn fill_gradient(&self, alpha: &[f64], equilibrium: f64, gradient: &mut [f64]) {
        for (((g, a), f), n) in gradient
            .iter_mut()
            .zip(alpha)
            .zip(&self.objectives)
            .zip(&self.squared_norms)
        {
            let equilibrium_term = if equilibrium > 0.0 {
                self.v * a * n / equilibrium
            } else {
                0.0
            };
            *g = f + equilibrium_term + 2.0 * self.w * a;
        }
    }

    /// Minimizes the selection objective over the probability simplex,
    /// starting from the uniform distribution.
    pub(crate) fn solve(&self) -> Result<Vec<f64>> {
        let n = self.objectives.len();
        #[allow(clippy::cast_precision_loss)]
        let start = vec![1.0 / n as f64; n];

        minimize(selection_objective, self.clone(), &start, Region::Simplex).map_err(|status| {
            trace_error!(
                objectives = ?self.objectives,
                squared_norms = ?self.squared_norms,
                v = self.v,
                w = self.w,
                status = %status,
                "selection problem did not converge"
            );
            Error::SelectionProblem { status }
        })
    }
}

fn selection_objective(
    alpha: &[f64],
    gradient: Option<&mut [f64]>,
    problem: &mut SelectionProblem,
) -> f64 {
    let gaps = problem.gaps(alpha);
    if let Some(gradient) = gradient {
        problem.fill_gradient(alpha, gaps.equilibrium, gradient);
    }
    gaps.transient + problem.v * gaps.equilibrium + problem.w * gaps.uniformity
}
