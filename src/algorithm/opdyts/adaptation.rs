//! Adaptation problem: refit the selection weights `(v, w)` against the
//! observed gap between transient and adopted performance.

use crate::error::{Error, Result};

use super::slsqp::{Region, minimize};

/// Per-round series of one selection loop.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Round {
    pub(crate) transient: Vec<f64>,
    pub(crate) equilibrium: Vec<f64>,
    pub(crate) uniformity: Vec<f64>,
    /// Objective of the candidate that became the new anchor.
    pub(crate) selection: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct AdaptationProblem {
    pub(crate) rounds: Vec<Round>,
    pub(crate) weight: f64,
}

impl AdaptationProblem {
    /// Discount of round `r`; the most recent round has `weight^1`.
    fn discount(&self, r: usize) -> f64 {
        let exponent = i32::try_from(self.rounds.len() - r).unwrap_or(i32::MAX);
        self.weight.powi(exponent)
    }

    fn residuals(&self, vw: &[f64]) -> impl Iterator<Item = (f64, f64, f64, f64)> + '_ {
        let (v, w) = (vw[0], vw[1]);
        self.rounds.iter().enumerate().flat_map(move |(r, round)| {
            let discount = self.discount(r);
            round
                .transient
                .iter()
                .zip(&round.equilibrium)
                .zip(&round.uniformity)
                .map(move |((t, e), u)| {
                    let residual = (t - round.selection).abs() - (v * e + w * u);
                    (discount, residual, *e, *u)
                })
        })
    }

    pub(crate) fn objective(&self, vw: &[f64]) -> f64 {
        self.residuals(vw)
            .map(|(discount, residual, _, _)| discount * residual * residual)
            .sum()
    }

    /// Minimizes over `[0, 1]^2` starting at `(0, 0)`.
    pub(crate) fn solve(&self) -> Result<(f64, f64)> {
        minimize(adaptation_objective, self.clone(), &[0.0, 0.0], Region::UnitBox)
            .map(|vw| (vw[0], vw[1]))
            .map_err(|status| {
                trace_error!(
                    rounds = self.rounds.len(),
                    weight = self.weight,
                    status = %status,
                    "adaptation problem did not converge"
                );
                Error::AdaptationProblem { status }
            })
    }
}

fn adaptation_objective(
    vw: &[f64],
    gradient: Option<&mut [f64]>,
    problem: &mut AdaptationProblem,
) -> f64 {
    if let Some(gradient) = gradient {
        gradient.fill(0.0);
        for (discount, residual, e, u) in problem.residuals(vw) {
            gradient[0] -= 2.0 * discount * residual * e;
            gradient[1] -= 2.0 * discount * residual * u;
        }
    }
    problem.objective(vw)
}
