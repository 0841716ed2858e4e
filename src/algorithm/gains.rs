//! Decaying gain sequences for stochastic approximation.

use serde::{Deserialize, Serialize};

/// Step-size sequences `a_k = a / (k + A)^alpha` and `c_k = c / k^gamma`.
///
/// `k` counts rounds starting at 1. The default exponents are the values
/// recommended by Spall (alpha = 0.602, gamma = 0.101).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GainSchedule {
    /// `a`, scale of the gradient step.
    pub gradient_factor: f64,
    /// `A`, stability offset of the gradient step.
    pub gradient_offset: f64,
    /// `alpha`, decay of the gradient step.
    pub gradient_exponent: f64,
    /// `c`, scale of the perturbation.
    pub perturbation_factor: f64,
    /// `gamma`, decay of the perturbation.
    pub perturbation_exponent: f64,
}

impl GainSchedule {
    /// A schedule with the given factors and default offset and exponents.
    #[must_use]
    pub fn new(gradient_factor: f64, perturbation_factor: f64) -> Self {
        Self {
            gradient_factor,
            gradient_offset: 0.0,
            gradient_exponent: 0.602,
            perturbation_factor,
            perturbation_exponent: 0.101,
        }
    }

    /// `a_k` for round `k >= 1`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn gradient_length(&self, k: usize) -> f64 {
        self.gradient_factor / (k as f64 + self.gradient_offset).powf(self.gradient_exponent)
    }

    /// `c_k` for round `k >= 1`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn perturbation_length(&self, k: usize) -> f64 {
        self.perturbation_factor / (k as f64).powf(self.perturbation_exponent)
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        let positive = self.gradient_factor > 0.0 && self.perturbation_factor > 0.0;
        let offset_ok = self.gradient_offset >= 0.0;
        let exponents_ok =
            self.gradient_exponent.is_finite() && self.perturbation_exponent.is_finite();
        if !positive || !offset_ok || !exponents_ok {
            return Err(crate::Error::InvalidConfig(format!(
                "gain factors must be positive, the offset non-negative and the exponents finite, got {self:?}"
            )));
        }
        Ok(())
    }
}
