//! The problem capability: mapping parameter vectors to simulator
//! configuration and simulator output back to an objective.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Evaluation, Map};

/// Capabilities a problem declares up front.
///
/// Every algorithm checks the fields it needs when it is built and fails with
/// [`Error::MissingCapability`] instead of discovering the gap mid-run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemInfo {
    /// Length of every parameter vector.
    pub number_of_parameters: usize,
    /// Length of the state vector returned by [`Problem::evaluate`], if any.
    pub number_of_states: Option<usize>,
    /// Starting point for local algorithms.
    pub initial_values: Option<Vec<f64>>,
    /// Per-dimension `(low, high)` bounds.
    pub bounds: Option<Vec<(f64, f64)>>,
}

impl ProblemInfo {
    /// Information for a problem with `number_of_parameters` parameters and
    /// nothing else declared.
    #[must_use]
    pub fn new(number_of_parameters: usize) -> Self {
        Self {
            number_of_parameters,
            ..Self::default()
        }
    }

    /// Declares the number of states.
    #[must_use]
    pub fn with_states(mut self, number_of_states: usize) -> Self {
        self.number_of_states = Some(number_of_states);
        self
    }

    /// Declares the initial values.
    #[must_use]
    pub fn with_initial_values(mut self, values: Vec<f64>) -> Self {
        self.initial_values = Some(values);
        self
    }

    /// Declares per-dimension bounds.
    #[must_use]
    pub fn with_bounds(mut self, bounds: Vec<(f64, f64)>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Checks that the declared fields are consistent with each other.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if there are no parameters, if the
    /// initial values or bounds have the wrong length, or if a bound is
    /// reversed or not finite.
    pub fn validate(&self) -> Result<()> {
        let n = self.number_of_parameters;
        if n == 0 {
            return Err(Error::InvalidConfig(
                "number_of_parameters must be positive".into(),
            ));
        }
        if let Some(values) = &self.initial_values {
            if values.len() != n {
                return Err(Error::InvalidArity {
                    expected: n,
                    got: values.len(),
                });
            }
        }
        if let Some(bounds) = &self.bounds {
            if bounds.len() != n {
                return Err(Error::InvalidArity {
                    expected: n,
                    got: bounds.len(),
                });
            }
            for &(low, high) in bounds {
                if !low.is_finite() || !high.is_finite() || low > high {
                    return Err(Error::InvalidConfig(format!(
                        "invalid bounds ({low}, {high})"
                    )));
                }
            }
        }
        Ok(())
    }

    /// The declared number of states.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] if no state arity is declared.
    pub fn require_states(&self, algorithm: &'static str) -> Result<usize> {
        self.number_of_states.ok_or(Error::MissingCapability {
            algorithm,
            field: "number_of_states",
        })
    }

    /// The declared initial values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] if no initial values are declared.
    pub fn require_initial_values(&self, algorithm: &'static str) -> Result<&[f64]> {
        self.initial_values
            .as_deref()
            .ok_or(Error::MissingCapability {
                algorithm,
                field: "initial_values",
            })
    }

    /// The declared bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] if no bounds are declared.
    pub fn require_bounds(&self, algorithm: &'static str) -> Result<&[(f64, f64)]> {
        self.bounds.as_deref().ok_or(Error::MissingCapability {
            algorithm,
            field: "bounds",
        })
    }
}

/// Simulator configuration produced for one parameter vector.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parameterization {
    /// Problem-specific instructions for the simulator.
    pub parameters: Map,
    /// Execution cost of the run. `None` defers to
    /// [`Simulator::cost`](crate::Simulator::cost).
    pub cost: Option<f64>,
}

impl Parameterization {
    /// Parameters with an explicit cost.
    #[must_use]
    pub fn with_cost(parameters: Map, cost: f64) -> Self {
        Self {
            parameters,
            cost: Some(cost),
        }
    }
}

impl From<Map> for Parameterization {
    fn from(parameters: Map) -> Self {
        Self {
            parameters,
            cost: None,
        }
    }
}

/// A calibration problem.
///
/// The associated `Output` is the raw result type of the paired
/// [`Simulator`](crate::Simulator).
pub trait Problem {
    /// Raw simulator output consumed by [`evaluate`](Self::evaluate).
    type Output;

    /// Declared capabilities of the problem.
    fn information(&self) -> ProblemInfo;

    /// Maps a parameter vector to simulator configuration.
    ///
    /// # Errors
    ///
    /// Implementations return [`Error::Problem`] for vectors they cannot map.
    fn parameterize(&self, x: &[f64]) -> Result<Parameterization>;

    /// Maps the simulator output of `x` to an objective and optional state.
    ///
    /// # Errors
    ///
    /// Implementations return [`Error::Problem`] when the output cannot be
    /// interpreted.
    fn evaluate(&self, x: &[f64], output: &Self::Output) -> Result<Evaluation>;

    /// Reference state stored in calibration snapshots.
    fn reference_state(&self) -> Option<Vec<f64>> {
        None
    }

    /// Extra problem description stored in calibration snapshots.
    fn metadata(&self) -> Map {
        Map::new()
    }
}
