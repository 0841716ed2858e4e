//! Core types shared by the scheduler, the calibrator and the algorithms.

use serde::{Deserialize, Serialize};

/// Free-form JSON object used for simulator parameters and annotations.
pub type Map = serde_json::Map<String, serde_json::Value>;

/// Opaque, run-unique identifier of a trial.
///
/// Identifiers are issued from a monotone counter and are never reused within
/// the lifetime of an [`Evaluator`](crate::Evaluator).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialId(pub u64);

impl core::fmt::Display for TrialId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<TrialId> for serde_json::Value {
    fn from(id: TrialId) -> Self {
        serde_json::Value::from(id.0)
    }
}

/// The state of a trial in its lifecycle.
///
/// Transitions are strictly `Pending -> Running -> Finished`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    /// Submitted, waiting for a free slot.
    Pending,
    /// Started on the simulator.
    Running,
    /// Result fetched and evaluated.
    Finished,
}

/// Objective value and optional state vector of a finished trial.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Scalar objective to minimize.
    pub objective: f64,
    /// Optional state vector, e.g. the simulated quantities used by Opdyts.
    pub state: Option<Vec<f64>>,
}

impl Evaluation {
    /// An evaluation without state.
    #[must_use]
    pub fn new(objective: f64) -> Self {
        Self {
            objective,
            state: None,
        }
    }

    /// An evaluation carrying a state vector.
    #[must_use]
    pub fn with_state(objective: f64, state: Vec<f64>) -> Self {
        Self {
            objective,
            state: Some(state),
        }
    }
}

impl From<f64> for Evaluation {
    fn from(objective: f64) -> Self {
        Self::new(objective)
    }
}

/// Why a calibration stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitCriterion {
    /// The last improvement of the best objective was within the tolerance.
    Tolerance,
    /// More evaluations than allowed were recorded.
    MaximumEvaluations,
    /// More cost than allowed was spent.
    MaximumCost,
}
