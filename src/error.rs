use crate::types::TrialId;

/// Errors produced while scheduling trials, recording their outcomes, or
/// running a calibration algorithm.
///
/// Reaching a stopping condition (tolerance, evaluation or cost budget) is
/// never an error; see [`Calibrator::is_finished`](crate::Calibrator::is_finished).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a parameter vector has the wrong number of entries.
    #[error("invalid arity: expected {expected} parameters, got {got}")]
    InvalidArity {
        /// The number of parameters declared by the problem.
        expected: usize,
        /// The length of the submitted vector.
        got: usize,
    },

    /// Returned when an evaluated state vector does not match the declared
    /// number of states.
    #[error("invalid state arity for trial {id}: expected {expected} states, got {got}")]
    InvalidStateArity {
        /// The offending trial.
        id: TrialId,
        /// The number of states declared by the problem.
        expected: usize,
        /// The length of the returned state.
        got: usize,
    },

    /// Returned when a problem declares a state arity but an evaluation
    /// returned no state at all.
    #[error("trial {id} returned no state although {expected} states are declared")]
    MissingState {
        /// The offending trial.
        id: TrialId,
        /// The number of states declared by the problem.
        expected: usize,
    },

    /// Returned when an algorithm needs problem information that the problem
    /// does not provide.
    #[error("{algorithm} requires `{field}` in the problem information")]
    MissingCapability {
        /// Name of the algorithm that was being constructed.
        algorithm: &'static str,
        /// The missing information field.
        field: &'static str,
    },

    /// Returned when a component is configured with inconsistent settings.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Returned when a trial reports a negative or non-finite cost.
    #[error("invalid cost {cost} for trial {id}")]
    InvalidCost {
        /// The offending trial.
        id: TrialId,
        /// The reported cost.
        cost: f64,
    },

    /// Returned when an identifier was never submitted or was already cleaned.
    #[error("unknown trial {0}")]
    UnknownTrial(TrialId),

    /// Returned when a finished-only operation targets a trial that has not
    /// finished yet.
    #[error("trial {0} has not finished")]
    TrialNotFinished(TrialId),

    /// Returned when the external simulator fails.
    #[error("simulator error: {0}")]
    Simulator(String),

    /// Returned when the problem fails to parameterize or evaluate a trial.
    #[error("problem error: {0}")]
    Problem(String),

    /// Returned when the candidate selection problem does not converge.
    #[error("selection problem did not converge: {status}")]
    SelectionProblem {
        /// Termination status reported by the solver.
        status: String,
    },

    /// Returned when the adaptation problem does not converge.
    #[error("adaptation problem did not converge: {status}")]
    AdaptationProblem {
        /// Termination status reported by the solver.
        status: String,
    },

    /// Returned when a wrapped synchronous minimizer fails.
    #[error("minimizer error: {0}")]
    Minimizer(String),

    /// Returned when writing or reading a snapshot or journal fails.
    #[error("storage error: {0}")]
    Storage(String),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

/// A convenient alias for `Result<T, simcal::Error>`.
pub type Result<T> = core::result::Result<T, Error>;
