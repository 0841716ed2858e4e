//! Trial records, submissions, and trace entries.

use serde::{Deserialize, Serialize};

use crate::types::{Evaluation, Map, TrialId, TrialStatus};

/// A request to evaluate one parameter vector.
///
/// A `Submission` is an owned value, so every trial gets its own copy of the
/// extra parameters and annotations.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use simcal::Submission;
///
/// let submission = Submission::new(vec![1.0, 2.0])
///     .annotation("type", json!("candidate"))
///     .transient(true);
/// assert!(submission.is_transient());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Submission {
    pub(crate) x: Vec<f64>,
    pub(crate) extra: Map,
    pub(crate) annotations: Map,
    pub(crate) transient: bool,
}

impl Submission {
    /// A plain submission of `x`.
    #[must_use]
    pub fn new(x: Vec<f64>) -> Self {
        Self {
            x,
            ..Self::default()
        }
    }

    /// Simulator parameters deep-merged over the problem's parameterization.
    #[must_use]
    pub fn extra(mut self, extra: Map) -> Self {
        self.extra = extra;
        self
    }

    /// Replaces all annotations.
    #[must_use]
    pub fn annotations(mut self, annotations: Map) -> Self {
        self.annotations = annotations;
        self
    }

    /// Adds a single annotation.
    #[must_use]
    pub fn annotation(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.annotations.insert(key.into(), value);
        self
    }

    /// Marks the trial as exploratory: it never affects the best-so-far.
    #[must_use]
    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// The parameter vector.
    #[must_use]
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Extra simulator parameters.
    #[must_use]
    pub fn extra_parameters(&self) -> &Map {
        &self.extra
    }

    /// Annotations.
    #[must_use]
    pub fn annotation_map(&self) -> &Map {
        &self.annotations
    }

    /// Whether the trial is transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.transient
    }
}

/// One unit of work owned by an [`Evaluator`](crate::Evaluator).
///
/// The generic `O` is the raw simulator output, kept once the trial finished.
pub struct Trial<O> {
    id: TrialId,
    x: Vec<f64>,
    parameters: Map,
    cost: Option<f64>,
    annotations: Map,
    status: TrialStatus,
    transient: bool,
    output: Option<O>,
    evaluation: Option<Evaluation>,
}

impl<O> core::fmt::Debug for Trial<O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Trial")
            .field("id", &self.id)
            .field("x", &self.x)
            .field("parameters", &self.parameters)
            .field("cost", &self.cost)
            .field("annotations", &self.annotations)
            .field("status", &self.status)
            .field("transient", &self.transient)
            .field("has_output", &self.output.is_some())
            .field("evaluation", &self.evaluation)
            .finish()
    }
}

impl<O> Trial<O> {
    pub(crate) fn pending(
        id: TrialId,
        submission: Submission,
        parameters: Map,
        cost: Option<f64>,
    ) -> Self {
        Self {
            id,
            x: submission.x,
            parameters,
            cost,
            annotations: submission.annotations,
            status: TrialStatus::Pending,
            transient: submission.transient,
            output: None,
            evaluation: None,
        }
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = TrialStatus::Running;
    }

    pub(crate) fn mark_finished(&mut self, output: O, evaluation: Evaluation, cost: f64) {
        self.output = Some(output);
        self.evaluation = Some(evaluation);
        self.cost = Some(cost);
        self.status = TrialStatus::Finished;
    }

    /// Identifier.
    #[must_use]
    pub fn id(&self) -> TrialId {
        self.id
    }

    /// Parameter vector.
    #[must_use]
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Simulator configuration after merging the extra parameters.
    #[must_use]
    pub fn parameters(&self) -> &Map {
        &self.parameters
    }

    /// Cost, known up front if the problem supplied it, otherwise once finished.
    #[must_use]
    pub fn cost(&self) -> Option<f64> {
        self.cost
    }

    /// Annotations attached by the submitting algorithm.
    #[must_use]
    pub fn annotations(&self) -> &Map {
        &self.annotations
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> TrialStatus {
        self.status
    }

    /// Whether the trial is exploratory.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Raw simulator output, once finished.
    #[must_use]
    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    /// Objective and state, once finished.
    #[must_use]
    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }
}

/// Snapshot of a trial taken at the moment it finished.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Identifier of the finished trial.
    pub id: TrialId,
    /// Parameter vector.
    pub x: Vec<f64>,
    /// Simulator configuration.
    pub parameters: Map,
    /// Annotations.
    pub annotations: Map,
    /// Whether the trial was transient.
    pub transient: bool,
    /// Cost of the trial.
    pub cost: f64,
    /// Objective value.
    pub objective: f64,
    /// State vector, if the problem returns one.
    pub state: Option<Vec<f64>>,
    /// Evaluations finished so far, this one included.
    pub evaluations: usize,
    /// Cost spent so far, this trial included.
    pub total_cost: f64,
}

impl TraceEntry {
    pub(crate) fn capture<O>(
        trial: &Trial<O>,
        evaluations: usize,
        total_cost: f64,
    ) -> Option<Self> {
        let evaluation = trial.evaluation.as_ref()?;
        Some(Self {
            id: trial.id,
            x: trial.x.clone(),
            parameters: trial.parameters.clone(),
            annotations: trial.annotations.clone(),
            transient: trial.transient,
            cost: trial.cost.unwrap_or(0.0),
            objective: evaluation.objective,
            state: evaluation.state.clone(),
            evaluations,
            total_cost,
        })
    }
}
