use serde_json::json;
use simcal::prelude::*;
use simcal::{TrialStatus, merge};

use crate::common::{
    DelayedSimulator, FailingSimulator, QuadraticProblem, RelaxationProblem, RelaxationSimulator,
};

#[test]
fn submit_wait_get_clean() {
    let mut evaluator =
        Evaluator::new(QuadraticProblem::default(), DelayedSimulator::with_delays(vec![2])).unwrap();

    let id = evaluator.submit(Submission::new(vec![0.0, 0.0])).unwrap();
    assert_eq!(evaluator.trial(id).unwrap().status(), TrialStatus::Pending);
    assert_eq!(evaluator.pending_count(), 1);

    assert!(!evaluator.ready(id).unwrap());
    assert_eq!(evaluator.trial(id).unwrap().status(), TrialStatus::Running);

    evaluator.wait(&[id]).unwrap();
    assert_eq!(evaluator.trial(id).unwrap().status(), TrialStatus::Finished);
    assert!(evaluator.ready(id).unwrap());

    let evaluation = evaluator.get(id).unwrap();
    assert!((evaluation.objective - 5.0).abs() < 1e-12);
    assert!(evaluation.state.is_none());
    assert_eq!(evaluator.evaluations(), 1);
    assert!((evaluator.total_cost() - 1.0).abs() < 1e-12);

    evaluator.clean(&[id]).unwrap();
    assert!(evaluator.trial(id).is_none());
    assert_eq!(evaluator.simulator().cleaned, vec![id]);
    assert!(matches!(evaluator.get(id), Err(Error::UnknownTrial(i)) if i == id));
}

#[test]
fn get_blocks_until_finished() {
    let mut evaluator =
        Evaluator::new(QuadraticProblem::default(), DelayedSimulator::with_delays(vec![5])).unwrap();
    let id = evaluator.submit(Submission::new(vec![2.0, 1.0])).unwrap();
    let evaluation = evaluator.get(id).unwrap();
    assert!(evaluation.objective.abs() < 1e-12);
}

#[test]
fn identifiers_are_unique_and_monotone() {
    let mut evaluator =
        Evaluator::new(QuadraticProblem::default(), DelayedSimulator::default()).unwrap();
    let mut ids = Vec::new();
    for _ in 0..5 {
        let id = evaluator.submit(Submission::new(vec![1.0, 1.0])).unwrap();
        evaluator.clean(&[id]).unwrap();
        ids.push(id);
    }
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids = {ids:?}");
}

#[test]
fn wrong_arity_is_rejected() {
    let mut evaluator =
        Evaluator::new(QuadraticProblem::default(), DelayedSimulator::default()).unwrap();
    let result = evaluator.submit(Submission::new(vec![1.0, 2.0, 3.0]));
    assert!(matches!(
        result,
        Err(Error::InvalidArity {
            expected: 2,
            got: 3
        })
    ));
    assert_eq!(evaluator.pending_count(), 0);
}

#[test]
fn unknown_identifiers_are_rejected() {
    let mut evaluator =
        Evaluator::new(QuadraticProblem::default(), DelayedSimulator::default()).unwrap();
    assert!(matches!(
        evaluator.wait(&[TrialId(42)]),
        Err(Error::UnknownTrial(_))
    ));
    assert!(matches!(
        evaluator.ready(TrialId(42)),
        Err(Error::UnknownTrial(_))
    ));
}

#[test]
fn extra_parameters_are_deep_merged() {
    let mut evaluator =
        Evaluator::new(QuadraticProblem::default(), DelayedSimulator::default()).unwrap();
    let mut extra = Map::new();
    extra.insert("config".into(), json!({ "threads": 8 }));
    extra.insert("iterations".into(), json!(20));

    let id = evaluator
        .submit(Submission::new(vec![0.0, 0.0]).extra(extra))
        .unwrap();
    evaluator.wait(&[id]).unwrap();

    let configuration = &evaluator.simulator().configurations[0];
    assert_eq!(configuration["config"], json!({ "threads": 8, "seed": 0 }));
    assert_eq!(configuration["iterations"], json!(20));
    assert_eq!(configuration["x"], json!([0.0, 0.0]));
    assert_eq!(evaluator.trial(id).unwrap().parameters(), configuration);
}

#[test]
fn merge_replaces_non_object_values() {
    let base: Map = serde_json::from_value(json!({ "a": { "b": 1, "c": [1, 2] }, "d": 1 })).unwrap();
    let overrides: Map = serde_json::from_value(json!({ "a": { "c": [3] }, "d": { "e": 2 } })).unwrap();
    let merged = merge::merged(&base, &overrides);
    assert_eq!(
        serde_json::Value::Object(merged),
        json!({ "a": { "b": 1, "c": [3] }, "d": { "e": 2 } })
    );
}

#[test]
fn problem_cost_overrides_simulator_cost() {
    let problem = QuadraticProblem { cost: Some(2.5) };
    let mut evaluator = Evaluator::new(problem, DelayedSimulator::default()).unwrap();
    let id = evaluator.submit(Submission::new(vec![0.0, 0.0])).unwrap();
    evaluator.wait(&[id]).unwrap();
    assert!((evaluator.cost(id).unwrap() - 2.5).abs() < 1e-12);
    assert!((evaluator.total_cost() - 2.5).abs() < 1e-12);
}

#[test]
fn negative_cost_is_rejected() {
    let problem = QuadraticProblem { cost: Some(-1.0) };
    let mut evaluator = Evaluator::new(problem, DelayedSimulator::default()).unwrap();
    assert!(matches!(
        evaluator.submit(Submission::new(vec![0.0, 0.0])),
        Err(Error::InvalidCost { .. })
    ));

    let simulator = DelayedSimulator {
        cost: Some(f64::NAN),
        ..DelayedSimulator::default()
    };
    let mut evaluator = Evaluator::new(QuadraticProblem::default(), simulator).unwrap();
    let id = evaluator.submit(Submission::new(vec![0.0, 0.0])).unwrap();
    assert!(matches!(
        evaluator.wait(&[id]),
        Err(Error::InvalidCost { .. })
    ));
}

#[test]
fn cost_of_unfinished_trial_is_an_error() {
    let mut evaluator =
        Evaluator::new(QuadraticProblem::default(), DelayedSimulator::with_delays(vec![3])).unwrap();
    let id = evaluator.submit(Submission::new(vec![0.0, 0.0])).unwrap();
    assert!(matches!(evaluator.cost(id), Err(Error::TrialNotFinished(_))));
}

#[test]
fn states_are_checked_against_declared_arity() {
    let mut evaluator =
        Evaluator::new(RelaxationProblem::default(), RelaxationSimulator::default()).unwrap();
    let id = evaluator.submit(Submission::new(vec![1.0, 1.0])).unwrap();
    let evaluation = evaluator.get(id).unwrap();
    assert_eq!(evaluation.state.map(|s| s.len()), Some(3));

    let simulator = RelaxationSimulator {
        returned_states: Some(2),
        ..RelaxationSimulator::default()
    };
    let mut evaluator = Evaluator::new(RelaxationProblem::default(), simulator).unwrap();
    let id = evaluator.submit(Submission::new(vec![1.0, 1.0])).unwrap();
    assert!(matches!(
        evaluator.get(id),
        Err(Error::InvalidStateArity {
            expected: 3,
            got: 2,
            ..
        })
    ));
}

#[test]
fn declared_states_are_optional_per_evaluation() {
    struct Stateless;

    impl Problem for Stateless {
        type Output = f64;

        fn information(&self) -> ProblemInfo {
            ProblemInfo::new(2).with_states(2)
        }

        fn parameterize(&self, x: &[f64]) -> Result<Parameterization> {
            QuadraticProblem::default().parameterize(x)
        }

        fn evaluate(&self, _x: &[f64], output: &f64) -> Result<Evaluation> {
            Ok(Evaluation::new(*output))
        }
    }

    let mut evaluator = Evaluator::new(Stateless, DelayedSimulator::default()).unwrap();
    let id = evaluator.submit(Submission::new(vec![2.0, 1.0])).unwrap();
    let evaluation = evaluator.get(id).unwrap();
    assert!(evaluation.objective.abs() < 1e-12);
    assert!(evaluation.state.is_none());
}

#[test]
fn simulator_errors_reach_the_caller() {
    let mut evaluator =
        Evaluator::new(QuadraticProblem::default(), FailingSimulator::failing_from(1)).unwrap();
    let healthy = evaluator.submit(Submission::new(vec![2.0, 1.0])).unwrap();
    let crashed = evaluator.submit(Submission::new(vec![0.0, 0.0])).unwrap();

    assert!(evaluator.get(healthy).unwrap().objective.abs() < 1e-12);
    assert!(matches!(evaluator.get(crashed), Err(Error::Simulator(_))));
    assert_eq!(evaluator.evaluations(), 1);
}

#[test]
fn problem_evaluation_errors_reach_the_caller() {
    struct Rejecting;

    impl Problem for Rejecting {
        type Output = f64;

        fn information(&self) -> ProblemInfo {
            ProblemInfo::new(2)
        }

        fn parameterize(&self, x: &[f64]) -> Result<Parameterization> {
            QuadraticProblem::default().parameterize(x)
        }

        fn evaluate(&self, _x: &[f64], output: &f64) -> Result<Evaluation> {
            Err(Error::Problem(format!("output {output} is out of range")))
        }
    }

    let mut evaluator = Evaluator::new(Rejecting, DelayedSimulator::default()).unwrap();
    let id = evaluator.submit(Submission::new(vec![0.0, 0.0])).unwrap();
    assert!(matches!(evaluator.get(id), Err(Error::Problem(_))));
    assert_eq!(evaluator.evaluations(), 0);
}

#[test]
fn invalid_problem_information_is_rejected() {
    struct Broken;

    impl Problem for Broken {
        type Output = f64;

        fn information(&self) -> ProblemInfo {
            ProblemInfo::new(2).with_initial_values(vec![0.0])
        }

        fn parameterize(&self, _x: &[f64]) -> Result<Parameterization> {
            Ok(Map::new().into())
        }

        fn evaluate(&self, _x: &[f64], output: &f64) -> Result<Evaluation> {
            Ok(Evaluation::new(*output))
        }
    }

    assert!(Evaluator::new(Broken, DelayedSimulator::default()).is_err());
    assert!(matches!(
        Evaluator::builder(QuadraticProblem::default(), DelayedSimulator::default())
            .parallel(0)
            .build(),
        Err(Error::InvalidConfig(_))
    ));
}
