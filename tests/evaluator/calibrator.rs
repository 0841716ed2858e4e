use serde_json::json;
use simcal::prelude::*;
use simcal::{CalibrationSnapshot, ExitCriterion};

use crate::common::{DelayedSimulator, FailingSimulator, QuadraticProblem, RelaxationProblem};

type Inner = Evaluator<QuadraticProblem, DelayedSimulator>;

fn inner() -> Inner {
    Evaluator::builder(QuadraticProblem::default(), DelayedSimulator::default())
        .parallel(4)
        .build()
        .unwrap()
}

fn evaluate(calibrator: &mut Calibrator<Inner>, submission: Submission) -> Evaluation {
    let id = calibrator.submit(submission).unwrap();
    let evaluation = calibrator.get(id).unwrap();
    calibrator.clean(&[id]).unwrap();
    evaluation
}

#[test]
fn get_is_recorded_once() {
    let mut calibrator = Calibrator::new(inner());
    let id = calibrator.submit(Submission::new(vec![0.0, 0.0])).unwrap();
    let first = calibrator.get(id).unwrap();
    let second = calibrator.get(id).unwrap();
    assert_eq!(first, second);
    assert_eq!(calibrator.history().len(), 1);

    // Cleaning releases the cached result; the history keeps the record.
    calibrator.clean(&[id]).unwrap();
    assert!(matches!(calibrator.get(id), Err(Error::UnknownTrial(i)) if i == id));
    assert_eq!(calibrator.history().len(), 1);
    assert_eq!(calibrator.history()[0].objective, first.objective);
}

#[test]
fn clean_finished_releases_recorded_trials() {
    let mut calibrator = Calibrator::new(inner());
    let read = calibrator.submit(Submission::new(vec![0.0, 0.0])).unwrap();
    let unread = calibrator.submit(Submission::new(vec![1.0, 0.0])).unwrap();
    calibrator.get(read).unwrap();
    calibrator.wait(&[unread]).unwrap();

    calibrator.clean_finished().unwrap();
    assert!(matches!(calibrator.get(read), Err(Error::UnknownTrial(_))));
    assert!(matches!(calibrator.get(unread), Err(Error::UnknownTrial(_))));
    assert_eq!(calibrator.history().len(), 1);
}

#[test]
fn unknown_trial_is_rejected() {
    let mut calibrator = Calibrator::new(inner());
    assert!(matches!(
        calibrator.get(TrialId(7)),
        Err(Error::UnknownTrial(_))
    ));
}

#[test]
fn best_only_improves() {
    let mut calibrator = Calibrator::new(inner());
    let mut bests = Vec::new();
    for x in [0.0, 3.0, 1.0, -5.0, 2.0, 1.5] {
        evaluate(&mut calibrator, Submission::new(vec![x, 1.0]));
        bests.push(calibrator.best().unwrap().objective);
    }
    assert!(bests.windows(2).all(|w| w[1] <= w[0]), "bests = {bests:?}");
    let best = calibrator.best().unwrap();
    assert_eq!(best.parameters, vec![2.0, 1.0]);
    assert!(best.objective.abs() < 1e-12);
}

#[test]
fn transient_trials_never_become_best() {
    let mut calibrator = Calibrator::new(inner());
    evaluate(&mut calibrator, Submission::new(vec![0.0, 0.0]));
    evaluate(
        &mut calibrator,
        Submission::new(vec![2.0, 1.0]).transient(true),
    );
    assert_eq!(calibrator.best().unwrap().parameters, vec![0.0, 0.0]);
    assert_eq!(calibrator.history().len(), 2);
    assert!(calibrator.history()[1].transient);
}

#[test]
fn tolerance_finishes_successfully() {
    let mut calibrator = Calibrator::builder(inner()).tolerance(0.5).build();
    evaluate(&mut calibrator, Submission::new(vec![0.0, 0.0])); // 5
    evaluate(&mut calibrator, Submission::new(vec![1.0, 1.0])); // 1, delta 4
    assert!(!calibrator.is_finished());
    evaluate(&mut calibrator, Submission::new(vec![1.5, 1.0])); // 0.25, delta 0.75
    assert!(!calibrator.is_finished());
    evaluate(&mut calibrator, Submission::new(vec![1.9, 1.0])); // 0.01, delta 0.24
    assert!(calibrator.is_finished());
    assert!(calibrator.is_success());
    assert_eq!(calibrator.exit_criterion(), Some(ExitCriterion::Tolerance));
}

#[test]
fn evaluation_budget_stops_after_being_exceeded() {
    let mut calibrator = Calibrator::builder(inner()).maximum_evaluations(2).build();
    evaluate(&mut calibrator, Submission::new(vec![0.0, 0.0]));
    evaluate(&mut calibrator, Submission::new(vec![1.0, 0.0]));
    assert!(!calibrator.is_finished());
    evaluate(&mut calibrator, Submission::new(vec![2.0, 1.0]));
    assert!(calibrator.is_finished());
    assert!(!calibrator.is_success());
    assert_eq!(
        calibrator.exit_criterion(),
        Some(ExitCriterion::MaximumEvaluations)
    );
    // The trial that crossed the budget is not adopted as best.
    assert_eq!(calibrator.best().unwrap().parameters, vec![1.0, 0.0]);
}

#[test]
fn cost_budget_uses_reported_costs() {
    let problem = QuadraticProblem { cost: Some(2.0) };
    let evaluator = Evaluator::new(problem, DelayedSimulator::default()).unwrap();
    let mut calibrator = Calibrator::builder(evaluator).maximum_cost(5.0).build();

    for _ in 0..2 {
        let id = calibrator.submit(Submission::new(vec![0.0, 0.0])).unwrap();
        calibrator.get(id).unwrap();
    }
    assert!(!calibrator.is_finished());
    let id = calibrator.submit(Submission::new(vec![0.0, 0.0])).unwrap();
    calibrator.get(id).unwrap();
    assert!(calibrator.is_finished());
    assert_eq!(calibrator.exit_criterion(), Some(ExitCriterion::MaximumCost));
    assert!((calibrator.history()[2].total_cost - 6.0).abs() < 1e-12);
}

#[test]
fn history_keeps_annotations_and_simulator_configuration() {
    let mut calibrator = Calibrator::new(inner());
    let mut extra = Map::new();
    extra.insert("iterations".into(), json!(3));
    evaluate(
        &mut calibrator,
        Submission::new(vec![0.0, 0.0])
            .extra(extra)
            .annotation("type", json!("candidate")),
    );
    let entry = &calibrator.history()[0];
    assert_eq!(entry.annotations["type"], json!("candidate"));
    assert_eq!(entry.simulator_parameters["iterations"], json!(3));
    assert_eq!(entry.simulator_parameters["x"], json!([0.0, 0.0]));
    assert_eq!(
        entry.simulator_parameters["config"],
        json!({ "threads": 1, "seed": 0 })
    );
    assert_eq!(entry.simulator_parameters.len(), 3);
    assert_eq!(entry.evaluations, 1);
    assert!((entry.cost - 1.0).abs() < 1e-12);
}

#[test]
fn snapshot_is_written_after_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");

    let problem = RelaxationProblem::default();
    let evaluator = Evaluator::new(QuadraticProblem::default(), DelayedSimulator::default()).unwrap();
    let mut calibrator = Calibrator::builder(evaluator)
        .describe(&problem)
        .log_path(&path)
        .method_details(
            serde_json::from_value(json!({ "algorithm": "manual" })).unwrap(),
        )
        .build();

    evaluate(&mut calibrator, Submission::new(vec![0.0, 0.0]));
    let snapshot = CalibrationSnapshot::load(&path).unwrap();
    assert_eq!(snapshot.history.len(), 1);

    evaluate(&mut calibrator, Submission::new(vec![2.0, 1.0]));
    let snapshot = CalibrationSnapshot::load(&path).unwrap();
    assert_eq!(snapshot.history.len(), 2);
    assert_eq!(snapshot.best_parameters, Some(vec![2.0, 1.0]));
    assert_eq!(snapshot.reference_state, Some(vec![2.0, 1.0, 1.0]));
    assert_eq!(snapshot.method_details["algorithm"], json!("manual"));
    assert_eq!(snapshot.problem.number_of_parameters, 2);
    assert_eq!(snapshot, calibrator.snapshot());
}

#[test]
fn loading_a_missing_snapshot_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        CalibrationSnapshot::load(dir.path().join("missing.json")),
        Err(Error::Storage(_))
    ));
}

#[test]
fn snapshot_survives_a_failed_trial() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let evaluator =
        Evaluator::new(QuadraticProblem::default(), FailingSimulator::failing_from(2)).unwrap();
    let mut calibrator = Calibrator::builder(evaluator).log_path(&path).build();

    for x in [[0.0, 0.0], [2.0, 1.0]] {
        let id = calibrator.submit(Submission::new(x.to_vec())).unwrap();
        calibrator.get(id).unwrap();
        calibrator.clean(&[id]).unwrap();
    }
    let id = calibrator.submit(Submission::new(vec![1.0, 1.0])).unwrap();
    assert!(matches!(calibrator.get(id), Err(Error::Simulator(_))));
    assert_eq!(calibrator.history().len(), 2);

    let snapshot = CalibrationSnapshot::load(&path).unwrap();
    assert_eq!(snapshot.history.len(), 2);
    assert_eq!(snapshot.best_parameters, Some(vec![2.0, 1.0]));
    assert_eq!(snapshot, calibrator.snapshot());
}

#[test]
fn nan_objectives_are_stored_and_never_best() {
    struct Unstable;

    impl Problem for Unstable {
        type Output = f64;

        fn information(&self) -> ProblemInfo {
            QuadraticProblem::default().information()
        }

        fn parameterize(&self, x: &[f64]) -> Result<Parameterization> {
            QuadraticProblem::default().parameterize(x)
        }

        fn evaluate(&self, _x: &[f64], output: &f64) -> Result<Evaluation> {
            Ok(Evaluation::new(if *output > 4.0 { f64::NAN } else { *output }))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let evaluator = Evaluator::new(Unstable, DelayedSimulator::default()).unwrap();
    let mut calibrator = Calibrator::builder(evaluator).log_path(&path).build();

    let id = calibrator.submit(Submission::new(vec![0.0, 0.0])).unwrap();
    assert!(calibrator.get(id).unwrap().objective.is_nan());
    assert!(calibrator.best().is_none());
    let id = calibrator.submit(Submission::new(vec![1.0, 1.0])).unwrap();
    calibrator.get(id).unwrap();

    let snapshot = CalibrationSnapshot::load(&path).unwrap();
    assert_eq!(snapshot.history.len(), 2);
    assert!(snapshot.history[0].objective.is_nan());
    assert_eq!(snapshot.best_objective, Some(1.0));
    assert_eq!(snapshot.best_parameters, Some(vec![1.0, 1.0]));
}
