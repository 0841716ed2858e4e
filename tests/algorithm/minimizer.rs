use serde_json::json;
use simcal::algorithm::MinimizerAdapter;
use simcal::prelude::*;

use crate::common::{DelayedSimulator, QuadraticProblem, TARGET};

fn evaluator() -> Evaluator<QuadraticProblem, DelayedSimulator> {
    Evaluator::builder(QuadraticProblem::default(), DelayedSimulator::default())
        .build()
        .unwrap()
}

#[test]
fn converges_to_the_minimum() {
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut minimizer = MinimizerAdapter::builder()
        .max_iterations(200)
        .sd_tolerance(1e-10)
        .initial_step(0.5)
        .build(&info)
        .unwrap();

    minimizer.advance(&mut evaluator).unwrap();
    minimizer.advance(&mut evaluator).unwrap();

    let (x, objective) = minimizer.best().unwrap();
    assert!(objective < 1e-6, "objective {objective} at {x:?}");
    for (a, b) in x.iter().zip(TARGET) {
        assert!((a - b).abs() < 1e-3);
    }
    assert_eq!(minimizer.current(), x);
    assert_eq!(minimizer.iteration(), 2);
}

#[test]
fn every_cost_call_is_one_annotated_trial() {
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut minimizer = MinimizerAdapter::builder()
        .max_iterations(5)
        .build(&info)
        .unwrap();
    minimizer.advance(&mut evaluator).unwrap();

    let trace = evaluator.fetch_trace();
    assert!(!trace.is_empty());
    assert_eq!(evaluator.evaluations(), trace.len());
    assert!(trace.iter().all(|e| {
        e.annotations["type"] == json!("minimizer") && e.annotations["iteration"] == json!(1)
    }));
    // The initial simplex is evaluated first.
    assert_eq!(trace[0].x, vec![0.0, 0.0]);
    assert_eq!(trace[1].x, vec![0.1, 0.0]);
    assert_eq!(trace[2].x, vec![0.0, 0.1]);
    assert_eq!(evaluator.finished_count(), 0);
}

#[test]
fn stops_when_the_calibrator_finishes() {
    let info = evaluator().information().clone();
    let mut calibrator = Calibrator::builder(evaluator())
        .maximum_evaluations(10)
        .build();
    let mut minimizer = MinimizerAdapter::builder()
        .max_iterations(1000)
        .build(&info)
        .unwrap();

    let outcome = Loop::new()
        .run(&mut calibrator, &mut minimizer, None)
        .unwrap();
    assert!(calibrator.is_finished());
    assert_eq!(outcome.rounds, 1);
    assert_eq!(outcome.evaluations, 11);
    // A round cut short keeps its starting point.
    assert_eq!(minimizer.current(), &[0.0, 0.0]);
    assert!(minimizer.best().is_some());
}

#[test]
fn settings_are_validated() {
    let info = ProblemInfo::new(2);
    assert!(matches!(
        MinimizerAdapter::builder().build(&info),
        Err(Error::MissingCapability {
            field: "initial_values",
            ..
        })
    ));

    let info = QuadraticProblem::default().information();
    assert!(matches!(
        MinimizerAdapter::builder().initial_step(0.0).build(&info),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        MinimizerAdapter::builder().max_iterations(0).build(&info),
        Err(Error::InvalidConfig(_))
    ));
}
