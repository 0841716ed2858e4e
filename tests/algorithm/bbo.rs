use serde_json::json;
use simcal::algorithm::BatchBayesianOptimization;
use simcal::prelude::*;

use crate::common::{DelayedSimulator, QuadraticProblem, RelaxationProblem, exhausted_calibrator};

fn evaluator() -> Evaluator<QuadraticProblem, DelayedSimulator> {
    Evaluator::builder(QuadraticProblem::default(), DelayedSimulator::default())
        .parallel(4)
        .build()
        .unwrap()
}

#[test]
fn first_round_is_the_initial_design() {
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut bbo = BatchBayesianOptimization::builder()
        .batch_size(3)
        .initial_sample_count(8)
        .seed(4)
        .build(&info)
        .unwrap();

    bbo.advance(&mut evaluator).unwrap();
    let trace = evaluator.fetch_trace();
    assert_eq!(trace.len(), 8);
    assert!(trace.iter().all(|e| e.annotations["type"] == json!("initial")));
    assert!(
        trace
            .iter()
            .flat_map(|e| e.x.iter())
            .all(|v| (-10.0..=10.0).contains(v))
    );

    bbo.advance(&mut evaluator).unwrap();
    let trace = evaluator.fetch_trace();
    assert_eq!(trace.len(), 3);
    assert!(trace.iter().all(|e| e.annotations["type"] == json!("acquisition")));
    assert_eq!(bbo.observations(), 11);
    assert_eq!(bbo.iteration(), 2);
    // Every trial of a batch is cleaned once evaluated.
    assert_eq!(evaluator.finished_count(), 0);
}

#[test]
fn acquisition_improves_on_initial_design() {
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut bbo = BatchBayesianOptimization::builder()
        .batch_size(4)
        .candidate_count(2000)
        .seed(17)
        .build(&info)
        .unwrap();

    bbo.advance(&mut evaluator).unwrap();
    let (_, initial) = bbo.best().unwrap();
    for _ in 0..6 {
        bbo.advance(&mut evaluator).unwrap();
    }
    let (x, best) = bbo.best().unwrap();
    assert!(best <= initial);
    assert!(best < 5.0, "best {best} at {x:?}");
    let recomputed = (x[0] - 2.0).powi(2) + (x[1] - 1.0).powi(2);
    assert!((recomputed - best).abs() < 1e-9);
}

#[test]
fn same_seed_proposes_same_points() {
    let run = || {
        let mut evaluator = evaluator();
        let info = evaluator.information().clone();
        let mut bbo = BatchBayesianOptimization::builder()
            .batch_size(2)
            .candidate_count(200)
            .seed(99)
            .build(&info)
            .unwrap();
        let mut points = Vec::new();
        for _ in 0..3 {
            bbo.advance(&mut evaluator).unwrap();
            points.extend(evaluator.fetch_trace().into_iter().map(|e| e.x));
        }
        points
    };
    assert_eq!(run(), run());
}

#[test]
fn bounds_and_settings_are_validated() {
    let info = RelaxationProblem::default().information();
    assert!(matches!(
        BatchBayesianOptimization::builder().build(&info),
        Err(Error::MissingCapability { field: "bounds", .. })
    ));

    let info = QuadraticProblem::default().information();
    assert!(matches!(
        BatchBayesianOptimization::builder().batch_size(0).build(&info),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        BatchBayesianOptimization::builder().kappa(-1.0).build(&info),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        BatchBayesianOptimization::builder()
            .noise_variance(f64::NAN)
            .build(&info),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn finished_scheduler_gets_no_design() {
    let mut calibrator = exhausted_calibrator();
    let info = calibrator.information().clone();
    let mut bbo = BatchBayesianOptimization::builder().seed(5).build(&info).unwrap();
    bbo.advance(&mut calibrator).unwrap();
    assert_eq!(calibrator.history().len(), 1);
    assert_eq!(calibrator.scheduler().pending_count(), 0);
    assert_eq!(bbo.iteration(), 0);
}
