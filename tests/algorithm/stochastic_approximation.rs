use serde_json::json;
use simcal::algorithm::{Fdsa, Spsa};
use simcal::prelude::*;

use crate::common::{DelayedSimulator, QuadraticProblem};

fn evaluator() -> Evaluator<QuadraticProblem, DelayedSimulator> {
    Evaluator::builder(QuadraticProblem::default(), DelayedSimulator::default())
        .parallel(2)
        .build()
        .unwrap()
}

#[test]
fn spsa_gradient_points_toward_target() {
    // At (0, 0) the gradient of (x - 2)^2 + (y - 1)^2 is (-4, -2). Along a
    // Rademacher direction d the estimate is (g . d) / d, whose sign for the
    // first coordinate is negative whenever both entries of d agree.
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut spsa = Spsa::builder(0.1, 0.01).seed(9).build(&info).unwrap();
    spsa.advance(&mut evaluator).unwrap();

    let gradient = spsa.gradient().unwrap();
    let trace = evaluator.fetch_trace();
    let direction: Vec<f64> = serde_json::from_value(trace[0].annotations["direction"].clone()).unwrap();
    let projected = -4.0 * direction[0] - 2.0 * direction[1];
    for (g, d) in gradient.iter().zip(&direction) {
        assert!((g - projected / d).abs() < 0.1, "gradient {gradient:?}, direction {direction:?}");
    }
}

#[test]
fn spsa_submits_two_trials_per_round() {
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut spsa = Spsa::builder(0.1, 0.1).seed(1).build(&info).unwrap();
    for _ in 0..3 {
        spsa.advance(&mut evaluator).unwrap();
    }
    assert_eq!(evaluator.evaluations(), 6);
    assert_eq!(spsa.iteration(), 3);

    let kinds: Vec<_> = evaluator
        .fetch_trace()
        .iter()
        .map(|e| e.annotations["type"].clone())
        .collect();
    assert_eq!(kinds[0], json!("positive_gradient"));
    assert_eq!(kinds[1], json!("negative_gradient"));
}

#[test]
fn spsa_objective_trial_is_transient() {
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut spsa = Spsa::builder(0.1, 0.1)
        .compute_objective(true)
        .seed(2)
        .build(&info)
        .unwrap();
    spsa.advance(&mut evaluator).unwrap();

    let trace = evaluator.fetch_trace();
    assert_eq!(trace.len(), 3);
    assert!(trace[2].transient);
    assert_eq!(trace[2].annotations["type"], json!("objective"));
    assert_eq!(trace[2].x, spsa.parameters());
}

#[test]
fn spsa_improves_quadratic() {
    let evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut calibrator = Calibrator::builder(evaluator).maximum_evaluations(600).build();
    let mut spsa = Spsa::builder(0.2, 0.1)
        .gradient_offset(10.0)
        .seed(4)
        .build(&info)
        .unwrap();
    Loop::new().run(&mut calibrator, &mut spsa, None).unwrap();

    let x = spsa.parameters();
    let objective = (x[0] - 2.0).powi(2) + (x[1] - 1.0).powi(2);
    assert!(objective < 0.1, "SPSA ended at {x:?} with objective {objective}");
}

#[test]
fn fdsa_gradient_matches_central_difference() {
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut fdsa = Fdsa::builder(0.1, 0.01).build(&info).unwrap();
    fdsa.advance(&mut evaluator).unwrap();

    let gradient = fdsa.gradient().unwrap();
    assert!((gradient[0] + 4.0).abs() < 1e-6, "gradient {gradient:?}");
    assert!((gradient[1] + 2.0).abs() < 1e-6, "gradient {gradient:?}");
    assert!(fdsa.parameters().iter().all(|&theta| theta > 0.0));
    assert_eq!(evaluator.evaluations(), 4);

    let dimensions: Vec<_> = evaluator
        .fetch_trace()
        .iter()
        .map(|e| e.annotations["dimension"].clone())
        .collect();
    assert_eq!(dimensions, vec![json!(0), json!(0), json!(1), json!(1)]);
}

#[test]
fn fdsa_converges_on_quadratic() {
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut fdsa = Fdsa::builder(0.3, 0.05).build(&info).unwrap();
    for _ in 0..100 {
        fdsa.advance(&mut evaluator).unwrap();
    }
    let x = fdsa.parameters();
    assert!((x[0] - 2.0).abs() < 1e-2 && (x[1] - 1.0).abs() < 1e-2, "x = {x:?}");
}

#[test]
fn invalid_gains_are_rejected() {
    let info = QuadraticProblem::default().information();
    assert!(matches!(
        Spsa::builder(-1.0, 0.1).build(&info),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        Fdsa::builder(0.1, 0.0).build(&info),
        Err(Error::InvalidConfig(_))
    ));
}
