use simcal::algorithm::NelderMead;
use simcal::algorithm::nelder_mead::Step;
use simcal::prelude::*;

use crate::common::{DelayedSimulator, QuadraticProblem, exhausted_calibrator};

fn evaluator() -> Evaluator<QuadraticProblem, DelayedSimulator> {
    Evaluator::builder(QuadraticProblem::default(), DelayedSimulator::default())
        .parallel(3)
        .build()
        .unwrap()
}

#[test]
fn initial_simplex_uses_distinct_corners() {
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut nm = NelderMead::builder().seed(8).build(&info).unwrap();

    assert_eq!(nm.step(&mut evaluator).unwrap(), Step::Initialize);
    let simplex = nm.simplex();
    assert_eq!(simplex.len(), 3);
    for vertex in simplex {
        assert!(vertex.iter().all(|&v| v == -10.0 || v == 10.0), "{vertex:?}");
    }
    for (i, a) in simplex.iter().enumerate() {
        for b in &simplex[i + 1..] {
            assert_ne!(a, b);
        }
    }
    assert_eq!(evaluator.evaluations(), 3);
}

#[test]
fn converges_on_quadratic() {
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut nm = NelderMead::builder().seed(21).build(&info).unwrap();

    for _ in 0..200 {
        nm.step(&mut evaluator).unwrap();
    }
    let (x, value) = nm.best().unwrap();
    assert!(value < 1e-4, "best value {value} at {x:?}");
}

#[test]
fn best_value_never_gets_worse() {
    let mut evaluator = evaluator();
    let info = evaluator.information().clone();
    let mut nm = NelderMead::builder().seed(5).build(&info).unwrap();

    let mut previous = f64::INFINITY;
    let mut steps = Vec::new();
    for _ in 0..60 {
        steps.push(nm.step(&mut evaluator).unwrap());
        let (_, value) = nm.best().unwrap();
        assert!(value <= previous);
        previous = value;
    }
    assert!(steps[1..].iter().all(|&s| s != Step::Initialize));
}

#[test]
fn invalid_coefficients_are_rejected() {
    let info = QuadraticProblem::default().information();
    assert!(matches!(
        NelderMead::builder().gamma(0.5).build(&info),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!(
        NelderMead::builder().rho(0.8).build(&info),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn degenerate_bounds_are_rejected() {
    let info = ProblemInfo::new(3).with_bounds(vec![(0.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
    assert!(matches!(
        NelderMead::builder().build(&info),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn finished_scheduler_gets_no_simplex() {
    let mut calibrator = exhausted_calibrator();
    let info = calibrator.information().clone();
    let mut nm = NelderMead::builder().seed(5).build(&info).unwrap();
    nm.advance(&mut calibrator).unwrap();
    assert_eq!(calibrator.history().len(), 1);
    assert_eq!(calibrator.scheduler().pending_count(), 0);
    assert!(nm.simplex().is_empty());
}
