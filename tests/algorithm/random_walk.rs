use simcal::algorithm::RandomWalk;
use simcal::prelude::*;

use crate::common::{DelayedSimulator, QuadraticProblem, exhausted_calibrator};

#[test]
fn samples_stay_inside_bounds() {
    let mut evaluator = Evaluator::builder(QuadraticProblem::default(), DelayedSimulator::default())
        .parallel(4)
        .build()
        .unwrap();
    let info = evaluator.information().clone();
    let mut walk = RandomWalk::builder().parallel(4).seed(17).build(&info).unwrap();
    for _ in 0..10 {
        walk.advance(&mut evaluator).unwrap();
    }

    let trace = evaluator.fetch_trace();
    assert_eq!(trace.len(), 40);
    assert!(
        trace
            .iter()
            .flat_map(|e| e.x.iter())
            .all(|v| (-10.0..=10.0).contains(v))
    );
    assert_eq!(evaluator.finished_count(), 0, "every round cleans its trials");
    assert_eq!(walk.iteration(), 10);
}

#[test]
fn same_seed_same_samples() {
    let run = || {
        let mut evaluator =
            Evaluator::new(QuadraticProblem::default(), DelayedSimulator::default()).unwrap();
        let info = evaluator.information().clone();
        let mut walk = RandomWalk::builder().parallel(2).seed(99).build(&info).unwrap();
        walk.advance(&mut evaluator).unwrap();
        evaluator
            .fetch_trace()
            .into_iter()
            .map(|e| e.x)
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn bounds_and_parallel_are_required() {
    let info = ProblemInfo::new(2);
    assert!(matches!(
        RandomWalk::builder().build(&info),
        Err(Error::MissingCapability { field: "bounds", .. })
    ));
    let info = QuadraticProblem::default().information();
    assert!(matches!(
        RandomWalk::builder().parallel(0).build(&info),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn finished_scheduler_gets_no_samples() {
    let mut calibrator = exhausted_calibrator();
    let info = calibrator.information().clone();
    let mut walk = RandomWalk::builder().parallel(3).seed(5).build(&info).unwrap();
    walk.advance(&mut calibrator).unwrap();
    assert_eq!(calibrator.history().len(), 1);
    assert_eq!(calibrator.scheduler().pending_count(), 0);
    assert_eq!(walk.iteration(), 0);
}
