#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Calibration of slow, black-box simulations.
//!
//! A calibration couples a [`Problem`] (which maps parameter vectors to
//! simulator configuration and simulator output to an objective) with a
//! [`Simulator`] (which runs trials asynchronously, usually as external
//! processes). The [`Evaluator`] schedules trials on the simulator with a
//! bounded number of concurrent runs, the [`Calibrator`] records every result
//! and enforces budgets, and an [`Algorithm`](algorithm::Algorithm) decides
//! which parameter vectors to try next.
//!
//! # Getting Started
//!
//! ```
//! use simcal::algorithm::CmaEs;
//! use simcal::prelude::*;
//!
//! struct Quadratic;
//!
//! impl Problem for Quadratic {
//!     type Output = f64;
//!
//!     fn information(&self) -> ProblemInfo {
//!         ProblemInfo::new(2).with_initial_values(vec![0.0, 0.0])
//!     }
//!
//!     fn parameterize(&self, x: &[f64]) -> Result<Parameterization> {
//!         let mut parameters = Map::new();
//!         parameters.insert("x".into(), serde_json::json!(x));
//!         Ok(parameters.into())
//!     }
//!
//!     fn evaluate(&self, _x: &[f64], output: &f64) -> Result<Evaluation> {
//!         Ok(Evaluation::new(*output))
//!     }
//! }
//!
//! /// Evaluates `(x - 2)^2 + (y - 1)^2` instantly.
//! #[derive(Default)]
//! struct Instant(std::collections::HashMap<TrialId, f64>);
//!
//! impl Simulator for Instant {
//!     type Output = f64;
//!
//!     fn run(&mut self, id: TrialId, parameters: &Map) -> Result<()> {
//!         let x: Vec<f64> = serde_json::from_value(parameters["x"].clone())
//!             .map_err(|e| Error::Simulator(e.to_string()))?;
//!         self.0.insert(id, (x[0] - 2.0).powi(2) + (x[1] - 1.0).powi(2));
//!         Ok(())
//!     }
//!
//!     fn ready(&mut self, _id: TrialId) -> Result<bool> {
//!         Ok(true)
//!     }
//!
//!     fn get(&mut self, id: TrialId) -> Result<f64> {
//!         self.0.get(&id).copied().ok_or(Error::UnknownTrial(id))
//!     }
//!
//!     fn clean(&mut self, id: TrialId) -> Result<()> {
//!         self.0.remove(&id);
//!         Ok(())
//!     }
//! }
//!
//! let evaluator = Evaluator::builder(Quadratic, Instant::default())
//!     .parallel(4)
//!     .build()
//!     .unwrap();
//! let info = evaluator.information().clone();
//! let mut calibrator = Calibrator::builder(evaluator)
//!     .maximum_evaluations(2000)
//!     .build();
//!
//! let mut cma = CmaEs::builder().initial_step_size(0.5).seed(7).build(&info).unwrap();
//! let outcome = Loop::new()
//!     .threshold(1e-6)
//!     .run(&mut calibrator, &mut cma, None)
//!     .unwrap();
//!
//! let x = outcome.x.unwrap();
//! assert!((x[0] - 2.0).abs() < 1e-2 && (x[1] - 1.0).abs() < 1e-2);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Problem`] | Parameterization, evaluation, and declared capabilities ([`ProblemInfo`]). |
//! | [`Simulator`] | Runs trials asynchronously: `run`, `ready`, `get`, `clean`. |
//! | [`Evaluator`] | FIFO scheduler with a concurrency bound; implements [`Scheduler`]. |
//! | [`Calibrator`] | Recording [`Scheduler`] wrapper: history, best, budgets, snapshots. |
//! | [`Loop`] | Drives an algorithm round by round until a stop condition holds. |
//! | [`Tracker`](tracker::Tracker) | Observes every finished trial ([`tracker::LogTracker`], [`tracker::MemoryTracker`]). |
//!
//! # Algorithms
//!
//! | Algorithm | Needs |
//! |-----------|-------|
//! | [`RandomWalk`](algorithm::RandomWalk) | bounds |
//! | [`Fdsa`](algorithm::Fdsa) / [`Spsa`](algorithm::Spsa) | initial values |
//! | [`CmaEs`](algorithm::CmaEs) | initial values |
//! | [`NelderMead`](algorithm::NelderMead) | bounds |
//! | [`MinimizerAdapter`](algorithm::MinimizerAdapter) | initial values |
//! | [`Opdyts`](algorithm::Opdyts) | initial values, number of states |
//! | [`BatchBayesianOptimization`](algorithm::BatchBayesianOptimization) | bounds |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at key calibration points | on |
//! | `journal` | `JournalTracker`: JSONL trace persistence with file locking | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::error!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_error {
    ($($arg:tt)*) => { tracing::error!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_error {
    ($($arg:tt)*) => {};
}

pub mod algorithm;
mod calibrator;
mod driver;
mod error;
mod evaluator;
pub mod merge;
mod problem;
mod scheduler;
mod simulator;
pub mod tracker;
mod trial;
mod types;

pub use calibrator::{Best, CalibrationSnapshot, Calibrator, CalibratorBuilder, HistoryEntry};
pub use driver::{Loop, LoopOutcome};
pub use error::{Error, Result};
pub use evaluator::{Evaluator, EvaluatorBuilder};
pub use problem::{Parameterization, Problem, ProblemInfo};
pub use scheduler::Scheduler;
pub use simulator::Simulator;
pub use trial::{Submission, TraceEntry, Trial};
pub use types::{Evaluation, ExitCriterion, Map, TrialId, TrialStatus};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use simcal::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algorithm::Algorithm;
    pub use crate::calibrator::{Calibrator, CalibratorBuilder};
    pub use crate::driver::{Loop, LoopOutcome};
    pub use crate::error::{Error, Result};
    pub use crate::evaluator::{Evaluator, EvaluatorBuilder};
    pub use crate::problem::{Parameterization, Problem, ProblemInfo};
    pub use crate::scheduler::Scheduler;
    pub use crate::simulator::Simulator;
    pub use crate::tracker::{LogTracker, MemoryTracker, Tracker};
    pub use crate::trial::{Submission, TraceEntry};
    pub use crate::types::{Evaluation, Map, TrialId};
}
