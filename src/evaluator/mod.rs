//! Asynchronous trial execution on a bounded pool of simulator slots.

mod builder;

use core::time::Duration;
use std::collections::{HashMap, VecDeque};

pub use builder::EvaluatorBuilder;

use crate::error::{Error, Result};
use crate::merge::deep_merge;
use crate::problem::{Parameterization, Problem, ProblemInfo};
use crate::scheduler::Scheduler;
use crate::simulator::Simulator;
use crate::trial::{Submission, TraceEntry, Trial};
use crate::types::{Evaluation, Map, TrialId, TrialStatus};

/// Owns the lifecycle of every trial: pending, running, finished.
///
/// Scheduling is single-threaded cooperative polling. Each polling round
/// first collects running trials the simulator reports as ready, then starts
/// the oldest pending trials until `parallel` trials are running. Trials
/// therefore start in submission order, while they finish in whatever order
/// the simulator reports.
///
/// # Examples
///
/// ```ignore
/// let mut evaluator = Evaluator::builder(problem, simulator).parallel(4).build()?;
/// let id = evaluator.submit(Submission::new(vec![0.5, 1.0]))?;
/// let evaluation = evaluator.get(id)?;
/// evaluator.clean(&[id])?;
/// ```
pub struct Evaluator<P: Problem, S> {
    problem: P,
    simulator: S,
    info: ProblemInfo,
    parallel: usize,
    interval: Duration,
    follow_trace: bool,
    next_id: u64,
    trials: HashMap<TrialId, Trial<P::Output>>,
    pending: VecDeque<TrialId>,
    running: Vec<TrialId>,
    finished: Vec<TrialId>,
    evaluations: usize,
    total_cost: f64,
    trace: Vec<TraceEntry>,
}

impl<P, S> Evaluator<P, S>
where
    P: Problem,
    S: Simulator<Output = P::Output>,
{
    /// Creates a builder for an evaluator driving `simulator` for `problem`.
    #[must_use]
    pub fn builder(problem: P, simulator: S) -> EvaluatorBuilder<P, S> {
        EvaluatorBuilder::new(problem, simulator)
    }

    /// An evaluator with default settings (one slot, no polling sleep).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the problem information is
    /// inconsistent.
    pub fn new(problem: P, simulator: S) -> Result<Self> {
        Self::builder(problem, simulator).build()
    }

    /// The problem.
    #[must_use]
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// The simulator.
    #[must_use]
    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    /// Mutable access to the simulator.
    pub fn simulator_mut(&mut self) -> &mut S {
        &mut self.simulator
    }

    /// Maximum number of concurrently running trials.
    #[must_use]
    pub fn parallel(&self) -> usize {
        self.parallel
    }

    /// A registered trial, until it is cleaned.
    #[must_use]
    pub fn trial(&self, id: TrialId) -> Option<&Trial<P::Output>> {
        self.trials.get(&id)
    }

    /// Number of trials waiting for a slot.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of trials currently running.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Number of finished trials not cleaned yet.
    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    fn status(&self, id: TrialId) -> Result<TrialStatus> {
        self.trials
            .get(&id)
            .map(Trial::status)
            .ok_or(Error::UnknownTrial(id))
    }

    fn finished_trial(&self, id: TrialId) -> Result<&Trial<P::Output>> {
        let trial = self.trials.get(&id).ok_or(Error::UnknownTrial(id))?;
        if trial.status() == TrialStatus::Finished {
            Ok(trial)
        } else {
            Err(Error::TrialNotFinished(id))
        }
    }

    /// One polling round.
    fn poll(&mut self) -> Result<()> {
        let mut index = 0;
        while index < self.running.len() {
            let id = self.running[index];
            if self.simulator.ready(id)? {
                self.finish(id)?;
                self.running.remove(index);
                self.finished.push(id);
            } else {
                index += 1;
            }
        }

        while self.running.len() < self.parallel {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            let trial = self.trials.get_mut(&id).ok_or(Error::UnknownTrial(id))?;
            self.simulator.run(id, trial.parameters())?;
            trial.mark_running();
            self.running.push(id);
            trace_debug!(trial = %id, running = self.running.len(), "trial started");
        }

        Ok(())
    }

    fn finish(&mut self, id: TrialId) -> Result<()> {
        let output = self.simulator.get(id)?;
        let trial = self.trials.get_mut(&id).ok_or(Error::UnknownTrial(id))?;
        let evaluation = self.problem.evaluate(trial.x(), &output)?;

        if let Some(state) = &evaluation.state {
            let expected = self.info.number_of_states.ok_or(Error::MissingCapability {
                algorithm: "evaluator",
                field: "number_of_states",
            })?;
            if state.len() != expected {
                return Err(Error::InvalidStateArity {
                    id,
                    expected,
                    got: state.len(),
                });
            }
        }

        let cost = match trial.cost() {
            Some(cost) => cost,
            None => self.simulator.cost(id)?,
        };
        if !cost.is_finite() || cost < 0.0 {
            return Err(Error::InvalidCost { id, cost });
        }

        self.evaluations += 1;
        self.total_cost += cost;
        trace_debug!(
            trial = %id,
            objective = evaluation.objective,
            evaluations = self.evaluations,
            "trial finished"
        );
        trial.mark_finished(output, evaluation, cost);

        if self.follow_trace {
            if let Some(entry) = TraceEntry::capture(trial, self.evaluations, self.total_cost) {
                self.trace.push(entry);
            }
        }
        Ok(())
    }

    fn unfinished_ids(&self) -> Vec<TrialId> {
        self.pending
            .iter()
            .chain(self.running.iter())
            .copied()
            .collect()
    }
}

impl<P, S> Scheduler for Evaluator<P, S>
where
    P: Problem,
    S: Simulator<Output = P::Output>,
{
    fn information(&self) -> &ProblemInfo {
        &self.info
    }

    fn submit(&mut self, submission: Submission) -> Result<TrialId> {
        let expected = self.info.number_of_parameters;
        if submission.x.len() != expected {
            return Err(Error::InvalidArity {
                expected,
                got: submission.x.len(),
            });
        }

        let id = TrialId(self.next_id);
        self.next_id += 1;

        let Parameterization {
            mut parameters,
            cost,
        } = self.problem.parameterize(&submission.x)?;
        if let Some(cost) = cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(Error::InvalidCost { id, cost });
            }
        }
        deep_merge(&mut parameters, &submission.extra);

        self.trials
            .insert(id, Trial::pending(id, submission, parameters, cost));
        self.pending.push_back(id);
        Ok(id)
    }

    fn wait(&mut self, ids: &[TrialId]) -> Result<()> {
        let mut waiting = Vec::with_capacity(ids.len());
        for &id in ids {
            if self.status(id)? != TrialStatus::Finished && !waiting.contains(&id) {
                waiting.push(id);
            }
        }

        let total = waiting.len();
        let mut reported = 0;
        while !waiting.is_empty() {
            self.poll()?;
            waiting.retain(|id| {
                self.trials
                    .get(id)
                    .is_some_and(|trial| trial.status() != TrialStatus::Finished)
            });

            let done = total - waiting.len();
            if done != reported {
                reported = done;
                trace_info!("waiting for trials: {done}/{total} finished");
            }

            if !waiting.is_empty() && !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
        }
        Ok(())
    }

    fn wait_all(&mut self) -> Result<()> {
        let ids = self.unfinished_ids();
        self.wait(&ids)
    }

    fn ready(&mut self, id: TrialId) -> Result<bool> {
        self.status(id)?;
        self.poll()?;
        Ok(self.status(id)? == TrialStatus::Finished)
    }

    fn get(&mut self, id: TrialId) -> Result<Evaluation> {
        self.wait(&[id])?;
        self.finished_trial(id)?
            .evaluation()
            .cloned()
            .ok_or(Error::Internal("finished trial without evaluation"))
    }

    fn clean(&mut self, ids: &[TrialId]) -> Result<()> {
        self.wait(ids)?;
        for &id in ids {
            if self.trials.remove(&id).is_none() {
                continue;
            }
            self.finished.retain(|&other| other != id);
            self.simulator.clean(id)?;
        }
        Ok(())
    }

    fn simulator_parameters(&self, id: TrialId) -> Result<&Map> {
        self.trials
            .get(&id)
            .map(Trial::parameters)
            .ok_or(Error::UnknownTrial(id))
    }

    fn clean_finished(&mut self) -> Result<()> {
        let ids = self.finished.clone();
        self.clean(&ids)
    }

    fn converged(&mut self, id: TrialId) -> Result<bool> {
        self.finished_trial(id)?;
        self.simulator.converged(id)
    }

    fn cost(&self, id: TrialId) -> Result<f64> {
        self.finished_trial(id)?
            .cost()
            .ok_or(Error::Internal("finished trial without cost"))
    }

    fn fetch_trace(&mut self) -> Vec<TraceEntry> {
        core::mem::take(&mut self.trace)
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn total_cost(&self) -> f64 {
        self.total_cost
    }
}
