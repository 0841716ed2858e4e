//! Opdyts: candidate selection for simulations that warm-start from the
//! state of a previous run.
//!
//! Every round perturbs the current anchor into a set of candidates, runs
//! each for a short number of iterations restarted from the anchor, and then
//! repeatedly advances the candidate picked by the approximate selection
//! problem. Candidates that settle quickly and score well collect
//! transitions; the winner becomes the next anchor. After each round the
//! selection weights `(v, w)` are refitted by the adaptation problem.
//!
//! The simulator receives the warm-start hints as extra parameters:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `iterations` | Number of simulation iterations to run (0 for the anchor) |
//! | `restart` | Trial id whose final state the run continues from |
//! | `restart_ignore_convergence` | Set on candidate runs restarted from the anchor |

mod adaptation;
mod selection;
mod slsqp;

use serde_json::json;

use crate::error::{Error, Result};
use crate::problem::ProblemInfo;
use crate::scheduler::Scheduler;
use crate::trial::Submission;
use crate::types::{Evaluation, Map, TrialId};

use self::adaptation::{AdaptationProblem, Round};
use self::selection::SelectionProblem;
use super::{Algorithm, seeded_rng};

/// When the transition loop of a round stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TerminationRule {
    /// Stop once one candidate has collected `number_of_transitions`
    /// transitions.
    #[default]
    MostTransitions,
    /// Stop once the simulator reports a candidate run as converged.
    SimulatorConvergence,
}

struct Anchor {
    id: TrialId,
    parameters: Vec<f64>,
    state: Vec<f64>,
    objective: f64,
}

struct Candidate {
    id: TrialId,
    parameters: Vec<f64>,
    state: Vec<f64>,
    objective: f64,
    delta: Vec<f64>,
    transitions: usize,
}

/// Opdyts over a warm-startable simulator.
///
/// Requires `initial_values` and `number_of_states` in the problem
/// information; every evaluation must carry a state vector.
pub struct Opdyts {
    rng: fastrand::Rng,
    number_of_states: usize,
    initial_values: Vec<f64>,
    candidate_set_size: usize,
    number_of_transitions: usize,
    perturbation_length: f64,
    adaptation_weight: f64,
    transition_iterations: usize,
    termination: TerminationRule,
    v: f64,
    w: f64,
    anchor: Option<Anchor>,
    rounds: Vec<Round>,
    iteration: usize,
}

impl Opdyts {
    /// Creates a builder for `candidate_set_size` candidates per round and a
    /// transition budget of `number_of_transitions`.
    #[must_use]
    pub fn builder(candidate_set_size: usize, number_of_transitions: usize) -> OpdytsBuilder {
        OpdytsBuilder {
            candidate_set_size,
            number_of_transitions,
            perturbation_length: 1.0,
            adaptation_weight: 0.3,
            transition_iterations: 20,
            termination: TerminationRule::default(),
            seed: None,
        }
    }

    /// Current weights `(v, w)` of the equilibrium and uniformity gaps.
    #[must_use]
    pub fn weights(&self) -> (f64, f64) {
        (self.v, self.w)
    }

    /// Parameters of the current anchor, once one has been evaluated.
    #[must_use]
    pub fn anchor(&self) -> Option<&[f64]> {
        self.anchor.as_ref().map(|a| a.parameters.as_slice())
    }

    /// Objective of the current anchor.
    #[must_use]
    pub fn anchor_objective(&self) -> Option<f64> {
        self.anchor.as_ref().map(|a| a.objective)
    }

    /// Completed rounds.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    fn state_of(&self, id: TrialId, evaluation: Evaluation) -> Result<(f64, Vec<f64>)> {
        let state = evaluation.state.ok_or(Error::MissingState {
            id,
            expected: self.number_of_states,
        })?;
        if state.len() != self.number_of_states {
            return Err(Error::InvalidStateArity {
                id,
                expected: self.number_of_states,
                got: state.len(),
            });
        }
        Ok((evaluation.objective, state))
    }

    fn initialize(&mut self, scheduler: &mut dyn Scheduler) -> Result<Anchor> {
        let mut extra = Map::new();
        extra.insert("iterations".into(), json!(0));
        let id = scheduler.submit(
            Submission::new(self.initial_values.clone())
                .extra(extra)
                .annotation("type", json!("initial"))
                .transient(true),
        )?;
        scheduler.wait(&[id])?;
        let (objective, state) = self.state_of(id, scheduler.get(id)?)?;
        Ok(Anchor {
            id,
            parameters: self.initial_values.clone(),
            state,
            objective,
        })
    }

    fn sample_candidates(
        &mut self,
        scheduler: &mut dyn Scheduler,
        anchor: &Anchor,
    ) -> Result<Vec<Candidate>> {
        let n = anchor.parameters.len();
        let mut parameters = Vec::with_capacity(self.candidate_set_size);
        for _ in 0..self.candidate_set_size / 2 {
            let direction: Vec<f64> = (0..n).map(|_| 2.0 * self.rng.f64() - 1.0).collect();
            for sign in [1.0, -1.0] {
                parameters.push(
                    anchor
                        .parameters
                        .iter()
                        .zip(&direction)
                        .map(|(x, d)| x + sign * d * self.perturbation_length)
                        .collect::<Vec<f64>>(),
                );
            }
        }

        let mut ids = Vec::with_capacity(parameters.len());
        for (index, x) in parameters.iter().enumerate() {
            let mut extra = Map::new();
            extra.insert("iterations".into(), json!(self.transition_iterations));
            extra.insert("restart".into(), anchor.id.into());
            extra.insert("restart_ignore_convergence".into(), json!(true));
            ids.push(
                scheduler.submit(
                    Submission::new(x.clone())
                        .extra(extra)
                        .annotation("type", json!("candidate"))
                        .annotation("v", json!(self.v))
                        .annotation("w", json!(self.w))
                        .annotation("iteration", json!(self.iteration))
                        .annotation("candidate", json!(index)),
                )?,
            );
        }
        scheduler.wait(&ids)?;

        ids.into_iter()
            .zip(parameters)
            .map(|(id, parameters)| {
                let (objective, state) = self.state_of(id, scheduler.get(id)?)?;
                let delta = state.iter().zip(&anchor.state).map(|(s, a)| s - a).collect();
                Ok(Candidate {
                    id,
                    parameters,
                    state,
                    objective,
                    delta,
                    transitions: 1,
                })
            })
            .collect()
    }

    /// Inverse-CDF draw from `alpha`.
    fn sample_index(&mut self, alpha: &[f64]) -> usize {
        let u = self.rng.f64();
        let mut cumulative = 0.0;
        let below = alpha
            .iter()
            .take_while(|&&a| {
                cumulative += a;
                u > cumulative
            })
            .count();
        below.min(alpha.len() - 1)
    }

    /// Runs one transition of `candidates[c]`; returns whether the simulator
    /// reports the new run as converged.
    fn transition(
        &mut self,
        scheduler: &mut dyn Scheduler,
        candidate: &mut Candidate,
        index: usize,
        gaps: selection::Gaps,
    ) -> Result<bool> {
        let mut extra = Map::new();
        extra.insert("iterations".into(), json!(self.transition_iterations));
        extra.insert("restart".into(), candidate.id.into());
        let id = scheduler.submit(
            Submission::new(candidate.parameters.clone())
                .extra(extra)
                .annotation("type", json!("transition"))
                .annotation("iteration", json!(self.iteration))
                .annotation("candidate", json!(index))
                .annotation("transient_performance", json!(gaps.transient))
                .annotation("equilibrium_gap", json!(gaps.equilibrium))
                .annotation("uniformity_gap", json!(gaps.uniformity)),
        )?;
        scheduler.wait(&[id])?;
        let (objective, state) = self.state_of(id, scheduler.get(id)?)?;
        scheduler.clean(&[candidate.id])?;

        candidate.delta = state.iter().zip(&candidate.state).map(|(s, a)| s - a).collect();
        candidate.state = state;
        candidate.objective = objective;
        candidate.id = id;
        candidate.transitions += 1;

        match self.termination {
            TerminationRule::MostTransitions => Ok(false),
            TerminationRule::SimulatorConvergence => scheduler.converged(id),
        }
    }
}

impl Algorithm for Opdyts {
    fn name(&self) -> &'static str {
        "opdyts"
    }

    fn advance(&mut self, scheduler: &mut dyn Scheduler) -> Result<()> {
        let anchor = match self.anchor.take() {
            Some(anchor) => anchor,
            None => self.initialize(scheduler)?,
        };
        if scheduler.is_finished() {
            self.anchor = Some(anchor);
            return Ok(());
        }

        self.iteration += 1;
        trace_info!(
            iteration = self.iteration,
            v = self.v,
            w = self.w,
            "starting Opdyts iteration"
        );

        let mut candidates = self.sample_candidates(scheduler, &anchor)?;
        let mut round = Round::default();
        let mut converged = None;

        loop {
            let objectives: Vec<f64> = candidates.iter().map(|c| c.objective).collect();
            let deltas: Vec<Vec<f64>> = candidates.iter().map(|c| c.delta.clone()).collect();
            let problem = SelectionProblem::new(objectives, &deltas, self.v, self.w);
            let alpha = problem.solve()?;
            let gaps = problem.gaps(&alpha);
            round.transient.push(gaps.transient);
            round.equilibrium.push(gaps.equilibrium);
            round.uniformity.push(gaps.uniformity);

            let c = self.sample_index(&alpha);
            trace_debug!(candidate = c, alpha = ?alpha, "selected candidate for transition");
            if self.transition(scheduler, &mut candidates[c], c, gaps)? {
                converged = Some(c);
                break;
            }

            let most = candidates.iter().map(|c| c.transitions).max().unwrap_or(0);
            if self.termination == TerminationRule::MostTransitions
                && most >= self.number_of_transitions
            {
                break;
            }
            if scheduler.is_finished() {
                break;
            }
        }

        let index = converged.unwrap_or_else(|| {
            let most = candidates.iter().map(|c| c.transitions).max().unwrap_or(0);
            candidates
                .iter()
                .position(|c| c.transitions == most)
                .unwrap_or(0)
        });

        let stale: Vec<TrialId> = candidates
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != index)
            .map(|(_, c)| c.id)
            .chain(core::iter::once(anchor.id))
            .collect();
        scheduler.clean(&stale)?;

        let winner = candidates.swap_remove(index);
        trace_info!(
            iteration = self.iteration,
            candidate = index,
            transitions = winner.transitions,
            objective = winner.objective,
            "adopted new anchor"
        );
        round.selection = winner.objective;
        self.anchor = Some(Anchor {
            id: winner.id,
            parameters: winner.parameters,
            state: winner.state,
            objective: winner.objective,
        });
        self.rounds.push(round);

        let (v, w) = AdaptationProblem {
            rounds: self.rounds.clone(),
            weight: self.adaptation_weight,
        }
        .solve()?;
        self.v = v;
        self.w = w;
        Ok(())
    }
}

/// Builder for [`Opdyts`].
///
/// # Defaults
///
/// - `perturbation_length`: 1.0
/// - `adaptation_weight`: 0.3
/// - `transition_iterations`: 20
/// - `termination`: [`TerminationRule::MostTransitions`]
/// - `seed`: random
#[derive(Debug, Clone)]
pub struct OpdytsBuilder {
    candidate_set_size: usize,
    number_of_transitions: usize,
    perturbation_length: f64,
    adaptation_weight: f64,
    transition_iterations: usize,
    termination: TerminationRule,
    seed: Option<u64>,
}

impl OpdytsBuilder {
    /// Scale of the candidate perturbations around the anchor.
    #[must_use]
    pub fn perturbation_length(mut self, length: f64) -> Self {
        self.perturbation_length = length;
        self
    }

    /// Discount of older rounds in the adaptation problem.
    #[must_use]
    pub fn adaptation_weight(mut self, weight: f64) -> Self {
        self.adaptation_weight = weight;
        self
    }

    /// Simulation iterations per candidate run and per transition.
    #[must_use]
    pub fn transition_iterations(mut self, iterations: usize) -> Self {
        self.transition_iterations = iterations;
        self
    }

    /// When the transition loop stops.
    #[must_use]
    pub fn termination(mut self, rule: TerminationRule) -> Self {
        self.termination = rule;
        self
    }

    /// Seed of the perturbation and selection sampler.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds Opdyts starting at the problem's initial values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCapability`] without `initial_values` or
    /// `number_of_states`, and [`Error::InvalidConfig`] for an odd or
    /// too-small candidate set, a zero transition budget, or a weight outside
    /// `(0, 1]`.
    pub fn build(self, info: &ProblemInfo) -> Result<Opdyts> {
        let number_of_states = info.require_states("opdyts")?;
        let initial_values = info.require_initial_values("opdyts")?.to_vec();

        if self.candidate_set_size < 2 || !self.candidate_set_size.is_multiple_of(2) {
            return Err(Error::InvalidConfig(format!(
                "candidate set size must be even and at least 2, got {}",
                self.candidate_set_size
            )));
        }
        if self.number_of_transitions == 0 {
            return Err(Error::InvalidConfig(
                "number of transitions must be positive".into(),
            ));
        }
        if self.adaptation_weight.is_nan()
            || self.adaptation_weight <= 0.0
            || self.adaptation_weight > 1.0
        {
            return Err(Error::InvalidConfig(format!(
                "adaptation weight must lie in (0, 1], got {}",
                self.adaptation_weight
            )));
        }
        if !self.perturbation_length.is_finite() || self.perturbation_length <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "perturbation length must be positive, got {}",
                self.perturbation_length
            )));
        }

        Ok(Opdyts {
            rng: seeded_rng(self.seed),
            number_of_states,
            initial_values,
            candidate_set_size: self.candidate_set_size,
            number_of_transitions: self.number_of_transitions,
            perturbation_length: self.perturbation_length,
            adaptation_weight: self.adaptation_weight,
            transition_iterations: self.transition_iterations,
            termination: self.termination,
            v: 0.0,
            w: 0.0,
            anchor: None,
            rounds: Vec::new(),
            iteration: 0,
        })
    }
}
