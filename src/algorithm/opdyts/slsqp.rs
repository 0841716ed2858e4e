//! NLopt SLSQP over the unit box, optionally restricted to the probability
//! simplex. Both Opdyts sub-problems are solved through here.

use nlopt::{Algorithm, FailState, Nlopt, SuccessState, Target};

const MAX_EVALUATIONS: u32 = 10_000;
const X_TOLERANCE: f64 = 1e-10;
const F_TOLERANCE: f64 = 1e-12;
const CONSTRAINT_TOLERANCE: f64 = 1e-10;

/// Feasible region on top of the `[0, 1]` bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Region {
    /// `[0, 1]^n`.
    UnitBox,
    /// `[0, 1]^n` with `sum(x) = 1`.
    Simplex,
}

/// Equality constraint `sum(x) - 1 = 0`.
fn sum_to_one(x: &[f64], gradient: Option<&mut [f64]>, _: &mut ()) -> f64 {
    if let Some(gradient) = gradient {
        gradient.fill(1.0);
    }
    x.iter().sum::<f64>() - 1.0
}

/// Minimizes `objective` from `start`. The objective fills the gradient
/// whenever NLopt asks for one.
///
/// Returns the solver status as text when it fails or runs out of
/// evaluations. Roundoff-limited runs still return their last point.
pub(crate) fn minimize<F, T>(
    objective: F,
    data: T,
    start: &[f64],
    region: Region,
) -> Result<Vec<f64>, String>
where
    F: Fn(&[f64], Option<&mut [f64]>, &mut T) -> f64,
{
    let n = start.len();
    let mut optimizer = Nlopt::new(Algorithm::Slsqp, n, objective, Target::Minimize, data);
    let status = |state: FailState| format!("{state:?}");

    optimizer.set_lower_bounds(&vec![0.0; n]).map_err(status)?;
    optimizer.set_upper_bounds(&vec![1.0; n]).map_err(status)?;
    if region == Region::Simplex {
        optimizer
            .add_equality_constraint(sum_to_one, (), CONSTRAINT_TOLERANCE)
            .map_err(status)?;
    }
    optimizer.set_xtol_rel(X_TOLERANCE).map_err(status)?;
    optimizer.set_ftol_rel(F_TOLERANCE).map_err(status)?;
    optimizer.set_maxeval(MAX_EVALUATIONS).map_err(status)?;

    let mut x = start.to_vec();
    match optimizer.optimize(&mut x) {
        Ok((SuccessState::MaxEvalReached | SuccessState::MaxTimeReached, _)) => {
            Err(format!("evaluation limit of {MAX_EVALUATIONS} reached"))
        }
        Ok(_) => Ok(x),
        Err((FailState::RoundoffLimited, value)) if value.is_finite() => {
            trace_debug!(value, "SLSQP stopped at roundoff limit");
            Ok(x)
        }
        Err((state, _)) => Err(status(state)),
    }
}
