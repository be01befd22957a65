//! Iterative numerical methods shared by the module, array and controller code.
//!
//! Every method here is a pure function of its arguments and reports its
//! outcome as a [`Convergence`] value. Callers decide whether a failure is
//! fatal (calibration) or recoverable (per-step solves).

use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::error::{SimError, SimResult};

/// Iteration cap applied to every iterative method.
pub const MAX_ITERATIONS: usize = 100;

/// `(sqrt(5) - 1) / 2`
const INV_GOLDEN_RATIO: f64 = 0.618_033_988_749_894_9;

/// Identifies which numerical problem failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Solver {
    /// Reference diode ideality factor from the datasheet points.
    IdealityFactor,
    /// Temperature coefficient of the ideality factor.
    GammaTemperatureCoefficient,
    /// Per-step diode parameters drifted outside their physical range.
    DiodeState,
    /// Module current at a fixed terminal voltage.
    CurrentAtVoltage,
    /// Module voltage at zero current.
    OpenCircuitVoltage,
    /// Golden-section maximum-power search.
    MaximumPower,
    /// Inverter clipping boundary search.
    ClippingVoltage,
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Solver::IdealityFactor => "ideality factor",
            Solver::GammaTemperatureCoefficient => "ideality temperature coefficient",
            Solver::DiodeState => "diode state",
            Solver::CurrentAtVoltage => "current at voltage",
            Solver::OpenCircuitVoltage => "open-circuit voltage",
            Solver::MaximumPower => "maximum power search",
            Solver::ClippingVoltage => "clipping voltage search",
        };
        f.write_str(name)
    }
}

/// Why an iterative method stopped without meeting its tolerance.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("{solver} did not converge after {iterations} iterations (last estimate {last_estimate:e})")]
pub struct NonConvergence {
    pub solver: Solver,
    pub iterations: usize,
    pub last_estimate: f64,
}

/// Outcome of an iterative solve.
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub enum Convergence<T> {
    Converged(T),
    Failed(NonConvergence),
}

impl<T> Convergence<T> {
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged(_))
    }

    /// Returns the converged value, discarding failure details.
    pub fn ok(self) -> Option<T> {
        match self {
            Convergence::Converged(value) => Some(value),
            Convergence::Failed(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Convergence<U> {
        match self {
            Convergence::Converged(value) => Convergence::Converged(f(value)),
            Convergence::Failed(reason) => Convergence::Failed(reason),
        }
    }

    pub fn into_result(self) -> Result<T, NonConvergence> {
        match self {
            Convergence::Converged(value) => Ok(value),
            Convergence::Failed(reason) => Err(reason),
        }
    }

    /// Unwraps a converged value, or logs a warning and substitutes the
    /// fallback computed from the failure.
    pub fn recover(self, fallback: impl FnOnce(&NonConvergence) -> T) -> T {
        match self {
            Convergence::Converged(value) => value,
            Convergence::Failed(reason) => {
                warn!(
                    solver = %reason.solver,
                    iterations = reason.iterations,
                    last_estimate = reason.last_estimate,
                    "solver did not converge, continuing with fallback"
                );
                fallback(&reason)
            }
        }
    }
}

/// Newton–Raphson root finding.
///
/// `eval` returns `(f(x), f'(x))`. Converges when the absolute step is
/// below `tolerance`. A non-finite residual or a zero derivative stops the
/// iteration immediately.
pub fn newton(
    solver: Solver,
    x0: f64,
    tolerance: f64,
    mut eval: impl FnMut(f64) -> (f64, f64),
) -> Convergence<f64> {
    let mut x = x0;
    for iteration in 1..=MAX_ITERATIONS {
        let (f, df) = eval(x);
        if !f.is_finite() || !df.is_finite() || df == 0.0 {
            return Convergence::Failed(NonConvergence {
                solver,
                iterations: iteration,
                last_estimate: x,
            });
        }
        let step = f / df;
        x -= step;
        if !x.is_finite() {
            return Convergence::Failed(NonConvergence {
                solver,
                iterations: iteration,
                last_estimate: x,
            });
        }
        if step.abs() < tolerance {
            return Convergence::Converged(x);
        }
    }
    Convergence::Failed(NonConvergence {
        solver,
        iterations: MAX_ITERATIONS,
        last_estimate: x,
    })
}

/// Location and value of a maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Maximum {
    pub x: f64,
    pub value: f64,
}

/// Golden-section maximisation of a unimodal function on `[lower, upper]`.
///
/// Stops when the bracket is narrower than `tolerance` and returns the
/// bracket midpoint. If the objective is exactly zero at both initial
/// interior points the search returns `(lower, 0.0)` without iterating.
pub fn golden_section_max(
    solver: Solver,
    lower: f64,
    upper: f64,
    tolerance: f64,
    mut f: impl FnMut(f64) -> f64,
) -> Convergence<Maximum> {
    let (mut lo, mut hi) = (lower.min(upper), lower.max(upper));
    let mut x1 = hi - INV_GOLDEN_RATIO * (hi - lo);
    let mut x2 = lo + INV_GOLDEN_RATIO * (hi - lo);
    let mut f1 = f(x1);
    let mut f2 = f(x2);

    if f1 == 0.0 && f2 == 0.0 {
        return Convergence::Converged(Maximum { x: lo, value: 0.0 });
    }

    for _ in 0..MAX_ITERATIONS {
        if hi - lo <= tolerance {
            let x = 0.5 * (lo + hi);
            return Convergence::Converged(Maximum { x, value: f(x) });
        }
        if f1 < f2 {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + INV_GOLDEN_RATIO * (hi - lo);
            f2 = f(x2);
        } else {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - INV_GOLDEN_RATIO * (hi - lo);
            f1 = f(x1);
        }
    }
    Convergence::Failed(NonConvergence {
        solver,
        iterations: MAX_ITERATIONS,
        last_estimate: 0.5 * (lo + hi),
    })
}

/// Bisection on a residual whose sign differs at the two bounds.
///
/// # Errors
///
/// Returns [`SimError::BracketNotSigned`] when the residuals at `low` and
/// `high` share a sign or are not finite.
pub fn bisect(
    solver: Solver,
    what: &'static str,
    low: f64,
    high: f64,
    tolerance: f64,
    mut f: impl FnMut(f64) -> f64,
) -> SimResult<Convergence<f64>> {
    let (mut lo, mut hi) = (low, high);
    let mut f_lo = f(lo);
    let f_hi = f(hi);

    if !f_lo.is_finite() || !f_hi.is_finite() || (f_lo != 0.0 && f_hi != 0.0 && f_lo.signum() == f_hi.signum())
    {
        return Err(SimError::BracketNotSigned {
            what,
            low,
            high,
            f_low: f_lo,
            f_high: f_hi,
        });
    }
    if f_lo == 0.0 {
        return Ok(Convergence::Converged(lo));
    }
    if f_hi == 0.0 {
        return Ok(Convergence::Converged(hi));
    }

    for _ in 0..MAX_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || 0.5 * (hi - lo) < tolerance {
            return Ok(Convergence::Converged(mid));
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Ok(Convergence::Failed(NonConvergence {
        solver,
        iterations: MAX_ITERATIONS,
        last_estimate: 0.5 * (lo + hi),
    }))
}

/// Finds the boundary of a predicate that holds at `low` and fails at `high`.
///
/// The returned point is the lowest sampled position where the predicate is
/// false, within `tolerance` of the true boundary. If the predicate already
/// fails at `low`, `low` is returned. If it still holds at `high` the search
/// fails with the bracket midpoint as the last estimate.
pub fn bisect_boundary(
    solver: Solver,
    low: f64,
    high: f64,
    tolerance: f64,
    mut holds: impl FnMut(f64) -> bool,
) -> Convergence<f64> {
    if !holds(low) {
        return Convergence::Converged(low);
    }
    if holds(high) {
        return Convergence::Failed(NonConvergence {
            solver,
            iterations: 0,
            last_estimate: 0.5 * (low + high),
        });
    }

    let (mut lo, mut hi) = (low, high);
    for _ in 0..MAX_ITERATIONS {
        if hi - lo < tolerance {
            return Convergence::Converged(hi);
        }
        let mid = 0.5 * (lo + hi);
        if holds(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Convergence::Failed(NonConvergence {
        solver,
        iterations: MAX_ITERATIONS,
        last_estimate: 0.5 * (lo + hi),
    })
}
