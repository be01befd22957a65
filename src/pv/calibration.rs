//! Datasheet calibration of the one-diode parameters.
//!
//! The ideality factor is fitted so that the short-circuit, open-circuit and
//! maximum-power datasheet points lie on one curve. Its temperature
//! coefficient is then fitted so that the modelled power change over 25 K
//! reproduces the datasheet power coefficient.

use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::solver::{self, Convergence, Solver};

use super::diode;
use super::module::derive_state;
use super::types::{DiodeParams, ModuleSpec};

/// Initial guesses tried in order until one converges inside `(0, GAMMA_MAX)`.
pub const GAMMA_SEEDS: [f64; 4] = [1.0, 0.5, 1.5, 0.0];
/// Upper bound on an accepted reference ideality factor.
pub const GAMMA_MAX: f64 = 5.0;
pub const GAMMA_TOLERANCE: f64 = 1e-10;
/// Temperature offset of the coefficient trial solve (K).
pub const TRIAL_DELTA_T: f64 = 25.0;
/// Half-width of the ideality bracket searched around the reference value.
pub const MU_GAMMA_BRACKET: f64 = 0.5;
pub const MU_GAMMA_TOLERANCE: f64 = 1e-7;

/// Fits the reference ideality factor over [`GAMMA_SEEDS`].
///
/// # Errors
///
/// Returns [`SimError::Calibration`] when no seed converges to a value in
/// `(0, GAMMA_MAX)`.
pub fn solve_ideality_factor(spec: &ModuleSpec) -> SimResult<f64> {
    solve_with_seeds(spec, &GAMMA_SEEDS)
}

/// Tries each seed in order and returns the first accepted ideality factor.
fn solve_with_seeds(spec: &ModuleSpec, seeds: &[f64]) -> SimResult<f64> {
    let c = spec.string_thermal_voltage(spec.temperature_ref_c);
    let rs = spec.series_resistance;
    let rsh = spec.shunt_resistance_ref;
    let a_term = spec.isc_ref - (spec.voc_ref - spec.isc_ref * rs) / rsh;
    let b_term = spec.imp_ref - (spec.voc_ref - spec.vmp_ref - spec.imp_ref * rs) / rsh;
    let x_mp = spec.vmp_ref + spec.imp_ref * rs - spec.voc_ref;
    let x_sc = spec.isc_ref * rs - spec.voc_ref;

    let residual = |gamma: f64| {
        let e_mp = (x_mp / (c * gamma)).exp();
        let e_sc = (x_sc / (c * gamma)).exp();
        let f = (a_term - b_term) - a_term * e_mp + b_term * e_sc;
        let scale = -1.0 / (c * gamma * gamma);
        let df = -a_term * e_mp * x_mp * scale + b_term * e_sc * x_sc * scale;
        (f, df)
    };

    for &seed in seeds {
        match solver::newton(Solver::IdealityFactor, seed, GAMMA_TOLERANCE, residual) {
            Convergence::Converged(gamma) if gamma > 0.0 && gamma < GAMMA_MAX => {
                return Ok(gamma);
            }
            Convergence::Converged(gamma) => {
                debug!(seed, gamma, "ideality factor outside accepted range");
            }
            Convergence::Failed(reason) => {
                debug!(seed, %reason, "ideality factor seed failed");
            }
        }
    }
    Err(SimError::Calibration(format!(
        "no ideality factor in (0, {GAMMA_MAX}) for seeds {seeds:?}"
    )))
}

/// Saturation current and photocurrent at reference conditions for a given
/// ideality factor, returned as `(io, iph)`.
pub fn reference_currents(spec: &ModuleSpec, gamma: f64) -> (f64, f64) {
    let a = gamma * spec.string_thermal_voltage(spec.temperature_ref_c);
    let rs = spec.series_resistance;
    let rsh = spec.shunt_resistance_ref;
    let isc = spec.isc_ref;
    let voc = spec.voc_ref;

    let a_term = isc - (voc - isc * rs) / rsh;
    let io = a_term * (-voc / a).exp() / (1.0 - ((isc * rs - voc) / a).exp());
    let iph = isc + io * ((isc * rs / a).exp() - 1.0) + isc * rs / rsh;
    (io, iph)
}

/// Fits the ideality factor change per kelvin against the datasheet power
/// coefficient.
///
/// # Errors
///
/// Returns [`SimError::BracketNotSigned`] when the searched ideality range
/// does not contain the target power, and [`SimError::Calibration`] when
/// the bisection runs out of iterations.
pub fn solve_gamma_temperature_coefficient(
    spec: &ModuleSpec,
    gamma_ref: f64,
    io_ref: f64,
    iph_ref: f64,
) -> SimResult<f64> {
    let params = DiodeParams {
        gamma_ref,
        mu_gamma: 0.0,
        io_ref,
        iph_ref,
    };
    let mpp_power = |gamma: f64, temp_c: f64| {
        let state = derive_state(spec, &params, gamma, spec.irradiance_ref, temp_c, 0.0);
        diode::maximum_power_point(&state).ok().map_or(f64::NAN, |p| p.power)
    };

    let reference_power = mpp_power(gamma_ref, spec.temperature_ref_c);
    if !reference_power.is_finite() || reference_power <= 0.0 {
        return Err(SimError::Calibration(format!(
            "reference maximum power is not usable ({reference_power})"
        )));
    }
    let trial_temp = spec.temperature_ref_c + TRIAL_DELTA_T;
    let target = reference_power * (1.0 + spec.mu_pmpp * TRIAL_DELTA_T);

    let low = (gamma_ref - MU_GAMMA_BRACKET).max(0.05);
    let high = gamma_ref + MU_GAMMA_BRACKET;
    let trial_gamma = solver::bisect(
        Solver::GammaTemperatureCoefficient,
        "ideality factor at trial temperature",
        low,
        high,
        MU_GAMMA_TOLERANCE,
        |gamma| mpp_power(gamma, trial_temp) - target,
    )?
    .into_result()
    .map_err(|reason| SimError::Calibration(reason.to_string()))?;

    Ok((trial_gamma - gamma_ref) / TRIAL_DELTA_T)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_module_fits_ideality_below_one() {
        let gamma = solve_ideality_factor(&ModuleSpec::default()).unwrap();
        assert!((gamma - 0.8195).abs() < 1e-3, "gamma = {gamma}");
    }

    #[test]
    fn reference_currents_reproduce_short_circuit() {
        let spec = ModuleSpec::default();
        let gamma = solve_ideality_factor(&spec).unwrap();
        let (io, iph) = reference_currents(&spec, gamma);
        assert!(io > 1e-10 && io < 1e-8, "io = {io:e}");
        assert!(iph > spec.isc_ref && iph < spec.isc_ref * 1.01);
    }

    #[test]
    fn temperature_coefficient_is_small_and_positive() {
        let spec = ModuleSpec::default();
        let gamma = solve_ideality_factor(&spec).unwrap();
        let (io, iph) = reference_currents(&spec, gamma);
        let mu = solve_gamma_temperature_coefficient(&spec, gamma, io, iph).unwrap();
        assert!(mu > 0.0 && mu < 0.01, "mu_gamma = {mu}");
    }

    #[test]
    fn impossible_datasheet_fails_calibration() {
        // maximum-power point beyond the curve a diode can produce
        let spec = ModuleSpec {
            imp_ref: 9.39,
            vmp_ref: 46.1,
            ..ModuleSpec::default()
        };
        assert!(solve_ideality_factor(&spec).is_err());
    }

    #[test]
    fn failing_seed_falls_through_to_next() {
        let spec = ModuleSpec::default();
        assert!(solve_with_seeds(&spec, &[0.0]).is_err());
        let gamma = solve_with_seeds(&spec, &[0.0, 1.0]).expect("second seed converges");
        assert!((gamma - 0.8195).abs() < 1e-3, "gamma = {gamma}");
        assert_eq!(gamma, solve_ideality_factor(&spec).unwrap());
    }

    #[test]
    fn unreachable_power_coefficient_is_unbracketed() {
        let spec = ModuleSpec {
            mu_pmpp: -0.05,
            ..ModuleSpec::default()
        };
        let gamma = solve_ideality_factor(&spec).unwrap();
        let (io, iph) = reference_currents(&spec, gamma);
        let err = solve_gamma_temperature_coefficient(&spec, gamma, io, iph);
        assert!(matches!(err, Err(SimError::BracketNotSigned { .. })), "{err:?}");
    }
}
