//! One-diode equivalent-circuit solvers.
//!
//! All functions are pure in the [`DiodeState`] they receive, so a state can
//! be shared between concurrent solves of independent arrays.
//!
//! ```text
//! I = Iph - Io (exp((V + I Rs) / a) - 1) - (V + I Rs) / Rsh
//! ```

use crate::solver::{self, Convergence, Solver};

use super::types::{DiodeState, ModulePoint};

/// Absolute tolerance on successive current estimates (A).
pub const CURRENT_TOLERANCE: f64 = 1e-9;
/// Absolute tolerance on successive open-circuit voltage estimates (V).
pub const VOLTAGE_TOLERANCE: f64 = 1e-9;
/// Golden-section bracket width at which the MPP search stops (V).
pub const MPP_VOLTAGE_TOLERANCE: f64 = 1e-5;

/// Residual of the diode equation at `(voltage, current)`; zero on the curve.
pub fn net_current(state: &DiodeState, voltage: f64, current: f64) -> f64 {
    let vd = voltage + current * state.rs;
    state.iph - state.io * ((vd / state.modified_ideality).exp() - 1.0) - vd / state.rsh - current
}

/// Module current at a terminal voltage, by Newton–Raphson.
///
/// Negative voltages are treated as short circuit and the returned current
/// never drops below zero.
pub fn current_at_voltage(state: &DiodeState, voltage: f64) -> Convergence<f64> {
    if state.iph <= 0.0 {
        return Convergence::Converged(0.0);
    }
    let v = voltage.max(0.0);
    let a = state.modified_ideality;
    solver::newton(
        Solver::CurrentAtVoltage,
        state.current_guess.max(0.0),
        CURRENT_TOLERANCE,
        |i| {
            let vd = v + i * state.rs;
            let e = (vd / a).exp();
            let f = state.iph - state.io * (e - 1.0) - vd / state.rsh - i;
            let df = -state.io * state.rs / a * e - state.rs / state.rsh - 1.0;
            (f, df)
        },
    )
    .map(|i| i.max(0.0))
}

/// Module voltage at zero current.
///
/// Starts from the ideal-diode bound `a ln(1 + Iph / Io)`, which lies above
/// the root, so the iteration approaches monotonically. Dark states return
/// `0.0` without iterating.
pub fn open_circuit_voltage(state: &DiodeState) -> Convergence<f64> {
    if state.iph <= 0.0 {
        return Convergence::Converged(0.0);
    }
    let a = state.modified_ideality;
    let seed = if state.io > 0.0 {
        a * (state.iph / state.io).ln_1p()
    } else {
        state.voc_linear
    };
    solver::newton(Solver::OpenCircuitVoltage, seed, VOLTAGE_TOLERANCE, |v| {
        let e = (v / a).exp();
        let f = state.iph - state.io * (e - 1.0) - v / state.rsh;
        let df = -state.io / a * e - 1.0 / state.rsh;
        (f, df)
    })
    .map(|v| v.max(0.0))
}

/// Operating point at a fixed voltage; a failed current solve yields zero current.
pub fn point_at_voltage(state: &DiodeState, voltage: f64) -> ModulePoint {
    let voltage = voltage.max(0.0);
    let current = current_at_voltage(state, voltage).recover(|_| 0.0);
    ModulePoint {
        voltage,
        current,
        power: voltage * current,
    }
}

/// Golden-section search for the maximum-power point over `[0, Voc]`.
///
/// A failed open-circuit solve falls back to the linear estimate carried by
/// the state. A dark curve returns the all-zero point.
pub fn maximum_power_point(state: &DiodeState) -> Convergence<ModulePoint> {
    let voc = open_circuit_voltage(state).recover(|_| state.voc_linear);
    solver::golden_section_max(Solver::MaximumPower, 0.0, voc, MPP_VOLTAGE_TOLERANCE, |v| {
        v * current_at_voltage(state, v).recover(|_| 0.0)
    })
    .map(|max| {
        if max.value <= 0.0 || max.x <= 0.0 {
            return ModulePoint::default();
        }
        ModulePoint {
            voltage: max.x,
            current: max.value / max.x,
            power: max.value,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-built state close to the calibrated default module at STC.
    fn stc_state() -> DiodeState {
        let a = 0.8195 * 2.466_49;
        DiodeState {
            gamma: 0.8195,
            modified_ideality: a,
            io: 1.096e-9,
            iph: 9.4056,
            rsh: 300.0,
            rs: 0.18,
            voc_linear: 46.2,
            current_guess: 9.4,
        }
    }

    fn dark_state() -> DiodeState {
        DiodeState {
            iph: 0.0,
            current_guess: 0.0,
            ..stc_state()
        }
    }

    #[test]
    fn short_circuit_current_is_close_to_photocurrent() {
        let isc = current_at_voltage(&stc_state(), 0.0).ok().expect("converges");
        assert!((isc - 9.4).abs() < 0.01, "isc = {isc}");
    }

    #[test]
    fn solved_current_lies_on_curve() {
        let state = stc_state();
        for v in [0.0, 10.0, 30.0, 38.0, 44.0] {
            let i = current_at_voltage(&state, v).ok().expect("converges");
            assert!(net_current(&state, v, i).abs() < 1e-8, "v = {v}");
        }
    }

    #[test]
    fn negative_voltage_is_treated_as_short_circuit() {
        let state = stc_state();
        let at_zero = current_at_voltage(&state, 0.0).ok();
        let negative = current_at_voltage(&state, -5.0).ok();
        assert_eq!(at_zero, negative);
    }

    #[test]
    fn current_is_zero_beyond_open_circuit() {
        let state = stc_state();
        let voc = open_circuit_voltage(&state).ok().expect("converges");
        let i = current_at_voltage(&state, voc + 2.0).ok().expect("converges");
        assert_eq!(i, 0.0);
    }

    #[test]
    fn open_circuit_residual_is_zero() {
        let state = stc_state();
        let voc = open_circuit_voltage(&state).ok().expect("converges");
        assert!(voc > 45.0 && voc < 47.5, "voc = {voc}");
        assert!(net_current(&state, voc, 0.0).abs() < 1e-9);
    }

    #[test]
    fn dark_state_has_zero_voc_and_zero_mpp() {
        let state = dark_state();
        assert_eq!(open_circuit_voltage(&state), Convergence::Converged(0.0));
        let mpp = maximum_power_point(&state).ok();
        assert_eq!(mpp, Some(ModulePoint::default()));
    }

    #[test]
    fn mpp_lies_between_zero_and_voc() {
        let state = stc_state();
        let voc = open_circuit_voltage(&state).ok().expect("converges");
        let mpp = maximum_power_point(&state).ok().expect("mpp converges");
        assert!(mpp.voltage > 0.7 * voc && mpp.voltage < voc);
        assert!((mpp.power - mpp.voltage * mpp.current).abs() < 1e-9);
    }

    #[test]
    fn point_at_voltage_clamps_negative_input() {
        let p = point_at_voltage(&stc_state(), -1.0);
        assert_eq!(p.voltage, 0.0);
        assert_eq!(p.power, 0.0);
        assert!(p.current > 9.0);
    }
}
