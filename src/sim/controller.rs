//! Per-step operating-point controller.
//!
//! Decides each step whether the inverter runs, which DC voltage the array
//! is held at, and how the power that does not reach the AC side is
//! attributed. The only state carried between steps is the on/off latch.

use std::fmt;

use tracing::{debug, warn};

use crate::inverter::{InverterModel, InverterOutput};
use crate::pv::{ArrayOperatingPoint, DiodeState, OperatingConditions, PvArray, TrackingMode};
use crate::solver::{self, Convergence, Solver};

/// Bracket width at which the clipping search stops (V).
pub const CLIPPING_VOLTAGE_TOLERANCE: f64 = 1e-4;

/// Operating state of the inverter after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InverterMode {
    #[default]
    Off,
    /// Tracking the array maximum-power point inside the MPPT window.
    Mppt,
    /// Maximum-power voltage below the window, held at the window minimum.
    ClampedLow,
    /// Maximum-power voltage above the window, held at the window maximum.
    ClampedHigh,
    /// Voltage raised above the maximum-power point to limit AC output.
    Clipping,
}

impl InverterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InverterMode::Off => "off",
            InverterMode::Mppt => "mppt",
            InverterMode::ClampedLow => "clamped_low",
            InverterMode::ClampedHigh => "clamped_high",
            InverterMode::Clipping => "clipping",
        }
    }
}

impl fmt::Display for InverterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Power lost to inverter limits during one step (W).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InverterLosses {
    pub below_threshold_w: f64,
    pub below_min_voltage_w: f64,
    pub above_max_voltage_w: f64,
    pub clipping_w: f64,
}

impl InverterLosses {
    pub fn total(&self) -> f64 {
        self.below_threshold_w + self.below_min_voltage_w + self.above_max_voltage_w + self.clipping_w
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InverterState {
    pub on: bool,
    /// The unconstrained maximum-power voltage lay inside the MPPT window.
    pub in_mppt_window: bool,
    pub clipping: bool,
    pub mode: InverterMode,
    /// Resolved DC voltage at the inverter input (V).
    pub input_voltage: f64,
    pub ac_power_w: f64,
    pub ac_current_a: f64,
    pub ac_voltage: f64,
    pub ac_wiring_loss_w: f64,
    pub losses: InverterLosses,
}

/// Everything the controller resolved for one step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepOutcome {
    /// Array point actually delivered to the inverter.
    pub array: ArrayOperatingPoint,
    /// Unconstrained maximum-power point.
    pub mpp: ArrayOperatingPoint,
    pub open_circuit_voltage: f64,
    pub inverter: InverterState,
    /// Diode parameters could be derived for this step.
    pub diode_state_valid: bool,
}

/// Inverter latch plus the models it arbitrates between.
#[derive(Debug, Clone)]
pub struct OperatingPointController {
    array: PvArray,
    inverter: InverterModel,
    on: bool,
}

impl OperatingPointController {
    /// Starts with the inverter switched off.
    pub fn new(array: PvArray, inverter: InverterModel) -> Self {
        Self {
            array,
            inverter,
            on: false,
        }
    }

    pub fn array(&self) -> &PvArray {
        &self.array
    }

    pub fn inverter(&self) -> &InverterModel {
        &self.inverter
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Resolves one step.
    pub fn step(&mut self, conditions: &OperatingConditions) -> StepOutcome {
        let state = match self.array.diode_state(conditions) {
            Convergence::Converged(state) => state,
            Convergence::Failed(reason) => {
                warn!(%reason, "diode state diverged, inverter switched off for this step");
                switch(&mut self.on, false, "diode state diverged");
                return StepOutcome::default();
            }
        };

        let array = &self.array;
        let inverter = &self.inverter;
        let spec = inverter.spec();

        let mpp = array.maximum_power_point(&state, conditions);
        let voc = array.open_circuit_voltage(&state);
        let off = |losses: InverterLosses| StepOutcome {
            array: ArrayOperatingPoint {
                voltage: voc,
                ..ArrayOperatingPoint::default()
            },
            mpp,
            open_circuit_voltage: voc,
            inverter: InverterState {
                losses,
                ..InverterState::default()
            },
            diode_state_valid: true,
        };

        if !self.on {
            if inverter.input_voltage(voc) > spec.min_voltage {
                switch(&mut self.on, true, "open-circuit voltage above minimum");
            } else {
                return off(InverterLosses {
                    below_min_voltage_w: mpp.power,
                    ..InverterLosses::default()
                });
            }
        }

        let mut losses = InverterLosses::default();
        let mpp_input = inverter.input_voltage(mpp.voltage);
        let in_mppt_window = (spec.mppt_min_voltage..=spec.mppt_max_voltage).contains(&mpp_input);
        let (mut point, mut mode) = if mpp_input < spec.mppt_min_voltage {
            let v = inverter.array_voltage(spec.mppt_min_voltage);
            let p = array.operating_point_at(&state, conditions, v, TrackingMode::FixedVoltage);
            losses.below_min_voltage_w = (mpp.power - p.power).max(0.0);
            (p, InverterMode::ClampedLow)
        } else if mpp_input > spec.mppt_max_voltage {
            let v = inverter.array_voltage(spec.mppt_max_voltage);
            let p = array.operating_point_at(&state, conditions, v, TrackingMode::FixedVoltage);
            losses.above_max_voltage_w = (mpp.power - p.power).max(0.0);
            (p, InverterMode::ClampedHigh)
        } else {
            (mpp, InverterMode::Mppt)
        };

        if point.power < inverter.threshold_power_w() {
            switch(&mut self.on, false, "power below start-up threshold");
            losses.below_threshold_w = point.power;
            return off(losses);
        }

        let mut output = inverter.convert(point.power, point.voltage);
        if output.clipping {
            let voltage = clipping_voltage(array, inverter, &state, conditions, point.voltage, voc)
                .recover(|reason| reason.last_estimate);
            let clipped =
                array.operating_point_at(&state, conditions, voltage, TrackingMode::FixedVoltage);
            losses.clipping_w = (point.power - clipped.power).max(0.0);
            output = inverter.limit_to_nominal(inverter.convert(clipped.power, clipped.voltage));
            output.clipping = true;
            point = clipped;
            mode = InverterMode::Clipping;
        }

        let input_voltage = inverter.input_voltage(point.voltage);
        if input_voltage > spec.max_voltage {
            switch(&mut self.on, false, "input voltage above maximum");
            return off(InverterLosses {
                above_max_voltage_w: mpp.power,
                ..InverterLosses::default()
            });
        }

        StepOutcome {
            array: point,
            mpp,
            open_circuit_voltage: voc,
            inverter: on_state(output, spec.output_voltage, input_voltage, mode, in_mppt_window, losses),
            diode_state_valid: true,
        }
    }
}

fn switch(latch: &mut bool, on: bool, reason: &'static str) {
    if *latch != on {
        debug!(from = *latch, to = on, reason, "inverter latch changed");
    }
    *latch = on;
}

fn on_state(
    output: InverterOutput,
    ac_voltage: f64,
    input_voltage: f64,
    mode: InverterMode,
    in_mppt_window: bool,
    losses: InverterLosses,
) -> InverterState {
    InverterState {
        on: true,
        in_mppt_window,
        clipping: output.clipping,
        mode,
        input_voltage,
        ac_power_w: output.ac_power_w,
        ac_current_a: output.ac_current_a,
        ac_voltage,
        ac_wiring_loss_w: output.ac_wiring_loss_w,
        losses,
    }
}

/// Lowest array voltage in `[low, high]` at which the inverter no longer clips.
///
/// Above the maximum-power point array power falls with voltage, so the
/// search moves the lower bound up while clipping persists.
pub fn clipping_voltage(
    array: &PvArray,
    inverter: &InverterModel,
    state: &DiodeState,
    conditions: &OperatingConditions,
    low: f64,
    high: f64,
) -> Convergence<f64> {
    solver::bisect_boundary(
        Solver::ClippingVoltage,
        low,
        high,
        CLIPPING_VOLTAGE_TOLERANCE,
        |voltage| {
            let p = array.operating_point_at(state, conditions, voltage, TrackingMode::FixedVoltage);
            inverter.convert(p.power, p.voltage).clipping
        },
    )
}
