//! Core simulation types: run timing and the per-step result record.

use std::fmt;

use crate::pv::OperatingConditions;

use super::controller::{InverterMode, StepOutcome};

/// Run timing shared by the weather source, engine and report.
///
/// # Examples
///
/// ```
/// use pv_plant_sim::sim::types::SimConfig;
///
/// let cfg = SimConfig::new(24, 1, 42);
/// assert_eq!(cfg.dt_hours, 1.0);
/// assert_eq!(cfg.total_steps(), 24);
/// ```
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of simulation steps per day.
    pub steps_per_day: usize,
    /// Number of days to simulate.
    pub days: usize,
    /// Duration of one timestep in hours, derived as `24.0 / steps_per_day`.
    pub dt_hours: f64,
    /// Master random seed for reproducibility.
    pub seed: u64,
}

impl SimConfig {
    /// Creates a new simulation configuration.
    ///
    /// # Panics
    ///
    /// Panics if `steps_per_day` or `days` is zero.
    pub fn new(steps_per_day: usize, days: usize, seed: u64) -> Self {
        assert!(steps_per_day > 0, "steps_per_day must be > 0");
        assert!(days > 0, "days must be > 0");
        Self {
            steps_per_day,
            days,
            dt_hours: 24.0 / steps_per_day as f64,
            seed,
        }
    }

    /// Total number of simulation steps across all days.
    pub fn total_steps(&self) -> usize {
        self.steps_per_day * self.days
    }
}

/// Complete record of one simulation timestep. Powers in W, voltages in V.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub timestep: usize,
    /// Simulation time in hours.
    pub time_hr: f64,
    pub month: u32,
    /// Plane-of-array irradiance before incidence losses (W/m²).
    pub global_irradiance: f64,
    pub effective_irradiance: f64,
    pub module_temp_c: f64,
    pub mode: InverterMode,
    pub inverter_on: bool,
    pub in_mppt_window: bool,
    pub clipping: bool,
    pub open_circuit_voltage: f64,
    pub mpp_power_w: f64,
    pub array_voltage: f64,
    pub array_current: f64,
    /// DC power delivered to the inverter.
    pub dc_power_w: f64,
    pub module_quality_loss_w: f64,
    pub soiling_loss_w: f64,
    pub mismatch_loss_w: f64,
    pub ohmic_loss_w: f64,
    pub below_threshold_loss_w: f64,
    pub below_min_voltage_loss_w: f64,
    pub above_max_voltage_loss_w: f64,
    pub clipping_loss_w: f64,
    pub ac_power_w: f64,
    pub ac_current_a: f64,
    pub ac_voltage: f64,
    pub ac_wiring_loss_w: f64,
    /// Array efficiency against unshaded plane-of-array irradiance.
    pub array_efficiency: f64,
}

impl StepResult {
    /// Flattens a controller outcome into a record.
    pub fn from_outcome(
        timestep: usize,
        time_hr: f64,
        conditions: &OperatingConditions,
        outcome: &StepOutcome,
    ) -> Self {
        let array = &outcome.array;
        let inverter = &outcome.inverter;
        Self {
            timestep,
            time_hr,
            month: conditions.month,
            global_irradiance: conditions.global_irradiance,
            effective_irradiance: conditions.effective_irradiance,
            module_temp_c: conditions.module_temp_c,
            mode: inverter.mode,
            inverter_on: inverter.on,
            in_mppt_window: inverter.in_mppt_window,
            clipping: inverter.clipping,
            open_circuit_voltage: outcome.open_circuit_voltage,
            mpp_power_w: outcome.mpp.power,
            array_voltage: array.voltage,
            array_current: array.current,
            dc_power_w: array.power,
            module_quality_loss_w: array.losses.quality_w,
            soiling_loss_w: array.losses.soiling_w,
            mismatch_loss_w: array.losses.mismatch_w,
            ohmic_loss_w: array.losses.ohmic_w,
            below_threshold_loss_w: inverter.losses.below_threshold_w,
            below_min_voltage_loss_w: inverter.losses.below_min_voltage_w,
            above_max_voltage_loss_w: inverter.losses.above_max_voltage_w,
            clipping_loss_w: inverter.losses.clipping_w,
            ac_power_w: inverter.ac_power_w,
            ac_current_a: inverter.ac_current_a,
            ac_voltage: inverter.ac_voltage,
            ac_wiring_loss_w: inverter.ac_wiring_loss_w,
            array_efficiency: array.efficiency,
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>3} ({:>5.2}h) | G={:>6.1} W/m²  Tc={:>5.1}°C | {:<12} \
             dc={:>7.2} kW @ {:>6.1} V  ac={:>7.2} kW | \
             loss(clip={:.2}, vmin={:.2}, vmax={:.2}, thr={:.2}) kW",
            self.timestep,
            self.time_hr,
            self.global_irradiance,
            self.module_temp_c,
            self.mode,
            self.dc_power_w / 1000.0,
            self.array_voltage,
            self.ac_power_w / 1000.0,
            self.clipping_loss_w / 1000.0,
            self.below_min_voltage_loss_w / 1000.0,
            self.above_max_voltage_loss_w / 1000.0,
            self.below_threshold_loss_w / 1000.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::controller::{InverterLosses, InverterState};

    #[test]
    fn sim_config_basic() {
        let cfg = SimConfig::new(24, 1, 42);
        assert_eq!(cfg.steps_per_day, 24);
        assert_eq!(cfg.dt_hours, 1.0);
        assert_eq!(cfg.total_steps(), 24);
    }

    #[test]
    fn sim_config_quarter_hours() {
        let cfg = SimConfig::new(96, 2, 0);
        assert_eq!(cfg.total_steps(), 192);
        assert_eq!(cfg.dt_hours, 0.25);
    }

    #[test]
    #[should_panic]
    fn sim_config_zero_steps_panics() {
        SimConfig::new(0, 1, 0);
    }

    #[test]
    fn from_outcome_copies_losses() {
        let outcome = StepOutcome {
            inverter: InverterState {
                mode: InverterMode::Clipping,
                on: true,
                clipping: true,
                ac_power_w: 60_000.0,
                losses: InverterLosses {
                    clipping_w: 1_500.0,
                    ..InverterLosses::default()
                },
                ..InverterState::default()
            },
            ..StepOutcome::default()
        };
        let cond = OperatingConditions::new(1000.0, 40.0).with_month(7);
        let r = StepResult::from_outcome(3, 1.5, &cond, &outcome);
        assert_eq!(r.mode, InverterMode::Clipping);
        assert_eq!(r.clipping_loss_w, 1_500.0);
        assert_eq!(r.month, 7);
        assert!(format!("{r}").contains("clipping"));
    }
}
