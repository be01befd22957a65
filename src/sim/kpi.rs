//! Post-hoc energy accounting from simulation results.

use std::fmt;

use super::controller::InverterMode;
use super::types::StepResult;

/// Energy totals and loss attribution for a complete run.
///
/// Computed post-hoc from `Vec<StepResult>` so reported totals always agree
/// with the exported step data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyReport {
    /// Plane-of-array irradiation (kWh/m²).
    pub irradiation_kwh_m2: f64,
    pub dc_energy_kwh: f64,
    pub ac_energy_kwh: f64,
    /// AC energy after the output wiring loss.
    pub grid_energy_kwh: f64,
    pub module_quality_loss_kwh: f64,
    pub soiling_loss_kwh: f64,
    pub mismatch_loss_kwh: f64,
    pub ohmic_loss_kwh: f64,
    pub below_threshold_loss_kwh: f64,
    pub below_min_voltage_loss_kwh: f64,
    pub above_max_voltage_loss_kwh: f64,
    pub clipping_loss_kwh: f64,
    pub ac_wiring_loss_kwh: f64,
    pub peak_ac_kw: f64,
    /// AC energy per installed kWp (kWh/kWp).
    pub specific_yield: f64,
    /// Specific yield over reference yield.
    pub performance_ratio: f64,
    pub hours_on: f64,
    pub hours_clipping: f64,
    pub hours_clamped: f64,
}

impl EnergyReport {
    /// Integrates step powers over `dt_hours`.
    ///
    /// # Arguments
    ///
    /// * `results` - Complete simulation step results
    /// * `dt_hours` - Timestep duration in hours
    /// * `nominal_kwp` - Installed datasheet power of the array
    pub fn from_results(results: &[StepResult], dt_hours: f64, nominal_kwp: f64) -> Self {
        let kwh = |w: f64| w * dt_hours / 1000.0;
        let mut report = Self::default();

        for r in results {
            report.irradiation_kwh_m2 += kwh(r.global_irradiance);
            report.dc_energy_kwh += kwh(r.dc_power_w);
            report.ac_energy_kwh += kwh(r.ac_power_w);
            report.module_quality_loss_kwh += kwh(r.module_quality_loss_w);
            report.soiling_loss_kwh += kwh(r.soiling_loss_w);
            report.mismatch_loss_kwh += kwh(r.mismatch_loss_w);
            report.ohmic_loss_kwh += kwh(r.ohmic_loss_w);
            report.below_threshold_loss_kwh += kwh(r.below_threshold_loss_w);
            report.below_min_voltage_loss_kwh += kwh(r.below_min_voltage_loss_w);
            report.above_max_voltage_loss_kwh += kwh(r.above_max_voltage_loss_w);
            report.clipping_loss_kwh += kwh(r.clipping_loss_w);
            report.ac_wiring_loss_kwh += kwh(r.ac_wiring_loss_w);
            report.peak_ac_kw = report.peak_ac_kw.max(r.ac_power_w / 1000.0);

            if r.inverter_on {
                report.hours_on += dt_hours;
            }
            match r.mode {
                InverterMode::Clipping => report.hours_clipping += dt_hours,
                InverterMode::ClampedLow | InverterMode::ClampedHigh => {
                    report.hours_clamped += dt_hours;
                }
                InverterMode::Off | InverterMode::Mppt => {}
            }
        }

        report.grid_energy_kwh = report.ac_energy_kwh - report.ac_wiring_loss_kwh;
        if nominal_kwp > 0.0 {
            report.specific_yield = report.ac_energy_kwh / nominal_kwp;
        }
        // reference yield in hours at 1 kW/m²
        if report.irradiation_kwh_m2 > 0.0 {
            report.performance_ratio = report.specific_yield / report.irradiation_kwh_m2;
        }
        report
    }

    /// Sum of the inverter-limit losses (kWh).
    pub fn inverter_limit_loss_kwh(&self) -> f64 {
        self.below_threshold_loss_kwh
            + self.below_min_voltage_loss_kwh
            + self.above_max_voltage_loss_kwh
            + self.clipping_loss_kwh
    }
}

impl fmt::Display for EnergyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Energy Report ---")?;
        writeln!(f, "Irradiation:             {:.3} kWh/m2", self.irradiation_kwh_m2)?;
        writeln!(f, "DC energy:               {:.3} kWh", self.dc_energy_kwh)?;
        writeln!(f, "AC energy:               {:.3} kWh", self.ac_energy_kwh)?;
        writeln!(f, "Grid energy:             {:.3} kWh", self.grid_energy_kwh)?;
        writeln!(f, "Peak AC power:           {:.3} kW", self.peak_ac_kw)?;
        writeln!(f, "Module quality loss:     {:.3} kWh", self.module_quality_loss_kwh)?;
        writeln!(f, "Soiling loss:            {:.3} kWh", self.soiling_loss_kwh)?;
        writeln!(f, "Mismatch loss:           {:.3} kWh", self.mismatch_loss_kwh)?;
        writeln!(f, "Ohmic loss:              {:.3} kWh", self.ohmic_loss_kwh)?;
        writeln!(f, "Below-threshold loss:    {:.3} kWh", self.below_threshold_loss_kwh)?;
        writeln!(f, "Below-min-voltage loss:  {:.3} kWh", self.below_min_voltage_loss_kwh)?;
        writeln!(f, "Above-max-voltage loss:  {:.3} kWh", self.above_max_voltage_loss_kwh)?;
        writeln!(f, "Clipping loss:           {:.3} kWh", self.clipping_loss_kwh)?;
        writeln!(f, "AC wiring loss:          {:.3} kWh", self.ac_wiring_loss_kwh)?;
        writeln!(f, "Specific yield:          {:.3} kWh/kWp", self.specific_yield)?;
        writeln!(f, "Performance ratio:       {:.3}", self.performance_ratio)?;
        writeln!(f, "Hours on:                {:.2} h", self.hours_on)?;
        writeln!(f, "Hours clipping:          {:.2} h", self.hours_clipping)?;
        write!(f, "Hours clamped:           {:.2} h", self.hours_clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(mode: InverterMode, dc_power_w: f64, ac_power_w: f64) -> StepResult {
        StepResult {
            timestep: 0,
            time_hr: 0.0,
            month: 6,
            global_irradiance: 500.0,
            effective_irradiance: 480.0,
            module_temp_c: 35.0,
            mode,
            inverter_on: mode != InverterMode::Off,
            in_mppt_window: mode == InverterMode::Mppt,
            clipping: mode == InverterMode::Clipping,
            open_circuit_voltage: 900.0,
            mpp_power_w: dc_power_w,
            array_voltage: 700.0,
            array_current: dc_power_w / 700.0,
            dc_power_w,
            module_quality_loss_w: 0.0,
            soiling_loss_w: 0.0,
            mismatch_loss_w: 0.0,
            ohmic_loss_w: 0.0,
            below_threshold_loss_w: 0.0,
            below_min_voltage_loss_w: 0.0,
            above_max_voltage_loss_w: 0.0,
            clipping_loss_w: 0.0,
            ac_power_w,
            ac_current_a: 0.0,
            ac_voltage: 400.0,
            ac_wiring_loss_w: 0.0,
            array_efficiency: 0.18,
        }
    }

    #[test]
    fn energy_integrates_over_step_length() {
        let results = vec![make_result(InverterMode::Mppt, 20_000.0, 19_600.0); 4];
        let report = EnergyReport::from_results(&results, 0.5, 68.0);
        assert!((report.dc_energy_kwh - 40.0).abs() < 1e-9);
        assert!((report.ac_energy_kwh - 39.2).abs() < 1e-9);
        assert!((report.irradiation_kwh_m2 - 1.0).abs() < 1e-9);
        assert!((report.hours_on - 2.0).abs() < 1e-9);
    }

    #[test]
    fn performance_ratio_divides_yield_by_irradiation() {
        let results = vec![make_result(InverterMode::Mppt, 10_000.0, 10_000.0); 2];
        let report = EnergyReport::from_results(&results, 1.0, 40.0);
        // yield 20 kWh / 40 kWp = 0.5 h, irradiation 1.0 kWh/m²
        assert!((report.specific_yield - 0.5).abs() < 1e-9);
        assert!((report.performance_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn mode_hours_are_counted() {
        let mut results = vec![
            make_result(InverterMode::Clipping, 70_000.0, 60_000.0),
            make_result(InverterMode::ClampedLow, 5_000.0, 4_800.0),
            make_result(InverterMode::ClampedHigh, 5_000.0, 4_800.0),
            make_result(InverterMode::Off, 0.0, 0.0),
        ];
        results[0].clipping_loss_w = 2_000.0;
        let report = EnergyReport::from_results(&results, 1.0, 68.0);
        assert_eq!(report.hours_clipping, 1.0);
        assert_eq!(report.hours_clamped, 2.0);
        assert_eq!(report.hours_on, 3.0);
        assert!((report.clipping_loss_kwh - 2.0).abs() < 1e-9);
        assert!((report.peak_ac_kw - 60.0).abs() < 1e-9);
    }

    #[test]
    fn empty_results() {
        let report = EnergyReport::from_results(&[], 1.0, 68.0);
        assert_eq!(report, EnergyReport::default());
    }

    #[test]
    fn display_lists_every_loss() {
        let text = EnergyReport::default().to_string();
        for label in ["Clipping loss:", "Below-min-voltage loss:", "Ohmic loss:", "Performance ratio:"] {
            assert!(text.contains(label), "missing {label}");
        }
    }
}
