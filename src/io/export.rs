//! CSV export for simulation step results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::StepResult;

/// Column header for CSV telemetry export.
const HEADER: &str = "timestep,time_hr,month,global_irradiance,effective_irradiance,\
                       module_temp_c,mode,inverter_on,in_mppt_window,clipping,\
                       open_circuit_voltage,mpp_power_w,array_voltage,array_current,dc_power_w,\
                       quality_loss_w,soiling_loss_w,mismatch_loss_w,ohmic_loss_w,\
                       below_threshold_loss_w,below_min_voltage_loss_w,above_max_voltage_loss_w,\
                       clipping_loss_w,ac_power_w,ac_current_a,ac_voltage,ac_wiring_loss_w,\
                       array_efficiency";

/// Exports simulation results to a CSV file at the given path.
///
/// Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(results: &[StepResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(results, buf)
}

/// Writes simulation results as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(results: &[StepResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    let w = |value: f64| format!("{value:.3}");
    for r in results {
        wtr.write_record(&[
            r.timestep.to_string(),
            format!("{:.4}", r.time_hr),
            r.month.to_string(),
            w(r.global_irradiance),
            w(r.effective_irradiance),
            w(r.module_temp_c),
            r.mode.as_str().to_string(),
            r.inverter_on.to_string(),
            r.in_mppt_window.to_string(),
            r.clipping.to_string(),
            w(r.open_circuit_voltage),
            w(r.mpp_power_w),
            w(r.array_voltage),
            format!("{:.4}", r.array_current),
            w(r.dc_power_w),
            w(r.module_quality_loss_w),
            w(r.soiling_loss_w),
            w(r.mismatch_loss_w),
            w(r.ohmic_loss_w),
            w(r.below_threshold_loss_w),
            w(r.below_min_voltage_loss_w),
            w(r.above_max_voltage_loss_w),
            w(r.clipping_loss_w),
            w(r.ac_power_w),
            format!("{:.4}", r.ac_current_a),
            w(r.ac_voltage),
            w(r.ac_wiring_loss_w),
            format!("{:.4}", r.array_efficiency),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
