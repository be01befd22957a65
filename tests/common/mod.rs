//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use pv_plant_sim::inverter::{InverterModel, InverterSpec};
use pv_plant_sim::pv::{ArraySpec, ModuleSpec, OperatingConditions, PvArray, PvModule};
use pv_plant_sim::sim::controller::OperatingPointController;
use pv_plant_sim::sim::types::SimConfig;

/// Default simulation configuration (24 steps/day, 1 day, seed 42).
pub fn default_config() -> SimConfig {
    SimConfig::new(24, 1, 42)
}

/// Calibrated 340 W default module.
pub fn default_module() -> PvModule {
    PvModule::calibrate(ModuleSpec::default()).expect("default module should calibrate")
}

/// Default array losses with a custom string layout.
pub fn array_with_layout(modules_in_series: u32, strings_in_parallel: u32) -> PvArray {
    let spec = ArraySpec {
        modules_in_series,
        strings_in_parallel,
        ..ArraySpec::default()
    };
    PvArray::new(default_module(), spec).expect("array spec should be valid")
}

/// Baseline 20 x 10 array (68 kWp).
pub fn default_array() -> PvArray {
    array_with_layout(20, 10)
}

/// Baseline 60 kW inverter.
pub fn default_inverter() -> InverterModel {
    InverterModel::new(InverterSpec::default()).expect("inverter spec should be valid")
}

pub fn inverter_with(spec: InverterSpec) -> InverterModel {
    InverterModel::new(spec).expect("inverter spec should be valid")
}

/// Controller over the baseline array and inverter, initially off.
pub fn default_controller() -> OperatingPointController {
    OperatingPointController::new(default_array(), default_inverter())
}

/// Uniform conditions in June (2% soiling like every month of the default spec).
pub fn conditions(irradiance: f64, module_temp_c: f64) -> OperatingConditions {
    OperatingConditions::new(irradiance, module_temp_c).with_month(6)
}

/// Runs one warm-up step at `warm_up` so the latch is on, then returns the
/// outcome at `target`.
pub fn step_after_warm_up(
    controller: &mut OperatingPointController,
    warm_up: OperatingConditions,
    target: OperatingConditions,
) -> pv_plant_sim::sim::controller::StepOutcome {
    controller.step(&warm_up);
    controller.step(&target)
}
