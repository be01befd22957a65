//! Inverter datasheet and conversion results.

use serde::Deserialize;

/// One point of an efficiency curve: per-unit DC input power and the
/// conversion efficiency reached there.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CurvePoint {
    pub power_w: f64,
    pub efficiency: f64,
}

/// Efficiency curve measured at one DC input voltage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoltageCurve {
    pub voltage: f64,
    pub points: Vec<CurvePoint>,
}

/// Efficiency characteristic of the inverter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EfficiencyCurves {
    /// Voltage-independent curve.
    Single { points: Vec<CurvePoint> },
    /// Low, medium and high input-voltage curves, interpolated across voltage.
    ThreeVoltage { curves: Vec<VoltageCurve> },
}

impl Default for EfficiencyCurves {
    fn default() -> Self {
        EfficiencyCurves::Single {
            points: default_points(),
        }
    }
}

fn point(power_w: f64, efficiency: f64) -> CurvePoint {
    CurvePoint { power_w, efficiency }
}

/// European-efficiency style curve of a 60 kW string inverter.
pub(crate) fn default_points() -> Vec<CurvePoint> {
    vec![
        point(1_500.0, 0.950),
        point(3_000.0, 0.970),
        point(6_000.0, 0.978),
        point(15_000.0, 0.984),
        point(30_000.0, 0.985),
        point(45_000.0, 0.984),
        point(62_000.0, 0.982),
    ]
}

/// Inverter datasheet. Power values are per unit, voltages are at the
/// inverter input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InverterSpec {
    /// Rated AC output of one unit (W).
    pub nominal_ac_power_w: f64,
    pub units: u32,
    /// DC power one unit needs to start converting (W).
    pub threshold_power_w: f64,
    pub mppt_min_voltage: f64,
    pub mppt_max_voltage: f64,
    /// Lowest input voltage at which the unit switches on.
    pub min_voltage: f64,
    /// Absolute input voltage limit.
    pub max_voltage: f64,
    /// Input is split across two poles, each seeing half the array voltage.
    pub bipolar_input: bool,
    /// Line-to-line output voltage (V).
    pub output_voltage: f64,
    pub phases: u32,
    /// AC wiring resistance between inverter and grid connection (ohm).
    pub ac_wiring_resistance: f64,
    pub efficiency: EfficiencyCurves,
}

impl Default for InverterSpec {
    fn default() -> Self {
        Self {
            nominal_ac_power_w: 60_000.0,
            units: 1,
            threshold_power_w: 100.0,
            mppt_min_voltage: 480.0,
            mppt_max_voltage: 850.0,
            min_voltage: 450.0,
            max_voltage: 1_100.0,
            bipolar_input: false,
            output_voltage: 400.0,
            phases: 3,
            ac_wiring_resistance: 0.02,
            efficiency: EfficiencyCurves::default(),
        }
    }
}

/// Result of one DC to AC conversion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InverterOutput {
    pub dc_power_w: f64,
    pub efficiency: f64,
    pub ac_power_w: f64,
    /// AC output reached or exceeded the rated power of all units.
    pub clipping: bool,
    pub ac_current_a: f64,
    pub ac_wiring_loss_w: f64,
}
