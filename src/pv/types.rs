//! Photovoltaic data model: datasheet inputs, per-step conditions, and
//! solver results.

use serde::Deserialize;

/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.380_649e-23;
/// Elementary charge (C).
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;
/// Offset between Celsius and Kelvin.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Electrical datasheet of one module.
///
/// Currents in amperes, voltages in volts, resistances in ohms,
/// temperatures in degrees Celsius, irradiance in W/m².
/// `mu_isc` is in A/K, `mu_voc` in V/K, and `mu_pmpp` is a fraction per
/// kelvin (e.g. `-0.0038` for -0.38 %/K).
///
/// The optional diode parameters bypass the matching calibration step when
/// supplied.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleSpec {
    pub isc_ref: f64,
    pub voc_ref: f64,
    pub imp_ref: f64,
    pub vmp_ref: f64,
    pub cells_in_series: u32,
    pub series_resistance: f64,
    /// Shunt resistance at reference irradiance.
    pub shunt_resistance_ref: f64,
    /// Shunt resistance at zero irradiance.
    pub shunt_resistance_zero: f64,
    /// Exponential shape factor of the shunt-resistance irradiance blend.
    pub shunt_resistance_exp: f64,
    pub gamma_ref: Option<f64>,
    pub mu_gamma: Option<f64>,
    pub io_ref: Option<f64>,
    pub iph_ref: Option<f64>,
    pub temperature_ref_c: f64,
    pub irradiance_ref: f64,
    pub mu_isc: f64,
    pub mu_voc: f64,
    pub mu_pmpp: f64,
    /// Semiconductor band gap (eV).
    pub band_gap_ev: f64,
    pub area_m2: f64,
}

impl Default for ModuleSpec {
    /// A 96-cell, 340 W monocrystalline module.
    fn default() -> Self {
        Self {
            isc_ref: 9.4,
            voc_ref: 46.2,
            imp_ref: 8.8,
            vmp_ref: 38.6,
            cells_in_series: 96,
            series_resistance: 0.18,
            shunt_resistance_ref: 300.0,
            shunt_resistance_zero: 1200.0,
            shunt_resistance_exp: 5.5,
            gamma_ref: None,
            mu_gamma: None,
            io_ref: None,
            iph_ref: None,
            temperature_ref_c: 25.0,
            irradiance_ref: 1000.0,
            mu_isc: 0.0047,
            mu_voc: -0.134,
            mu_pmpp: -0.0038,
            band_gap_ev: 1.12,
            area_m2: 1.63,
        }
    }
}

impl ModuleSpec {
    /// Datasheet maximum power (W).
    pub fn pmpp_ref(&self) -> f64 {
        self.imp_ref * self.vmp_ref
    }

    /// Datasheet conversion efficiency at reference conditions.
    pub fn reference_efficiency(&self) -> f64 {
        if self.area_m2 > 0.0 && self.irradiance_ref > 0.0 {
            self.pmpp_ref() / (self.irradiance_ref * self.area_m2)
        } else {
            0.0
        }
    }

    /// `Ns k T / q` for the whole cell string at `temp_c` (V per unit ideality).
    pub fn string_thermal_voltage(&self, temp_c: f64) -> f64 {
        f64::from(self.cells_in_series) * BOLTZMANN * (temp_c + KELVIN_OFFSET) / ELEMENTARY_CHARGE
    }
}

/// Incidence-angle modifier model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum IamModel {
    /// `1 - b0 (1 / cos θ - 1)`
    Ashrae { b0: f64 },
    /// Angle → factor table, linearly interpolated.
    Tabulated { points: Vec<IamPoint> },
}

impl Default for IamModel {
    fn default() -> Self {
        IamModel::Ashrae { b0: 0.05 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IamPoint {
    pub angle_deg: f64,
    pub factor: f64,
}

/// Heat-balance coefficients of the cell-temperature model.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThermalSpec {
    /// Constant heat-loss factor (W/m²K).
    pub uc: f64,
    /// Wind-dependent heat-loss factor (W/m²K per m/s).
    pub uv: f64,
    pub absorptance: f64,
}

impl Default for ThermalSpec {
    /// Free-standing rack mounting.
    fn default() -> Self {
        Self {
            uc: 29.0,
            uv: 0.0,
            absorptance: 0.9,
        }
    }
}

/// Layout and loss factors of one array (sub-array feeding one inverter group).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArraySpec {
    pub modules_in_series: u32,
    pub strings_in_parallel: u32,
    /// Module quality loss, applied as a current derating.
    pub quality_loss: f64,
    /// Mismatch loss while the inverter tracks the maximum-power point.
    pub mismatch_loss_mppt: f64,
    /// Mismatch loss while the array is pinned to a fixed voltage.
    pub mismatch_loss_fixed_voltage: f64,
    /// Soiling loss fraction per calendar month, January first.
    pub soiling_monthly: [f64; 12],
    pub iam: IamModel,
    /// Array DC wiring resistance (ohm).
    pub wiring_resistance: f64,
    pub thermal: ThermalSpec,
}

impl Default for ArraySpec {
    fn default() -> Self {
        Self {
            modules_in_series: 20,
            strings_in_parallel: 10,
            quality_loss: 0.01,
            mismatch_loss_mppt: 0.01,
            mismatch_loss_fixed_voltage: 0.025,
            soiling_monthly: [0.02; 12],
            iam: IamModel::default(),
            wiring_resistance: 0.1,
            thermal: ThermalSpec::default(),
        }
    }
}

impl ArraySpec {
    /// Soiling fraction for a 1-based calendar month; out-of-range months clamp.
    pub fn soiling_for_month(&self, month: u32) -> f64 {
        let index = month.clamp(1, 12) as usize - 1;
        self.soiling_monthly[index]
    }
}

/// Per-step physical conditions on the array plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatingConditions {
    /// Plane-of-array irradiance before incidence corrections (W/m²).
    pub global_irradiance: f64,
    /// Irradiance reaching the cells after incidence corrections (W/m²).
    pub effective_irradiance: f64,
    pub module_temp_c: f64,
    pub ambient_temp_c: f64,
    pub wind_speed_ms: f64,
    /// Calendar month, 1–12.
    pub month: u32,
}

impl OperatingConditions {
    /// Uniform conditions: no incidence loss, ambient equal to module temperature.
    pub fn new(irradiance: f64, module_temp_c: f64) -> Self {
        Self {
            global_irradiance: irradiance,
            effective_irradiance: irradiance,
            module_temp_c,
            ambient_temp_c: module_temp_c,
            wind_speed_ms: 0.0,
            month: 1,
        }
    }

    pub fn with_month(mut self, month: u32) -> Self {
        self.month = month;
        self
    }
}

/// Calibrated diode parameters at reference conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiodeParams {
    pub gamma_ref: f64,
    /// Ideality factor change per kelvin.
    pub mu_gamma: f64,
    pub io_ref: f64,
    pub iph_ref: f64,
}

/// Diode parameters for one time step. Recomputed fresh every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiodeState {
    pub gamma: f64,
    /// `γ Ns k T / q`, the exponent scale of the diode term (V).
    pub modified_ideality: f64,
    pub io: f64,
    pub iph: f64,
    pub rsh: f64,
    /// Series plus per-module wiring resistance.
    pub rs: f64,
    /// Linear open-circuit voltage estimate, used when the solve fails.
    pub voc_linear: f64,
    /// Irradiance-scaled initial guess for the current solve.
    pub current_guess: f64,
}

/// Voltage, current and power of a single module.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModulePoint {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
}

/// Whether the array follows its maximum-power point or is held at a voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    Mppt,
    FixedVoltage,
}

/// Array-level losses in watts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArrayLosses {
    pub quality_w: f64,
    pub soiling_w: f64,
    pub mismatch_w: f64,
    pub ohmic_w: f64,
}

impl ArrayLosses {
    pub fn total(&self) -> f64 {
        self.quality_w + self.soiling_w + self.mismatch_w + self.ohmic_w
    }
}

/// Operating point of the whole array.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArrayOperatingPoint {
    /// Module terminal values.
    pub module: ModulePoint,
    /// Array voltage at the inverter input (V).
    pub voltage: f64,
    /// Array current after derating (A).
    pub current: f64,
    /// Net array power after ohmic loss (W).
    pub power: f64,
    pub losses: ArrayLosses,
    /// Net power over unshaded plane-of-array irradiance on the module area.
    pub efficiency: f64,
}
