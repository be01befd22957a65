//! TOML-based scenario configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::SimError;
use crate::inverter::{CurvePoint, EfficiencyCurves, InverterSpec, VoltageCurve};
use crate::pv::{ArraySpec, IamModel, ModuleSpec};
use crate::sim::types::SimConfig;
use crate::weather::SyntheticParams;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Run timing and synthetic weather parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Module datasheet.
    #[serde(default)]
    pub module: ModuleSpec,
    /// String layout and DC losses.
    #[serde(default)]
    pub array: ArraySpec,
    /// Inverter datasheet.
    #[serde(default)]
    pub inverter: InverterSpec,
}

/// Run timing and synthetic weather parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of timesteps per simulated day (must be > 0).
    pub steps_per_day: usize,
    /// Number of days to simulate (must be > 0).
    pub days: usize,
    /// Master random seed.
    pub seed: u64,
    /// Calendar month of the synthetic days (1–12).
    pub month: u32,
    /// Clear-sky plane-of-array irradiance at noon (W/m²).
    pub peak_irradiance: f64,
    pub sunrise_hr: f64,
    pub sunset_hr: f64,
    /// AR(1) cloud correlation coefficient (0.0–1.0).
    pub cloud_alpha: f64,
    /// AR(1) innovation noise standard deviation.
    pub cloud_noise_std: f64,
    pub ambient_min_c: f64,
    pub ambient_max_c: f64,
    pub wind_speed_ms: f64,
    pub noon_incidence_deg: f64,
    /// Weather CSV replacing the synthetic series; its row count sets the run length.
    pub weather_csv: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let synthetic = SyntheticParams::default();
        Self {
            steps_per_day: 24,
            days: 1,
            seed: 42,
            month: synthetic.month,
            peak_irradiance: synthetic.peak_irradiance,
            sunrise_hr: synthetic.sunrise_hr,
            sunset_hr: synthetic.sunset_hr,
            cloud_alpha: synthetic.cloud_alpha,
            cloud_noise_std: synthetic.cloud_noise_std,
            ambient_min_c: synthetic.ambient_min_c,
            ambient_max_c: synthetic.ambient_max_c,
            wind_speed_ms: synthetic.wind_speed_ms,
            noon_incidence_deg: synthetic.noon_incidence_deg,
            weather_csv: None,
        }
    }
}

impl SimulationConfig {
    /// Timing for the engine.
    ///
    /// # Panics
    ///
    /// Panics if `steps_per_day` or `days` is zero; call
    /// [`ScenarioConfig::validate`] first.
    pub fn sim_config(&self) -> SimConfig {
        SimConfig::new(self.steps_per_day, self.days, self.seed)
    }

    pub fn synthetic_params(&self) -> SyntheticParams {
        SyntheticParams {
            peak_irradiance: self.peak_irradiance,
            sunrise_hr: self.sunrise_hr,
            sunset_hr: self.sunset_hr,
            cloud_alpha: self.cloud_alpha,
            cloud_noise_std: self.cloud_noise_std,
            ambient_min_c: self.ambient_min_c,
            ambient_max_c: self.ambient_max_c,
            wind_speed_ms: self.wind_speed_ms,
            month: self.month,
            noon_incidence_deg: self.noon_incidence_deg,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.steps_per_day"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} — {}", self.field, self.message)
    }
}

impl From<SimError> for ConfigError {
    fn from(err: SimError) -> Self {
        match err {
            SimError::InvalidSpec { field, message } => Self { field, message },
            other => Self {
                field: "scenario".to_string(),
                message: other.to_string(),
            },
        }
    }
}

fn curve(points: &[(f64, f64)]) -> Vec<CurvePoint> {
    points
        .iter()
        .map(|&(power_w, efficiency)| CurvePoint { power_w, efficiency })
        .collect()
}

impl ScenarioConfig {
    /// Returns the baseline scenario: 200 modules (68 kWp) on one 60 kW inverter.
    pub fn baseline() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            module: ModuleSpec::default(),
            array: ArraySpec::default(),
            inverter: InverterSpec::default(),
        }
    }

    /// Returns the clipping preset: the baseline array on an undersized
    /// 45 kW inverter with voltage-dependent efficiency.
    pub fn clipping() -> Self {
        Self {
            simulation: SimulationConfig {
                peak_irradiance: 1050.0,
                cloud_noise_std: 0.1,
                ..SimulationConfig::default()
            },
            inverter: InverterSpec {
                nominal_ac_power_w: 45_000.0,
                efficiency: EfficiencyCurves::ThreeVoltage {
                    curves: vec![
                        VoltageCurve {
                            voltage: 500.0,
                            points: curve(&[
                                (1_200.0, 0.940),
                                (4_500.0, 0.968),
                                (11_000.0, 0.977),
                                (22_000.0, 0.980),
                                (45_000.0, 0.978),
                            ]),
                        },
                        VoltageCurve {
                            voltage: 650.0,
                            points: curve(&[
                                (1_200.0, 0.948),
                                (4_500.0, 0.974),
                                (11_000.0, 0.982),
                                (22_000.0, 0.985),
                                (45_000.0, 0.983),
                            ]),
                        },
                        VoltageCurve {
                            voltage: 800.0,
                            points: curve(&[
                                (1_200.0, 0.944),
                                (4_500.0, 0.971),
                                (11_000.0, 0.979),
                                (22_000.0, 0.982),
                                (45_000.0, 0.980),
                            ]),
                        },
                    ],
                },
                ..InverterSpec::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the short-string preset: 12-module strings whose
    /// maximum-power voltage sits below the MPPT window.
    pub fn short_string() -> Self {
        Self {
            array: ArraySpec {
                modules_in_series: 12,
                strings_in_parallel: 17,
                iam: IamModel::Ashrae { b0: 0.05 },
                ..ArraySpec::default()
            },
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "clipping", "short_string"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "clipping" => Ok(Self::clipping()),
            "short_string" => Ok(Self::short_string()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenario".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Simulation fields are checked here. Module, array and inverter
    /// sections go through the same checks their models run on
    /// construction, one error per section. Returns an empty vector if
    /// configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError {
                    field: field.into(),
                    message: message.into(),
                });
            }
        };

        let s = &self.simulation;
        check(s.steps_per_day > 0, "simulation.steps_per_day", "must be > 0");
        check(s.days > 0, "simulation.days", "must be > 0");
        check((1..=12).contains(&s.month), "simulation.month", "must be in 1..=12");
        check(s.peak_irradiance >= 0.0, "simulation.peak_irradiance", "must be >= 0");
        check(
            s.sunrise_hr < s.sunset_hr,
            "simulation.sunrise_hr",
            "must be < simulation.sunset_hr",
        );
        check(
            (0.0..=1.0).contains(&s.cloud_alpha),
            "simulation.cloud_alpha",
            "must be in [0.0, 1.0]",
        );
        check(
            s.ambient_min_c <= s.ambient_max_c,
            "simulation.ambient_min_c",
            "must be <= simulation.ambient_max_c",
        );

        let models = [
            self.module.validate(),
            self.array.validate(),
            self.inverter.validate(),
        ];
        errors.extend(models.into_iter().filter_map(Result::err).map(ConfigError::from));

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = ScenarioConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let e = err.unwrap_err().message;
        assert!(e.contains("unknown preset"));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
steps_per_day = 96
days = 2
seed = 7
month = 3

[module]
isc_ref = 10.2
voc_ref = 49.5
imp_ref = 9.6
vmp_ref = 41.5
cells_in_series = 72

[array]
modules_in_series = 18
strings_in_parallel = 8
soiling_monthly = [0.03, 0.03, 0.02, 0.02, 0.01, 0.01, 0.01, 0.01, 0.02, 0.02, 0.03, 0.03]

[array.iam]
model = "tabulated"
points = [
    { angle_deg = 0.0, factor = 1.0 },
    { angle_deg = 60.0, factor = 0.93 },
    { angle_deg = 90.0, factor = 0.0 },
]

[array.thermal]
uc = 25.0
uv = 1.2

[inverter]
nominal_ac_power_w = 50000.0
bipolar_input = false

[inverter.efficiency]
kind = "single"
points = [
    { power_w = 2000.0, efficiency = 0.95 },
    { power_w = 50000.0, efficiency = 0.98 },
]
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).expect("valid TOML should parse");
        assert_eq!(cfg.simulation.steps_per_day, 96);
        assert_eq!(cfg.module.cells_in_series, 72);
        assert_eq!(cfg.array.soiling_for_month(1), 0.03);
        assert!(matches!(
            &cfg.array.iam,
            IamModel::Tabulated { points } if points.len() == 3
        ));
        assert_eq!(cfg.array.thermal.absorptance, 0.9);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[module]
isc_ref = 9.0
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn unknown_efficiency_kind_is_rejected() {
        let toml = r#"
[inverter.efficiency]
kind = "five_voltage"
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_catches_zero_steps() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.steps_per_day = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.steps_per_day"));
    }

    #[test]
    fn validation_reports_every_problem() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.module.vmp_ref = 50.0;
        cfg.array.quality_loss = 1.2;
        cfg.inverter.phases = 2;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"module.vmp_ref".to_string()));
        assert!(fields.contains(&"array.quality_loss".to_string()));
        assert!(fields.contains(&"inverter.phases".to_string()));
    }

    #[test]
    fn validation_catches_unsorted_curve() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.inverter.efficiency = EfficiencyCurves::Single {
            points: curve(&[(5_000.0, 0.97), (1_000.0, 0.95)]),
        };
        let errors = cfg.validate();
        assert!(errors
            .iter()
            .any(|e| e.field == "inverter.efficiency" && e.message.contains("must increase")));
    }

    #[test]
    fn validation_catches_window_outside_limits() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.inverter.max_voltage = 800.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "inverter.mppt_window"));
    }

    #[test]
    fn section_errors_match_model_construction() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.array.soiling_monthly[6] = 1.0;
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        let err = crate::pv::PvArray::new(
            crate::pv::PvModule::calibrate(cfg.module.clone()).unwrap(),
            cfg.array.clone(),
        )
        .unwrap_err();
        assert_eq!(errors[0].to_string(), ConfigError::from(err).to_string());
        assert_eq!(errors[0].field, "array.soiling_monthly");
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name).expect("preset should load");
            let errors = cfg.validate();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn clipping_preset_undersizes_inverter() {
        let base = ScenarioConfig::baseline();
        let clip = ScenarioConfig::clipping();
        assert!(clip.inverter.nominal_ac_power_w < base.inverter.nominal_ac_power_w);
        assert!(matches!(clip.inverter.efficiency, EfficiencyCurves::ThreeVoltage { .. }));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[simulation]
seed = 99
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.simulation.seed, 99);
        assert_eq!(cfg.simulation.steps_per_day, 24);
        assert_eq!(cfg.array.modules_in_series, 20);
        assert_eq!(cfg.inverter.nominal_ac_power_w, 60_000.0);
    }

    #[test]
    fn synthetic_params_follow_simulation_table() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.month = 11;
        cfg.simulation.peak_irradiance = 640.0;
        let p = cfg.simulation.synthetic_params();
        assert_eq!(p.month, 11);
        assert_eq!(p.peak_irradiance, 640.0);
    }
}
