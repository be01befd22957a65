//! Calibrated module model and per-step diode-state derivation.

use tracing::info;

use crate::error::{SimError, SimResult};
use crate::solver::{Convergence, NonConvergence, Solver};

use super::calibration;
use super::diode;
use super::types::{
    BOLTZMANN, DiodeParams, DiodeState, ELEMENTARY_CHARGE, KELVIN_OFFSET, ModulePoint, ModuleSpec,
};

/// Largest accepted relative deviation of the per-step ideality factor from
/// its reference value.
pub const GAMMA_DRIFT_LIMIT: f64 = 0.5;

/// Shape factor substituted when the configured one is exactly zero.
const SHUNT_EXP_FLOOR: f64 = 0.01;

/// A module whose datasheet has been reduced to one-diode parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PvModule {
    spec: ModuleSpec,
    params: DiodeParams,
}

impl PvModule {
    /// Validates the datasheet and runs both calibrations.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidSpec`] for non-physical datasheet values,
    /// [`SimError::Calibration`] when no ideality factor can be found, and
    /// [`SimError::BracketNotSigned`] when the temperature-coefficient search
    /// cannot bracket the datasheet power coefficient.
    pub fn calibrate(spec: ModuleSpec) -> SimResult<Self> {
        spec.validate()?;

        let gamma_ref = match spec.gamma_ref {
            Some(gamma) => gamma,
            None => calibration::solve_ideality_factor(&spec)?,
        };
        let (io_calc, iph_calc) = calibration::reference_currents(&spec, gamma_ref);
        let io_ref = spec.io_ref.unwrap_or(io_calc);
        let iph_ref = spec.iph_ref.unwrap_or(iph_calc);
        if !(io_ref > 0.0 && io_ref.is_finite() && iph_ref > 0.0 && iph_ref.is_finite()) {
            return Err(SimError::Calibration(format!(
                "non-physical reference currents io={io_ref:e} iph={iph_ref}"
            )));
        }

        let mu_gamma = match spec.mu_gamma {
            Some(mu) => mu,
            None => calibration::solve_gamma_temperature_coefficient(
                &spec, gamma_ref, io_ref, iph_ref,
            )?,
        };

        let params = DiodeParams {
            gamma_ref,
            mu_gamma,
            io_ref,
            iph_ref,
        };
        let module = Self { spec, params };
        info!(
            gamma_ref,
            mu_gamma,
            io_ref,
            iph_ref,
            pmax_w = module.reference_mpp().power,
            "module calibrated"
        );
        Ok(module)
    }

    /// Builds a module from already-known diode parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidSpec`] for non-physical datasheet values.
    pub fn from_params(spec: ModuleSpec, params: DiodeParams) -> SimResult<Self> {
        spec.validate()?;
        Ok(Self { spec, params })
    }

    pub fn spec(&self) -> &ModuleSpec {
        &self.spec
    }

    pub fn params(&self) -> &DiodeParams {
        &self.params
    }

    /// Temperature-adjusted ideality factor.
    pub fn gamma_at(&self, temp_c: f64) -> f64 {
        self.params.gamma_ref + self.params.mu_gamma * (temp_c - self.spec.temperature_ref_c)
    }

    /// Derives the diode state for one step.
    ///
    /// `wiring_resistance` is the per-module share of the array wiring and
    /// enters the diode argument together with the series resistance. The
    /// step fails when the ideality factor leaves its allowed neighbourhood.
    pub fn diode_state(
        &self,
        irradiance: f64,
        temp_c: f64,
        wiring_resistance: f64,
    ) -> Convergence<DiodeState> {
        let gamma = self.gamma_at(temp_c);
        let reference = self.params.gamma_ref;
        if !(gamma > 0.0 && (gamma - reference).abs() <= GAMMA_DRIFT_LIMIT * reference) {
            return Convergence::Failed(NonConvergence {
                solver: Solver::DiodeState,
                iterations: 0,
                last_estimate: gamma,
            });
        }
        Convergence::Converged(derive_state(
            &self.spec,
            &self.params,
            gamma,
            irradiance,
            temp_c,
            wiring_resistance,
        ))
    }

    /// Maximum-power point of one module at reference conditions.
    pub fn reference_mpp(&self) -> ModulePoint {
        let state = derive_state(
            &self.spec,
            &self.params,
            self.params.gamma_ref,
            self.spec.irradiance_ref,
            self.spec.temperature_ref_c,
            0.0,
        );
        diode::maximum_power_point(&state).recover(|_| ModulePoint::default())
    }
}

/// Diode state for an explicit ideality factor.
pub(crate) fn derive_state(
    spec: &ModuleSpec,
    params: &DiodeParams,
    gamma: f64,
    irradiance: f64,
    temp_c: f64,
    wiring_resistance: f64,
) -> DiodeState {
    let irradiance = irradiance.max(0.0);
    let t = temp_c + KELVIN_OFFSET;
    let t_ref = spec.temperature_ref_c + KELVIN_OFFSET;
    let d_t = temp_c - spec.temperature_ref_c;
    let g_ratio = irradiance / spec.irradiance_ref;

    let arrhenius =
        ELEMENTARY_CHARGE * spec.band_gap_ev / (gamma * BOLTZMANN) * (1.0 / t_ref - 1.0 / t);
    let io = params.io_ref * (t / t_ref).powi(3) * arrhenius.exp();
    let iph = (g_ratio * (params.iph_ref + spec.mu_isc * d_t)).max(0.0);

    DiodeState {
        gamma,
        modified_ideality: gamma * spec.string_thermal_voltage(temp_c),
        io,
        iph,
        rsh: shunt_resistance(spec, irradiance),
        rs: spec.series_resistance + wiring_resistance.max(0.0),
        voc_linear: (spec.voc_ref + spec.mu_voc * d_t).max(0.0),
        current_guess: (spec.isc_ref * g_ratio).max(0.0),
    }
}

/// Exponential blend between the zero-irradiance and high-irradiance shunt
/// resistances, anchored to pass through the reference value.
pub(crate) fn shunt_resistance(spec: &ModuleSpec, irradiance: f64) -> f64 {
    let shape = if spec.shunt_resistance_exp == 0.0 {
        SHUNT_EXP_FLOOR
    } else {
        spec.shunt_resistance_exp
    };
    let e = (-shape).exp();
    let base = ((spec.shunt_resistance_ref - spec.shunt_resistance_zero * e) / (1.0 - e)).max(0.0);
    base + (spec.shunt_resistance_zero - base) * (-shape * irradiance / spec.irradiance_ref).exp()
}

impl ModuleSpec {
    /// Checks the datasheet before any calibration work.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidSpec`] naming the first offending field.
    pub fn validate(&self) -> SimResult<()> {
        let positive = [
            ("module.isc_ref", self.isc_ref),
            ("module.voc_ref", self.voc_ref),
            ("module.imp_ref", self.imp_ref),
            ("module.vmp_ref", self.vmp_ref),
            ("module.shunt_resistance_ref", self.shunt_resistance_ref),
            ("module.shunt_resistance_zero", self.shunt_resistance_zero),
            ("module.irradiance_ref", self.irradiance_ref),
            ("module.band_gap_ev", self.band_gap_ev),
            ("module.area_m2", self.area_m2),
        ];
        for (field, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(SimError::invalid(field, format!("must be > 0, got {value}")));
            }
        }
        if self.cells_in_series == 0 {
            return Err(SimError::invalid("module.cells_in_series", "must be > 0"));
        }
        if self.series_resistance < 0.0 {
            return Err(SimError::invalid("module.series_resistance", "must be >= 0"));
        }
        if self.imp_ref >= self.isc_ref {
            return Err(SimError::invalid("module.imp_ref", "must be < module.isc_ref"));
        }
        if self.vmp_ref >= self.voc_ref {
            return Err(SimError::invalid("module.vmp_ref", "must be < module.voc_ref"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> DiodeParams {
        DiodeParams {
            gamma_ref: 0.8195,
            mu_gamma: 0.0015,
            io_ref: 1.096e-9,
            iph_ref: 9.4056,
        }
    }

    #[test]
    fn shunt_resistance_passes_through_reference_and_zero() {
        let spec = ModuleSpec::default();
        assert!((shunt_resistance(&spec, 1000.0) - 300.0).abs() < 1e-9);
        assert!((shunt_resistance(&spec, 0.0) - 1200.0).abs() < 1e-9);
        assert!(shunt_resistance(&spec, 200.0) > shunt_resistance(&spec, 800.0));
    }

    #[test]
    fn zero_shunt_exponent_is_floored() {
        let spec = ModuleSpec {
            shunt_resistance_exp: 0.0,
            ..ModuleSpec::default()
        };
        let rsh = shunt_resistance(&spec, 500.0);
        assert!(rsh.is_finite());
        assert!(rsh > 0.0);
    }

    #[test]
    fn state_at_reference_matches_params() {
        let module = PvModule::from_params(ModuleSpec::default(), params()).unwrap();
        let state = module.diode_state(1000.0, 25.0, 0.0).ok().expect("state should derive");
        assert_eq!(state.gamma, 0.8195);
        assert!((state.io - 1.096e-9).abs() < 1e-18);
        assert!((state.iph - 9.4056).abs() < 1e-12);
        assert!((state.rsh - 300.0).abs() < 1e-9);
        assert_eq!(state.voc_linear, 46.2);
    }

    #[test]
    fn hotter_cells_raise_saturation_current() {
        let module = PvModule::from_params(ModuleSpec::default(), params()).unwrap();
        let cool = module.diode_state(1000.0, 25.0, 0.0).ok().expect("state");
        let hot = module.diode_state(1000.0, 60.0, 0.0).ok().expect("state");
        assert!(hot.io > 100.0 * cool.io);
        assert!(hot.iph > cool.iph);
        assert!(hot.voc_linear < cool.voc_linear);
    }

    #[test]
    fn photocurrent_scales_with_irradiance_and_clamps() {
        let module = PvModule::from_params(ModuleSpec::default(), params()).unwrap();
        let half = module.diode_state(500.0, 25.0, 0.0).ok().expect("state");
        assert!((half.iph - 0.5 * 9.4056).abs() < 1e-9);
        let negative = module.diode_state(-20.0, 25.0, 0.0).ok().expect("state");
        assert_eq!(negative.iph, 0.0);
    }

    #[test]
    fn wiring_resistance_adds_to_series_resistance() {
        let module = PvModule::from_params(ModuleSpec::default(), params()).unwrap();
        let state = module.diode_state(1000.0, 25.0, 0.05).ok().expect("state");
        assert!((state.rs - 0.23).abs() < 1e-12);
    }

    #[test]
    fn diverging_ideality_factor_fails_the_step() {
        let drifting = DiodeParams {
            mu_gamma: 0.05,
            ..params()
        };
        let module = PvModule::from_params(ModuleSpec::default(), drifting).unwrap();
        match module.diode_state(1000.0, 75.0, 0.0) {
            Convergence::Failed(reason) => assert_eq!(reason.solver, Solver::DiodeState),
            Convergence::Converged(_) => panic!("expected divergence"),
        }
    }

    #[test]
    fn validation_rejects_inverted_datasheet() {
        let spec = ModuleSpec {
            vmp_ref: 50.0,
            ..ModuleSpec::default()
        };
        let err = PvModule::from_params(spec, params());
        assert!(matches!(err, Err(SimError::InvalidSpec { .. })));
    }
}
