//! Module-to-array scale-up.

use crate::error::{SimError, SimResult};
use crate::solver::Convergence;

use super::diode;
use super::module::PvModule;
use super::types::{
    ArrayLosses, ArrayOperatingPoint, ArraySpec, DiodeState, ModulePoint, OperatingConditions,
    TrackingMode,
};

impl ArraySpec {
    /// # Errors
    ///
    /// Returns [`SimError::InvalidSpec`] for empty layouts, loss fractions
    /// outside `[0, 1)` or a negative wiring resistance.
    pub fn validate(&self) -> SimResult<()> {
        if self.modules_in_series == 0 {
            return Err(SimError::invalid("array.modules_in_series", "must be > 0"));
        }
        if self.strings_in_parallel == 0 {
            return Err(SimError::invalid("array.strings_in_parallel", "must be > 0"));
        }
        let fractions = [
            ("array.quality_loss", self.quality_loss),
            ("array.mismatch_loss_mppt", self.mismatch_loss_mppt),
            ("array.mismatch_loss_fixed_voltage", self.mismatch_loss_fixed_voltage),
        ];
        for (field, value) in fractions.into_iter().chain(
            self.soiling_monthly
                .iter()
                .map(|&v| ("array.soiling_monthly", v)),
        ) {
            if !(0.0..1.0).contains(&value) {
                return Err(SimError::invalid(field, format!("must be in [0, 1), got {value}")));
            }
        }
        if !(self.wiring_resistance >= 0.0) {
            return Err(SimError::invalid("array.wiring_resistance", "must be >= 0"));
        }
        Ok(())
    }
}

/// Series strings of identical modules connected in parallel.
#[derive(Debug, Clone, PartialEq)]
pub struct PvArray {
    module: PvModule,
    spec: ArraySpec,
}

impl PvArray {
    /// # Errors
    ///
    /// Returns [`SimError::InvalidSpec`] when [`ArraySpec::validate`] fails.
    pub fn new(module: PvModule, spec: ArraySpec) -> SimResult<Self> {
        spec.validate()?;
        Ok(Self { module, spec })
    }

    pub fn module(&self) -> &PvModule {
        &self.module
    }

    pub fn spec(&self) -> &ArraySpec {
        &self.spec
    }

    pub fn module_count(&self) -> u32 {
        self.spec.modules_in_series * self.spec.strings_in_parallel
    }

    /// Total module area (m²).
    pub fn total_area(&self) -> f64 {
        f64::from(self.module_count()) * self.module.spec().area_m2
    }

    /// Datasheet peak power of the whole array (W).
    pub fn nominal_power_w(&self) -> f64 {
        f64::from(self.module_count()) * self.module.spec().pmpp_ref()
    }

    /// Share of the array wiring resistance seen by one module.
    fn wiring_per_module(&self) -> f64 {
        self.spec.wiring_resistance * f64::from(self.spec.strings_in_parallel)
            / f64::from(self.spec.modules_in_series)
    }

    pub fn diode_state(&self, conditions: &OperatingConditions) -> Convergence<DiodeState> {
        self.module.diode_state(
            conditions.effective_irradiance,
            conditions.module_temp_c,
            self.wiring_per_module(),
        )
    }

    /// Array open-circuit voltage; falls back to the linear estimate.
    pub fn open_circuit_voltage(&self, state: &DiodeState) -> f64 {
        let voc = diode::open_circuit_voltage(state).recover(|_| state.voc_linear);
        voc * f64::from(self.spec.modules_in_series)
    }

    /// Unconstrained maximum-power point of the array.
    pub fn maximum_power_point(
        &self,
        state: &DiodeState,
        conditions: &OperatingConditions,
    ) -> ArrayOperatingPoint {
        let module = diode::maximum_power_point(state).recover(|_| ModulePoint::default());
        self.scale_up(module, conditions, TrackingMode::Mppt)
    }

    /// Array operating point with the inverter input held at `voltage`.
    pub fn operating_point_at(
        &self,
        state: &DiodeState,
        conditions: &OperatingConditions,
        voltage: f64,
        mode: TrackingMode,
    ) -> ArrayOperatingPoint {
        let module_voltage = voltage.max(0.0) / f64::from(self.spec.modules_in_series);
        let module = diode::point_at_voltage(state, module_voltage);
        self.scale_up(module, conditions, mode)
    }

    /// Scales a module point to the array and itemises the DC losses.
    ///
    /// The returned voltage is the one seen at the inverter input. The
    /// derating losses are valued at the source voltage ahead of the wiring,
    /// which carries the delivered current, so `power == voltage * current`.
    pub fn scale_up(
        &self,
        module: ModulePoint,
        conditions: &OperatingConditions,
        mode: TrackingMode,
    ) -> ArrayOperatingPoint {
        let ns = f64::from(self.spec.modules_in_series);
        let np = f64::from(self.spec.strings_in_parallel);

        let voltage = module.voltage * ns;
        let gross = module.current * np;

        let after_quality = gross * (1.0 - self.spec.quality_loss);
        let after_soiling = after_quality * (1.0 - self.spec.soiling_for_month(conditions.month));
        let mismatch = match mode {
            TrackingMode::Mppt => self.spec.mismatch_loss_mppt,
            TrackingMode::FixedVoltage => self.spec.mismatch_loss_fixed_voltage,
        };
        let current = after_soiling * (1.0 - mismatch);

        let source_voltage = voltage + current * self.spec.wiring_resistance;
        let ohmic_w = current * current * self.spec.wiring_resistance;
        let losses = ArrayLosses {
            quality_w: source_voltage * (gross - after_quality),
            soiling_w: source_voltage * (after_quality - after_soiling),
            mismatch_w: source_voltage * (after_soiling - current),
            ohmic_w,
        };
        let power = (voltage * current).max(0.0);

        let incident = conditions.global_irradiance * self.total_area();
        let efficiency = if incident > 0.0 { power / incident } else { 0.0 };

        ArrayOperatingPoint {
            module,
            voltage,
            current,
            power,
            losses,
            efficiency,
        }
    }
}
