//! Efficiency-curve interpolation and DC to AC conversion.

use crate::error::{SimError, SimResult};

use super::types::{CurvePoint, EfficiencyCurves, InverterOutput, InverterSpec, VoltageCurve};

/// Validated inverter with its conversion characteristic.
#[derive(Debug, Clone, PartialEq)]
pub struct InverterModel {
    spec: InverterSpec,
}

impl InverterModel {
    /// # Errors
    ///
    /// Returns [`SimError::InvalidSpec`] for inconsistent voltage limits or
    /// unusable efficiency curves.
    pub fn new(spec: InverterSpec) -> SimResult<Self> {
        spec.validate()?;
        Ok(Self { spec })
    }

    pub fn spec(&self) -> &InverterSpec {
        &self.spec
    }

    fn units(&self) -> f64 {
        f64::from(self.spec.units)
    }

    /// Rated AC output of all units (W).
    pub fn nominal_ac_power_w(&self) -> f64 {
        self.spec.nominal_ac_power_w * self.units()
    }

    /// Start-up DC power of all units (W).
    pub fn threshold_power_w(&self) -> f64 {
        self.spec.threshold_power_w * self.units()
    }

    /// Voltage seen by the inverter input for a given array voltage.
    pub fn input_voltage(&self, array_voltage: f64) -> f64 {
        if self.spec.bipolar_input {
            array_voltage / 2.0
        } else {
            array_voltage
        }
    }

    /// Array voltage that produces `input_voltage` at the inverter input.
    pub fn array_voltage(&self, input_voltage: f64) -> f64 {
        if self.spec.bipolar_input {
            input_voltage * 2.0
        } else {
            input_voltage
        }
    }

    /// Conversion efficiency for a total DC power at an inverter input voltage.
    pub fn efficiency(&self, dc_power_w: f64, input_voltage: f64) -> f64 {
        let per_unit = dc_power_w / self.units();
        let threshold = self.spec.threshold_power_w;
        if per_unit <= threshold {
            return 0.0;
        }
        let eta = match &self.spec.efficiency {
            EfficiencyCurves::Single { points } => interpolate(points, threshold, per_unit),
            EfficiencyCurves::ThreeVoltage { curves } => {
                across_voltage(curves, threshold, per_unit, input_voltage)
            }
        };
        eta.clamp(0.0, 1.0)
    }

    /// Converts the array output at `array_voltage`.
    pub fn convert(&self, dc_power_w: f64, array_voltage: f64) -> InverterOutput {
        let dc_power_w = dc_power_w.max(0.0);
        let efficiency = self.efficiency(dc_power_w, self.input_voltage(array_voltage));
        let ac_power_w = efficiency * dc_power_w;

        let line = self.spec.output_voltage * f64::from(self.spec.phases).sqrt();
        let ac_current_a = if line > 0.0 { ac_power_w / line } else { 0.0 };

        InverterOutput {
            dc_power_w,
            efficiency,
            ac_power_w,
            clipping: ac_power_w > 0.0 && ac_power_w >= self.nominal_ac_power_w(),
            ac_current_a,
            ac_wiring_loss_w: ac_current_a * ac_current_a * self.spec.ac_wiring_resistance,
        }
    }

    /// Caps the AC side of `output` at the rated power of all units.
    pub fn limit_to_nominal(&self, output: InverterOutput) -> InverterOutput {
        let nominal = self.nominal_ac_power_w();
        if output.ac_power_w <= nominal {
            return output;
        }
        let scale = nominal / output.ac_power_w;
        let ac_current_a = output.ac_current_a * scale;
        InverterOutput {
            ac_power_w: nominal,
            ac_current_a,
            ac_wiring_loss_w: ac_current_a * ac_current_a * self.spec.ac_wiring_resistance,
            ..output
        }
    }
}

/// Linear interpolation of one curve, with zero efficiency pinned at the
/// threshold and the last efficiency held beyond the last point.
fn interpolate(points: &[CurvePoint], threshold: f64, power: f64) -> f64 {
    let mut prev = CurvePoint {
        power_w: threshold,
        efficiency: 0.0,
    };
    for p in points.iter().filter(|p| p.power_w > threshold) {
        if power <= p.power_w {
            let span = p.power_w - prev.power_w;
            if span <= 0.0 {
                return p.efficiency;
            }
            let t = (power - prev.power_w) / span;
            return prev.efficiency + t * (p.efficiency - prev.efficiency);
        }
        prev = *p;
    }
    prev.efficiency
}

/// Three-point Lagrange interpolation across the curve voltages.
fn across_voltage(curves: &[VoltageCurve], threshold: f64, power: f64, voltage: f64) -> f64 {
    let [low, mid, high] = curves else {
        return curves
            .first()
            .map_or(0.0, |c| interpolate(&c.points, threshold, power));
    };
    let (v0, v1, v2) = (low.voltage, mid.voltage, high.voltage);
    let v = voltage.clamp(v0.min(v2), v0.max(v2));
    let e0 = interpolate(&low.points, threshold, power);
    let e1 = interpolate(&mid.points, threshold, power);
    let e2 = interpolate(&high.points, threshold, power);

    e0 * (v - v1) * (v - v2) / ((v0 - v1) * (v0 - v2))
        + e1 * (v - v0) * (v - v2) / ((v1 - v0) * (v1 - v2))
        + e2 * (v - v0) * (v - v1) / ((v2 - v0) * (v2 - v1))
}

impl InverterSpec {
    /// # Errors
    ///
    /// Returns [`SimError::InvalidSpec`] for inconsistent voltage limits or
    /// unusable efficiency curves.
    pub fn validate(&self) -> SimResult<()> {
        if !(self.nominal_ac_power_w > 0.0) {
            return Err(SimError::invalid("inverter.nominal_ac_power_w", "must be > 0"));
        }
        if self.units == 0 {
            return Err(SimError::invalid("inverter.units", "must be > 0"));
        }
        if self.threshold_power_w < 0.0 {
            return Err(SimError::invalid("inverter.threshold_power_w", "must be >= 0"));
        }
        if self.mppt_min_voltage >= self.mppt_max_voltage {
            return Err(SimError::invalid(
                "inverter.mppt_min_voltage",
                "must be below inverter.mppt_max_voltage",
            ));
        }
        if self.min_voltage > self.mppt_min_voltage || self.mppt_max_voltage > self.max_voltage {
            return Err(SimError::invalid(
                "inverter.mppt_window",
                "must lie within [min_voltage, max_voltage]",
            ));
        }
        if !matches!(self.phases, 1 | 3) {
            return Err(SimError::invalid("inverter.phases", "must be 1 or 3"));
        }
        match &self.efficiency {
            EfficiencyCurves::Single { points } => validate_curve("inverter.efficiency", points),
            EfficiencyCurves::ThreeVoltage { curves } => {
                if curves.len() != 3 {
                    return Err(SimError::invalid(
                        "inverter.efficiency.curves",
                        format!("expected 3 voltage curves, got {}", curves.len()),
                    ));
                }
                if !curves.windows(2).all(|w| w[0].voltage < w[1].voltage) {
                    return Err(SimError::invalid(
                        "inverter.efficiency.curves",
                        "curve voltages must increase",
                    ));
                }
                curves
                    .iter()
                    .try_for_each(|c| validate_curve("inverter.efficiency.curves", &c.points))
            }
        }
    }
}

fn validate_curve(field: &str, points: &[CurvePoint]) -> SimResult<()> {
    if points.is_empty() {
        return Err(SimError::invalid(field, "efficiency curve is empty"));
    }
    if !points.windows(2).all(|w| w[0].power_w < w[1].power_w) {
        return Err(SimError::invalid(field, "curve powers must increase"));
    }
    if let Some(p) = points.iter().find(|p| !(0.0..=1.0).contains(&p.efficiency)) {
        return Err(SimError::invalid(
            field,
            format!("efficiency {} outside [0, 1]", p.efficiency),
        ));
    }
    Ok(())
}
