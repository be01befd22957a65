//! Weather record to array-plane operating conditions.

use crate::weather::WeatherRecord;

use super::types::{ArraySpec, IamModel, OperatingConditions, ThermalSpec};

/// Equivalent incidence angle for isotropic diffuse and ground-reflected light.
pub const DIFFUSE_INCIDENCE_DEG: f64 = 60.0;

impl IamModel {
    /// Transmission factor at `angle_deg` from the module normal, in `[0, 1]`.
    pub fn factor(&self, angle_deg: f64) -> f64 {
        let angle = angle_deg.abs();
        match self {
            IamModel::Ashrae { b0 } => {
                if angle >= 90.0 {
                    return 0.0;
                }
                let cos = angle.to_radians().cos();
                (1.0 - b0 * (1.0 / cos - 1.0)).clamp(0.0, 1.0)
            }
            IamModel::Tabulated { points } => {
                let (Some(first), Some(last)) = (points.first(), points.last()) else {
                    return 1.0;
                };
                if angle <= first.angle_deg {
                    return first.factor.clamp(0.0, 1.0);
                }
                if angle >= last.angle_deg {
                    return last.factor.clamp(0.0, 1.0);
                }
                points
                    .windows(2)
                    .find(|w| angle <= w[1].angle_deg)
                    .map_or(last.factor, |w| {
                        let span = w[1].angle_deg - w[0].angle_deg;
                        if span <= 0.0 {
                            return w[1].factor;
                        }
                        let t = (angle - w[0].angle_deg) / span;
                        w[0].factor + t * (w[1].factor - w[0].factor)
                    })
                    .clamp(0.0, 1.0)
            }
        }
    }
}

impl ThermalSpec {
    /// Steady-state cell temperature from the heat balance
    /// `U (Tc - Ta) = α G (1 - η)`.
    pub fn cell_temperature(
        &self,
        ambient_c: f64,
        irradiance: f64,
        wind_speed_ms: f64,
        efficiency: f64,
    ) -> f64 {
        let u = self.uc + self.uv * wind_speed_ms.max(0.0);
        if u <= 0.0 {
            return ambient_c;
        }
        ambient_c + self.absorptance * irradiance.max(0.0) * (1.0 - efficiency) / u
    }
}

impl OperatingConditions {
    /// Applies incidence losses and, when no module temperature was
    /// measured, the thermal model.
    pub fn from_weather(
        record: &WeatherRecord,
        array: &ArraySpec,
        module_efficiency: f64,
    ) -> Self {
        let beam = record.beam.max(0.0);
        let diffuse = record.diffuse.max(0.0);
        let ground = record.ground.max(0.0);
        let global = beam + diffuse + ground;
        let effective = beam * array.iam.factor(record.incidence_angle_deg)
            + (diffuse + ground) * array.iam.factor(DIFFUSE_INCIDENCE_DEG);

        let module_temp_c = record.module_temp_c.unwrap_or_else(|| {
            array.thermal.cell_temperature(
                record.ambient_temp_c,
                global,
                record.wind_speed_ms,
                module_efficiency,
            )
        });

        Self {
            global_irradiance: global,
            effective_irradiance: effective,
            module_temp_c,
            ambient_temp_c: record.ambient_temp_c,
            wind_speed_ms: record.wind_speed_ms.max(0.0),
            month: record.month.clamp(1, 12),
        }
    }
}
