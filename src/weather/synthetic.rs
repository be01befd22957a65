//! Synthetic plane-of-array weather with temporally correlated clouds.
//!
//! A half-sine clear-sky profile between sunrise and sunset is scaled by an
//! AR(1) cloud multiplier:
//!
//! ```text
//! m(t) = alpha * m(t-1) + (1 - alpha) * (1 + epsilon(t))
//! ```
//!
//! where `epsilon` is Gaussian noise. The multiplier is clamped to
//! \[0.2, 1.1\] and also sets the beam/diffuse split.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::sim::types::SimConfig;

use super::WeatherRecord;

/// Minimum cloud multiplier (heavy overcast).
const MULTIPLIER_MIN: f64 = 0.2;
/// Maximum cloud multiplier (enhanced irradiance from cloud edges).
const MULTIPLIER_MAX: f64 = 1.1;
/// Beam share of plane-of-array irradiance under a clear sky.
const CLEAR_SKY_BEAM_SHARE: f64 = 0.85;
/// Ground-reflected share of the non-beam irradiance.
const GROUND_SHARE: f64 = 0.04;
/// Incidence angle at sunrise and sunset.
const HORIZON_INCIDENCE_DEG: f64 = 85.0;

/// Shape of the generated days.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticParams {
    /// Clear-sky plane-of-array irradiance at solar noon (W/m²).
    pub peak_irradiance: f64,
    pub sunrise_hr: f64,
    pub sunset_hr: f64,
    /// AR(1) correlation coefficient (0.0 = uncorrelated, 1.0 = fully persistent).
    pub cloud_alpha: f64,
    /// Standard deviation of the AR(1) innovation noise.
    pub cloud_noise_std: f64,
    pub ambient_min_c: f64,
    pub ambient_max_c: f64,
    pub wind_speed_ms: f64,
    pub month: u32,
    /// Beam incidence angle at solar noon.
    pub noon_incidence_deg: f64,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            peak_irradiance: 1000.0,
            sunrise_hr: 6.0,
            sunset_hr: 18.0,
            cloud_alpha: 0.9,
            cloud_noise_std: 0.2,
            ambient_min_c: 12.0,
            ambient_max_c: 26.0,
            wind_speed_ms: 1.0,
            month: 6,
            noon_incidence_deg: 10.0,
        }
    }
}

/// Fraction of peak clear-sky irradiance at `hour`, zero outside daylight.
pub fn daylight_frac(hour: f64, sunrise_hr: f64, sunset_hr: f64) -> f64 {
    if hour <= sunrise_hr || hour >= sunset_hr || sunset_hr <= sunrise_hr {
        return 0.0;
    }
    (PI * (hour - sunrise_hr) / (sunset_hr - sunrise_hr)).sin()
}

/// Zero-mean Gaussian sample via Box–Muller.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std_dev
}

/// Deterministic generator for a fixed seed.
#[derive(Debug, Clone)]
pub struct SyntheticWeather {
    params: SyntheticParams,
    config: SimConfig,
    multiplier: f64,
    rng: StdRng,
}

impl SyntheticWeather {
    pub fn new(params: SyntheticParams, config: &SimConfig) -> Self {
        let params = SyntheticParams {
            peak_irradiance: params.peak_irradiance.max(0.0),
            cloud_alpha: params.cloud_alpha.clamp(0.0, 1.0),
            cloud_noise_std: params.cloud_noise_std.max(0.0),
            wind_speed_ms: params.wind_speed_ms.max(0.0),
            month: params.month.clamp(1, 12),
            ..params
        };
        Self {
            params,
            config: config.clone(),
            multiplier: 1.0,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    pub fn params(&self) -> &SyntheticParams {
        &self.params
    }

    /// Advances the AR(1) cloud multiplier by one step and returns the new value.
    fn advance_multiplier(&mut self) -> f64 {
        let epsilon = gaussian_noise(&mut self.rng, self.params.cloud_noise_std);
        let alpha = self.params.cloud_alpha;
        self.multiplier = (alpha * self.multiplier + (1.0 - alpha) * (1.0 + epsilon))
            .clamp(MULTIPLIER_MIN, MULTIPLIER_MAX);
        self.multiplier
    }

    fn ambient_at(&self, hour: f64) -> f64 {
        let p = &self.params;
        let mid = 0.5 * (p.ambient_min_c + p.ambient_max_c);
        let amplitude = 0.5 * (p.ambient_max_c - p.ambient_min_c);
        // coldest at 03:00, warmest at 15:00
        mid - amplitude * (2.0 * PI * (hour - 3.0) / 24.0).cos()
    }

    /// Weather for timestep `t`. Advances the cloud state, so steps must be
    /// requested in order.
    pub fn record(&mut self, t: usize) -> WeatherRecord {
        let m = self.advance_multiplier();
        let hour = (t % self.config.steps_per_day) as f64 * self.config.dt_hours;
        let p = &self.params;
        let frac = daylight_frac(hour, p.sunrise_hr, p.sunset_hr);

        let global = p.peak_irradiance * frac * m;
        let beam_share = (CLEAR_SKY_BEAM_SHARE * (m - MULTIPLIER_MIN) / (1.0 - MULTIPLIER_MIN))
            .clamp(0.0, CLEAR_SKY_BEAM_SHARE);
        let beam = global * beam_share;
        let ground = (global - beam) * GROUND_SHARE;
        let incidence = p.noon_incidence_deg + (HORIZON_INCIDENCE_DEG - p.noon_incidence_deg) * (1.0 - frac);

        WeatherRecord {
            month: p.month,
            beam,
            diffuse: global - beam - ground,
            ground,
            incidence_angle_deg: incidence,
            ambient_temp_c: self.ambient_at(hour),
            wind_speed_ms: p.wind_speed_ms,
            module_temp_c: None,
        }
    }

    /// Generates the full run.
    pub fn generate(&mut self) -> Vec<WeatherRecord> {
        (0..self.config.total_steps()).map(|t| self.record(t)).collect()
    }
}
