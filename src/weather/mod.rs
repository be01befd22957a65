//! Per-step weather input: CSV series or a synthetic day generator.

pub mod synthetic;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::SimResult;

pub use synthetic::{SyntheticParams, SyntheticWeather};

/// Plane-of-array weather for one time step.
///
/// Irradiance components (W/m²) are already corrected for shading.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherRecord {
    /// Calendar month, 1–12.
    pub month: u32,
    pub beam: f64,
    pub diffuse: f64,
    pub ground: f64,
    /// Angle between the beam and the module normal.
    pub incidence_angle_deg: f64,
    pub ambient_temp_c: f64,
    pub wind_speed_ms: f64,
    /// Measured back-of-module temperature; derived from the thermal model when absent.
    #[serde(default)]
    pub module_temp_c: Option<f64>,
}

impl WeatherRecord {
    pub fn global(&self) -> f64 {
        self.beam + self.diffuse + self.ground
    }

    /// Clamps physically meaningless values at their boundary.
    fn sanitized(mut self) -> Self {
        self.beam = self.beam.max(0.0);
        self.diffuse = self.diffuse.max(0.0);
        self.ground = self.ground.max(0.0);
        self.wind_speed_ms = self.wind_speed_ms.max(0.0);
        self.month = self.month.clamp(1, 12);
        self
    }
}

/// Reads a weather series from a CSV file with a header row.
///
/// # Errors
///
/// Returns [`crate::error::SimError::Io`] when the file cannot be opened and
/// [`crate::error::SimError::Weather`] for malformed rows.
pub fn read_csv(path: &Path) -> SimResult<Vec<WeatherRecord>> {
    let file = File::open(path)?;
    from_reader(file)
}

/// Reads a weather series from any CSV source.
///
/// # Errors
///
/// Returns [`crate::error::SimError::Weather`] for malformed rows.
pub fn from_reader(reader: impl Read) -> SimResult<Vec<WeatherRecord>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for row in rdr.deserialize::<WeatherRecord>() {
        records.push(row?.sanitized());
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    const SAMPLE: &str = "\
month,beam,diffuse,ground,incidence_angle_deg,ambient_temp_c,wind_speed_ms,module_temp_c
6,650.0,110.0,12.0,25.0,24.0,1.5,
6,-3.0,0.0,0.0,85.0,15.0,0.0,14.0
";

    #[test]
    fn parses_rows_with_optional_module_temperature() {
        let records = from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].module_temp_c, None);
        assert_eq!(records[1].module_temp_c, Some(14.0));
        assert!((records[0].global() - 772.0).abs() < 1e-9);
    }

    #[test]
    fn negative_irradiance_is_clamped() {
        let records = from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records[1].beam, 0.0);
    }

    #[test]
    fn module_temperature_column_may_be_omitted() {
        let csv = "month,beam,diffuse,ground,incidence_angle_deg,ambient_temp_c,wind_speed_ms\n\
                   3,400,80,5,40,10,3\n";
        let records = from_reader(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].module_temp_c, None);
    }

    #[test]
    fn malformed_row_is_a_weather_error() {
        let csv = "month,beam,diffuse,ground,incidence_angle_deg,ambient_temp_c,wind_speed_ms\n\
                   3,bright,80,5,40,10,3\n";
        assert!(matches!(from_reader(csv.as_bytes()), Err(SimError::Weather(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let out = read_csv(Path::new("/nonexistent/weather.csv"));
        assert!(matches!(out, Err(SimError::Io(_))));
    }
}
