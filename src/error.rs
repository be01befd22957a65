//! Fatal error types.
//!
//! Only failures that make a run impossible live here. Iterative solvers
//! that may fail per time step report through [`crate::solver::Convergence`]
//! instead and are resolved where they occur.

use std::io;

use thiserror::Error;

/// Result type for operations that can abort a simulation run.
pub type SimResult<T> = Result<T, SimError>;

/// Errors that abort the run for the affected array or configuration.
#[derive(Error, Debug)]
pub enum SimError {
    /// Module calibration could not produce a usable parameter set.
    #[error("module calibration failed: {0}")]
    Calibration(String),

    /// Bisection bounds do not enclose a sign change.
    #[error(
        "{what}: bounds [{low:.6}, {high:.6}] do not bracket a root \
         (residuals {f_low:.6e} and {f_high:.6e})"
    )]
    BracketNotSigned {
        what: &'static str,
        low: f64,
        high: f64,
        f_low: f64,
        f_high: f64,
    },

    /// A physical parameter is outside its meaningful range.
    #[error("invalid parameter {field}: {message}")]
    InvalidSpec { field: String, message: String },

    /// Weather series could not be read or decoded.
    #[error("weather input: {0}")]
    Weather(#[from] csv::Error),

    /// File system failure.
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
}

impl SimError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        SimError::InvalidSpec {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_message_names_both_bounds() {
        let err = SimError::BracketNotSigned {
            what: "gamma temperature coefficient",
            low: 0.5,
            high: 1.5,
            f_low: 1.0,
            f_high: 2.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("gamma temperature coefficient"));
        assert!(msg.contains("0.500000"));
        assert!(msg.contains("1.500000"));
    }

    #[test]
    fn invalid_spec_carries_field() {
        let err = SimError::invalid("module.area_m2", "must be > 0");
        assert_eq!(err.to_string(), "invalid parameter module.area_m2: must be > 0");
    }
}
