//! Grid-connected photovoltaic plant simulator.
//!
//! One-diode module model, array scale-up, inverter efficiency curves and a
//! per-step operating-point controller, driven by a plane-of-array weather
//! series.

pub mod config;
pub mod error;
pub mod inverter;
/// Telemetry export.
pub mod io {
    pub mod export;
}
pub mod logging;
pub mod pv;
/// Controller, engine, and energy accounting.
pub mod sim;
pub mod solver;
pub mod weather;
