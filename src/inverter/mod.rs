//! Grid inverter: efficiency curves, voltage limits and AC output.

pub mod efficiency;
pub mod types;

pub use efficiency::InverterModel;
pub use types::{CurvePoint, EfficiencyCurves, InverterOutput, InverterSpec, VoltageCurve};
