//! Photovoltaic module and array models.

pub mod array;
pub mod calibration;
pub mod conditions;
pub mod diode;
pub mod module;
pub mod types;

pub use array::PvArray;
pub use module::PvModule;
pub use types::{
    ArrayLosses, ArrayOperatingPoint, ArraySpec, DiodeParams, DiodeState, IamModel, IamPoint,
    ModulePoint, ModuleSpec, OperatingConditions, ThermalSpec, TrackingMode,
};
