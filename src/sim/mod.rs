/// Per-step inverter state machine and clipping search.
pub mod controller;
pub mod engine;
pub mod kpi;
pub mod types;
