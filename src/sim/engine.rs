//! Simulation engine: one controller step per weather record.

use tracing::info;

use crate::pv::OperatingConditions;
use crate::weather::WeatherRecord;

use super::controller::OperatingPointController;
use super::types::{SimConfig, StepResult};

/// Owns the controller and the weather series it is driven by.
///
/// Steps are processed strictly in order because the inverter latch carries
/// over from one step to the next.
pub struct Engine {
    config: SimConfig,
    controller: OperatingPointController,
    weather: Vec<WeatherRecord>,
    module_efficiency: f64,
}

impl Engine {
    /// Creates a new simulation engine.
    ///
    /// # Arguments
    ///
    /// * `config` - Step length and seed
    /// * `controller` - Controller wired to the array and inverter
    /// * `weather` - One record per step; its length sets the run length
    pub fn new(
        config: SimConfig,
        controller: OperatingPointController,
        weather: Vec<WeatherRecord>,
    ) -> Self {
        let module_efficiency = controller.array().module().spec().reference_efficiency();
        Self {
            config,
            controller,
            weather,
            module_efficiency,
        }
    }

    /// Number of steps the engine will run.
    pub fn total_steps(&self) -> usize {
        self.weather.len()
    }

    /// Executes one simulation timestep and returns the result.
    ///
    /// Returns `None` once `t` runs past the weather series.
    pub fn step(&mut self, t: usize) -> Option<StepResult> {
        let record = self.weather.get(t)?;
        let conditions = OperatingConditions::from_weather(
            record,
            self.controller.array().spec(),
            self.module_efficiency,
        );
        let outcome = self.controller.step(&conditions);
        Some(StepResult::from_outcome(
            t,
            t as f64 * self.config.dt_hours,
            &conditions,
            &outcome,
        ))
    }

    /// Executes all timesteps and returns the complete step record vector.
    pub fn run(&mut self) -> Vec<StepResult> {
        let results: Vec<StepResult> = (0..self.total_steps()).filter_map(|t| self.step(t)).collect();
        info!(steps = results.len(), "simulation finished");
        results
    }

    pub fn controller(&self) -> &OperatingPointController {
        &self.controller
    }

    /// Returns a reference to the simulation configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}
