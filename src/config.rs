//! Configuration parameters for the ALNS search.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Configuration settings for the ALNS algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Iteration cap
    pub max_iterations: usize,
    /// Minimum number of trips removed per iteration
    pub min_removal: usize,
    /// Maximum number of trips removed per iteration
    pub max_removal: usize,
    /// Initial annealing temperature
    pub initial_temperature: f64,
    /// Temperature multiplier applied every iteration, in (0, 1)
    pub cooling_rate: f64,
    /// Reaction factor of the weight update, in [0, 1]
    pub reaction_factor: f64,
    /// Penalty added to the cost of energy-infeasible schedules
    pub energy_penalty: f64,
    /// Penalty added to the cost of capacity-infeasible schedules
    pub capacity_penalty: f64,
    /// Probability of trying a charging event after an inserted trip
    pub charge_probability: f64,
    /// Iterations between two weight updates
    pub segment_length: usize,
    /// Stop when the best cost stagnates
    pub terminate_on_stagnation: bool,
    /// Window over which stagnation is measured
    pub stagnation_length: usize,
    /// Only charge overnight: no charging events during operation
    pub night_charge_only: bool,
    /// Seed for the random number generator, entropy when absent
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_iterations: 15000,
            min_removal: 1,
            max_removal: 10,
            initial_temperature: 100.0,
            cooling_rate: 0.9997,
            reaction_factor: 0.5,
            energy_penalty: 700.0,
            capacity_penalty: 700.0,
            charge_probability: 0.9,
            segment_length: 100,
            terminate_on_stagnation: true,
            stagnation_length: 2000,
            night_charge_only: false,
            seed: None,
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Config::default()
    }

    /// Check that the parameters can drive a search.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.min_removal > self.max_removal {
            return Err(ConfigError::RemovalRange {
                min: self.min_removal,
                max: self.max_removal,
            });
        }
        if !(self.initial_temperature.is_finite() && self.initial_temperature > 0.0) {
            return Err(ConfigError::Temperature(self.initial_temperature));
        }
        if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
            return Err(ConfigError::CoolingRate(self.cooling_rate));
        }
        if !(0.0..=1.0).contains(&self.reaction_factor) {
            return Err(ConfigError::ReactionFactor(self.reaction_factor));
        }
        if !(0.0..=1.0).contains(&self.charge_probability) {
            return Err(ConfigError::ChargeProbability(self.charge_probability));
        }
        if self.segment_length == 0 {
            return Err(ConfigError::ZeroSegmentLength);
        }
        if self.stagnation_length == 0 {
            return Err(ConfigError::ZeroStagnationLength);
        }
        Ok(())
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the range the removal count is drawn from.
    pub fn with_removal_range(mut self, min: usize, max: usize) -> Self {
        self.min_removal = min;
        self.max_removal = max;
        self
    }

    /// Set the initial temperature.
    pub fn with_initial_temperature(mut self, temperature: f64) -> Self {
        self.initial_temperature = temperature;
        self
    }

    /// Set the cooling rate.
    pub fn with_cooling_rate(mut self, rate: f64) -> Self {
        self.cooling_rate = rate;
        self
    }

    /// Set the reaction factor.
    pub fn with_reaction_factor(mut self, factor: f64) -> Self {
        self.reaction_factor = factor;
        self
    }

    /// Set the energy and capacity penalties.
    pub fn with_penalties(mut self, energy: f64, capacity: f64) -> Self {
        self.energy_penalty = energy;
        self.capacity_penalty = capacity;
        self
    }

    /// Set the charging insertion probability.
    pub fn with_charge_probability(mut self, probability: f64) -> Self {
        self.charge_probability = probability;
        self
    }

    /// Set the segment length.
    pub fn with_segment_length(mut self, length: usize) -> Self {
        self.segment_length = length;
        self
    }

    /// Enable stagnation termination over the given window.
    pub fn with_stagnation_length(mut self, length: usize) -> Self {
        self.terminate_on_stagnation = true;
        self.stagnation_length = length;
        self
    }

    /// Disable stagnation termination.
    pub fn without_stagnation_check(mut self) -> Self {
        self.terminate_on_stagnation = false;
        self
    }

    pub fn with_night_charge_only(mut self, night_charge_only: bool) -> Self {
        self.night_charge_only = night_charge_only;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Charging probability actually used by the insertion operators.
    pub fn effective_charge_probability(&self) -> f64 {
        if self.night_charge_only {
            0.0
        } else {
            self.charge_probability
        }
    }
}
