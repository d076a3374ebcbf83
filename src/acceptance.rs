//! Simulated annealing acceptance and outcome classification.

use crate::weights::Outcome;
use rand::Rng;

/// Largest exponent for which `exp` stays finite in `f64`.
pub const EXP_GUARD: f64 = 709.0;

/// Geometric cooling schedule with a Metropolis-style acceptance test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedAnnealing {
    pub temperature: f64,
    pub cooling_rate: f64,
}

impl SimulatedAnnealing {
    pub fn new(initial_temperature: f64, cooling_rate: f64) -> Self {
        SimulatedAnnealing {
            temperature: initial_temperature,
            cooling_rate,
        }
    }

    /// Multiply the temperature by the cooling rate.
    pub fn cool(&mut self) {
        self.temperature *= self.cooling_rate;
    }

    /// Annealing test against the best cost: accept when `exp((best - candidate) / T) >= u`.
    ///
    /// Exponents at or above [`EXP_GUARD`] are rejected.
    pub fn accepts<R: Rng>(&self, candidate_cost: f64, best_cost: f64, rng: &mut R) -> bool {
        let exponent = (best_cost - candidate_cost) / self.temperature;
        if !(exponent < EXP_GUARD) {
            return false;
        }
        exponent.exp() >= rng.gen::<f64>()
    }

    /// Classify a repaired candidate against the current and best costs.
    ///
    /// Only feasible candidates can become the new best. A candidate costing
    /// exactly as much as the current solution is rejected without drawing.
    pub fn classify<R: Rng>(
        &self,
        candidate_cost: f64,
        feasible: bool,
        current_cost: f64,
        best_cost: f64,
        rng: &mut R,
    ) -> Outcome {
        if feasible && candidate_cost < best_cost {
            Outcome::Best
        } else if candidate_cost < current_cost {
            Outcome::Better
        } else if candidate_cost == current_cost {
            Outcome::Reject
        } else if self.accepts(candidate_cost, best_cost, rng) {
            Outcome::Accept
        } else {
            Outcome::Reject
        }
    }
}
