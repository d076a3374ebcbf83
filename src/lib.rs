//! # ALNS-EVSP
//!
//! A Rust implementation of Adaptive Large Neighborhood Search for the
//! Electric Vehicle Scheduling Problem (EVSP) of a bus operator.
//!
//! Starting from a greedy schedule, every iteration removes a handful of trips
//! with one of several removal operators and reinserts them with an insertion
//! operator that also places charging events. Operators are chosen by roulette
//! wheel over adaptive weights, and candidates are accepted by simulated annealing.
//! Battery and charging-station violations are allowed during the search at a
//! penalty; only feasible schedules can become the best solution.

pub mod acceptance;
pub mod config;
pub mod construction;
pub mod error;
pub mod insertion;
pub mod problem;
pub mod removal;
pub mod solution;
pub mod utils;
pub mod weights;

use crate::acceptance::SimulatedAnnealing;
use crate::config::Config;
use crate::error::AlnsError;
use crate::insertion::{Insertion, InsertionParams};
use crate::problem::Problem;
use crate::solution::Schedule;
use crate::utils::SearchStatistics;
use crate::weights::{Operator, OperatorWeights, Outcome};

use log::{debug, info, trace};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    IterationCap,
    /// The best cost did not change over the stagnation window.
    Stagnation,
}

/// The main algorithm structure driving the destroy and repair loop.
pub struct AlnsAlgorithm {
    pub problem: Problem,
    pub config: Config,
    pub weights: OperatorWeights,
    pub annealing: SimulatedAnnealing,
    pub current_schedule: Schedule,
    pub current_cost: f64,
    pub best_schedule: Schedule,
    pub best_cost: f64,
    /// Current cost after every iteration
    pub current_cost_history: Vec<f64>,
    /// Best cost after every iteration
    pub best_cost_history: Vec<f64>,
    pub run_time: Duration,
    pub iterations: usize,
    pub termination: Option<Termination>,
    pub start_time: Instant,
    rng: ChaCha8Rng,
}

impl AlnsAlgorithm {
    /// Create a new ALNS instance for the given problem and configuration.
    pub fn new(problem: Problem, config: Config) -> Result<Self, AlnsError> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(AlnsAlgorithm {
            problem,
            weights: OperatorWeights::new(config.reaction_factor),
            annealing: SimulatedAnnealing::new(config.initial_temperature, config.cooling_rate),
            config,
            current_schedule: Schedule::new(),
            current_cost: 0.0,
            best_schedule: Schedule::new(),
            best_cost: 0.0,
            current_cost_history: Vec::new(),
            best_cost_history: Vec::new(),
            run_time: Duration::from_secs(0),
            iterations: 0,
            termination: None,
            start_time: Instant::now(),
            rng,
        })
    }

    fn insertion_params(&self) -> InsertionParams {
        InsertionParams {
            energy_penalty: self.config.energy_penalty,
            capacity_penalty: self.config.capacity_penalty,
            charge_probability: self.config.effective_charge_probability(),
        }
    }

    /// Build the initial schedule and reset the search state.
    pub fn initialize(&mut self) {
        let schedule = if self.config.night_charge_only {
            construction::night_charge_schedule(&self.problem)
        } else {
            construction::initial_schedule(&self.problem)
        };

        let initial = insertion::evaluate(&self.problem, schedule, self.insertion_params());
        info!(
            "Initial schedule: {} duties, cost {:.2}, feasible {}",
            initial.schedule.len(),
            initial.cost,
            initial.feasible
        );

        self.best_schedule = initial.schedule.clone();
        self.best_cost = initial.cost;
        self.current_schedule = initial.schedule;
        self.current_cost = initial.cost;

        self.weights = OperatorWeights::new(self.config.reaction_factor);
        self.annealing =
            SimulatedAnnealing::new(self.config.initial_temperature, self.config.cooling_rate);
        self.current_cost_history.clear();
        self.best_cost_history.clear();
        self.iterations = 0;
        self.termination = None;
    }

    /// Run the algorithm until the iteration cap or stagnation stops it.
    pub fn run(&mut self) -> &Schedule {
        info!(
            "ALNS starts on {}: {} trips, {} vehicle types",
            self.problem.name,
            self.problem.trip_count(),
            self.problem.vehicle_types().len()
        );
        self.start_time = Instant::now();

        self.initialize();

        for iteration in 0..self.config.max_iterations {
            let outcome = self.iterate();
            self.iterations += 1;

            trace!(
                "Iteration {}: {:?}, current {:.2}, best {:.2}, T {:.4}",
                iteration,
                outcome,
                self.current_cost,
                self.best_cost,
                self.annealing.temperature
            );

            if (iteration + 1) % self.config.segment_length == 0 {
                self.weights.update_weights();
                debug!(
                    "Segment {} weights: removal {:?}, insertion {:?}",
                    (iteration + 1) / self.config.segment_length,
                    self.weights.removal.weights(),
                    self.weights.insertion.weights()
                );

                if self.is_stagnating() {
                    self.termination = Some(Termination::Stagnation);
                    break;
                }
            }
        }

        let termination = *self.termination.get_or_insert(Termination::IterationCap);
        self.best_schedule.resync_charging();
        self.run_time = self.start_time.elapsed();

        info!(
            "ALNS finished after {} iterations ({:?}): best cost {:.2} with {} duties",
            self.iterations,
            termination,
            self.best_cost,
            self.best_schedule.len()
        );

        &self.best_schedule
    }

    /// Perform one destroy, repair and acceptance step.
    fn iterate(&mut self) -> Outcome {
        let removal = self.weights.select_removal(&mut self.rng);
        let insertion = self.weights.select_insertion(&mut self.rng);

        let n = self
            .rng
            .gen_range(self.config.min_removal..=self.config.max_removal);
        let (bank, reduced) =
            removal.apply(&self.problem, &self.current_schedule, n, &mut self.rng);
        let params = self.insertion_params();
        let Insertion {
            cost,
            schedule,
            feasible,
        } = insertion.apply(&self.problem, &bank, reduced, params, &mut self.rng);

        let outcome = self.annealing.classify(
            cost,
            feasible,
            self.current_cost,
            self.best_cost,
            &mut self.rng,
        );

        match outcome {
            Outcome::Best => {
                debug!(
                    "New best {:.2} (was {:.2}) by {} + {}",
                    cost,
                    self.best_cost,
                    removal.name(),
                    insertion.name()
                );
                self.best_schedule = schedule.clone();
                self.best_cost = cost;
                self.current_schedule = schedule;
                self.current_cost = cost;
            }
            Outcome::Better | Outcome::Accept => {
                self.current_schedule = schedule;
                self.current_cost = cost;
            }
            Outcome::Reject => {}
        }

        self.current_cost_history.push(self.current_cost);
        self.best_cost_history.push(self.best_cost);
        self.weights.record(outcome);
        self.annealing.cool();

        outcome
    }

    /// Whether the best cost is unchanged over the trailing stagnation window.
    fn is_stagnating(&self) -> bool {
        let window = self.config.stagnation_length;
        let history = &self.best_cost_history;

        self.config.terminate_on_stagnation
            && history.len() >= window
            && history[history.len() - 1] == history[history.len() - window]
    }

    /// Summarize the finished run.
    pub fn statistics(&self) -> SearchStatistics {
        SearchStatistics {
            iterations: self.iterations,
            runtime: self.run_time,
            termination: self.termination,
            best_cost: self.best_cost,
            breakdown: self.best_schedule.cost_breakdown(&self.problem),
            best_is_feasible: self.best_schedule.is_energy_feasible(&self.problem)
                && self.best_schedule.is_capacity_feasible(&self.problem),
            duties: self.best_schedule.len(),
            charging_events: self.best_schedule.charging_count(),
            final_temperature: self.annealing.temperature,
        }
    }
}
