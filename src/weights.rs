//! Adaptive operator weights: roulette wheel selection, scoring and segment updates.

use crate::insertion::InsertionOperator;
use crate::removal::RemovalOperator;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// A destroy or repair operator with a fixed selection order.
pub trait Operator: Copy + PartialEq + fmt::Debug + 'static {
    /// Every operator of this kind, in roulette order.
    const ALL: &'static [Self];

    fn name(&self) -> &'static str;
}

/// Result of one iteration, as classified by the acceptance policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Reject,
    /// Accepted by the annealing test
    Accept,
    /// Improved the current solution
    Better,
    /// Improved the best known feasible solution
    Best,
}

impl Outcome {
    /// Score credited to the operators that produced this outcome.
    pub fn score(self) -> f64 {
        match self {
            Outcome::Reject => 0.0,
            Outcome::Accept => 5.0,
            Outcome::Better => 15.0,
            Outcome::Best => 30.0,
        }
    }
}

/// Weights, segment scores and weight history of one operator family.
#[derive(Debug, Clone)]
pub struct WeightTable<O: Operator> {
    weights: Vec<f64>,
    scores: Vec<f64>,
    usage: Vec<u32>,
    history: Vec<Vec<f64>>,
    selected: usize,
    _operators: PhantomData<O>,
}

impl<O: Operator> Default for WeightTable<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Operator> WeightTable<O> {
    /// Start every operator at weight 1.
    pub fn new() -> Self {
        let count = O::ALL.len();
        WeightTable {
            weights: vec![1.0; count],
            scores: vec![0.0; count],
            usage: vec![0; count],
            history: vec![vec![1.0]; count],
            selected: 0,
            _operators: PhantomData,
        }
    }

    /// Roulette wheel selection over the cumulative weights.
    pub fn select<R: Rng>(&mut self, rng: &mut R) -> O {
        let total: f64 = self.weights.iter().sum();

        self.selected = if total > 0.0 && total.is_finite() {
            let draw = rng.gen_range(0.0..total);
            let mut cumulative = 0.0;
            self.weights
                .iter()
                .position(|&weight| {
                    cumulative += weight;
                    cumulative >= draw
                })
                .unwrap_or(self.weights.len() - 1)
        } else {
            rng.gen_range(0..self.weights.len())
        };

        O::ALL[self.selected]
    }

    /// The operator chosen by the last selection.
    pub fn selected(&self) -> O {
        O::ALL[self.selected]
    }

    /// Credit the selected operator.
    pub fn record(&mut self, score: f64) {
        self.scores[self.selected] += score;
        self.usage[self.selected] += 1;
    }

    /// Smooth the weights with this segment's average scores and start a new segment.
    pub fn update(&mut self, reaction_factor: f64) {
        for i in 0..self.weights.len() {
            if self.usage[i] > 0 {
                let average = self.scores[i] / self.usage[i] as f64;
                self.weights[i] =
                    self.weights[i] * (1.0 - reaction_factor) + reaction_factor * average;
            }
            self.history[i].push(self.weights[i]);
            self.scores[i] = 0.0;
            self.usage[i] = 0;
        }
    }

    fn index(operator: O) -> usize {
        O::ALL
            .iter()
            .position(|&o| o == operator)
            .unwrap_or_default()
    }

    pub fn weight(&self, operator: O) -> f64 {
        self.weights[Self::index(operator)]
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Accumulated score in the current segment.
    pub fn score(&self, operator: O) -> f64 {
        self.scores[Self::index(operator)]
    }

    /// Times used in the current segment.
    pub fn usage(&self, operator: O) -> u32 {
        self.usage[Self::index(operator)]
    }

    /// Weight at the start and after every segment.
    pub fn history(&self, operator: O) -> &[f64] {
        &self.history[Self::index(operator)]
    }

    /// Set a weight directly.
    pub fn set_weight(&mut self, operator: O, weight: f64) {
        self.weights[Self::index(operator)] = weight;
    }
}

/// Manages the removal and insertion weight tables.
#[derive(Debug, Clone)]
pub struct OperatorWeights {
    pub reaction_factor: f64,
    pub removal: WeightTable<RemovalOperator>,
    pub insertion: WeightTable<InsertionOperator>,
}

impl OperatorWeights {
    pub fn new(reaction_factor: f64) -> Self {
        OperatorWeights {
            reaction_factor,
            removal: WeightTable::new(),
            insertion: WeightTable::new(),
        }
    }

    pub fn select_removal<R: Rng>(&mut self, rng: &mut R) -> RemovalOperator {
        self.removal.select(rng)
    }

    pub fn select_insertion<R: Rng>(&mut self, rng: &mut R) -> InsertionOperator {
        self.insertion.select(rng)
    }

    /// Credit both selected operators with the outcome of the iteration.
    pub fn record(&mut self, outcome: Outcome) {
        let score = outcome.score();
        self.removal.record(score);
        self.insertion.record(score);
    }

    /// End the current segment.
    pub fn update_weights(&mut self) {
        self.removal.update(self.reaction_factor);
        self.insertion.update(self.reaction_factor);
    }
}
