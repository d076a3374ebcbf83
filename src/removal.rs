//! Removal (destroy) operators for the ALNS.

use crate::problem::{Node, Problem, Trip, TripId};
use crate::solution::Schedule;
use crate::weights::Operator;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Duties with at most this many chain entries (two interior nodes) are dissolved.
const MIN_DUTY_LEN: usize = 4;

/// The available removal operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalOperator {
    /// Remove uniformly drawn trips.
    Random,
    /// Remove trips with similar start times and durations.
    TimeRelated,
    /// Remove trips together with their chain neighbors.
    Neighbor,
}

impl Operator for RemovalOperator {
    const ALL: &'static [Self] = &[
        RemovalOperator::Random,
        RemovalOperator::TimeRelated,
        RemovalOperator::Neighbor,
    ];

    fn name(&self) -> &'static str {
        match self {
            RemovalOperator::Random => "random_removal",
            RemovalOperator::TimeRelated => "time_related_removal",
            RemovalOperator::Neighbor => "neighbor_removal",
        }
    }
}

impl RemovalOperator {
    /// Remove about `n` trips from a copy of `schedule`.
    ///
    /// Returns the trip bank and the reduced schedule. Time-related and neighbor
    /// removal may return more than `n` trips, and every operator adds the trips of
    /// duties that became too short to keep.
    pub fn apply<R: Rng>(
        &self,
        problem: &Problem,
        schedule: &Schedule,
        n: usize,
        rng: &mut R,
    ) -> (Vec<TripId>, Schedule) {
        let mut reduced = schedule.clone();
        if n == 0 {
            return (Vec::new(), reduced);
        }

        let mut bank = match self {
            RemovalOperator::Random => random_bank(problem, n, rng),
            RemovalOperator::TimeRelated => time_related_bank(problem, n, rng),
            RemovalOperator::Neighbor => neighbor_bank(problem, schedule, n, rng),
        };

        strip_trips(&mut reduced, &mut bank);
        (bank, reduced)
    }
}

/// Draw `n` distinct trips from the whole timetable.
fn random_bank<R: Rng>(problem: &Problem, n: usize, rng: &mut R) -> Vec<TripId> {
    let trips: Vec<TripId> = problem.trip_ids().collect();
    trips
        .choose_multiple(rng, n.min(trips.len()))
        .copied()
        .collect()
}

fn relatedness(a: &Trip, b: &Trip) -> f64 {
    (a.start - b.start).abs() + (a.duration - b.duration).abs()
}

/// Grow the bank with the trip most related to a random bank member.
fn time_related_bank<R: Rng>(problem: &Problem, n: usize, rng: &mut R) -> Vec<TripId> {
    let first = rng.gen_range(1..=problem.trip_count());
    let mut bank = vec![first];
    let mut in_bank = BTreeSet::from([first]);

    while bank.len() < n {
        let seed = problem.trip(bank[rng.gen_range(0..bank.len())]);

        let closest = problem
            .trips()
            .iter()
            .filter(|trip| !in_bank.contains(&trip.id))
            .min_by(|a, b| relatedness(seed, a).total_cmp(&relatedness(seed, b)));

        match closest {
            Some(trip) => {
                bank.push(trip.id);
                in_bank.insert(trip.id);
            }
            None => break,
        }
    }

    bank
}

/// Remove random trips along with their predecessor and successor.
fn neighbor_bank<R: Rng>(
    problem: &Problem,
    schedule: &Schedule,
    n: usize,
    rng: &mut R,
) -> Vec<TripId> {
    // trip-only view of every duty
    let chains: Vec<Vec<TripId>> = schedule
        .duties
        .iter()
        .map(|duty| duty.trips().collect())
        .collect();

    let mut bank = Vec::new();
    let mut in_bank = BTreeSet::new();

    while bank.len() < n {
        let remaining: Vec<TripId> = problem
            .trip_ids()
            .filter(|trip| !in_bank.contains(trip))
            .collect();
        let trip = match remaining.choose(rng) {
            Some(&trip) => trip,
            None => break,
        };
        bank.push(trip);
        in_bank.insert(trip);

        let located = chains
            .iter()
            .find_map(|chain| chain.iter().position(|&t| t == trip).map(|pos| (chain, pos)));

        if let Some((chain, pos)) = located {
            if pos > 0 && in_bank.insert(chain[pos - 1]) {
                bank.push(chain[pos - 1]);
            }
            if pos + 1 < chain.len() && in_bank.insert(chain[pos + 1]) {
                bank.push(chain[pos + 1]);
            }
        }
    }

    bank
}

/// Remove the bank trips and their charging events from every duty.
///
/// Duties left with at most two interior nodes are deleted and their remaining
/// trips appended to the bank.
pub fn strip_trips(schedule: &mut Schedule, bank: &mut Vec<TripId>) {
    let targets: BTreeSet<TripId> = bank.iter().copied().collect();
    let mut dissolved = Vec::new();

    let Schedule { duties, charging } = schedule;
    for (index, duty) in duties.iter_mut().enumerate() {
        duty.chain.retain(|node| match node {
            Node::Trip(trip) | Node::Charging(trip) => !targets.contains(trip),
            _ => true,
        });

        let released: Vec<TripId> = duty
            .charging
            .keys()
            .filter(|trip| targets.contains(trip))
            .copied()
            .collect();
        for trip in released {
            duty.charging.remove(&trip);
            charging.remove(&trip);
        }

        if duty.chain.len() <= MIN_DUTY_LEN {
            bank.extend(duty.trips());
            dissolved.push(index);
        }
    }

    for index in dissolved.into_iter().rev() {
        schedule.remove_duty(index);
    }
}
