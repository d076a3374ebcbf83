//! Insertion (repair) operators for the ALNS.

use crate::problem::{DivisionId, Node, Problem, TripId};
use crate::solution::{Duty, Schedule};
use crate::weights::Operator;
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The available insertion operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsertionOperator {
    /// Charge in a random feasible time division.
    Random,
    /// Charge in the cheapest division with free station capacity, then pick the
    /// cheapest vehicle type per duty.
    Greedy,
}

impl Operator for InsertionOperator {
    const ALL: &'static [Self] = &[InsertionOperator::Random, InsertionOperator::Greedy];

    fn name(&self) -> &'static str {
        match self {
            InsertionOperator::Random => "random_insertion",
            InsertionOperator::Greedy => "greedy_insertion",
        }
    }
}

/// A repaired schedule with its penalized cost.
#[derive(Debug, Clone)]
pub struct Insertion {
    pub cost: f64,
    pub schedule: Schedule,
    pub feasible: bool,
}

/// Penalties and charging probability shared by every insertion.
#[derive(Debug, Clone, Copy)]
pub struct InsertionParams {
    pub energy_penalty: f64,
    pub capacity_penalty: f64,
    pub charge_probability: f64,
}

impl InsertionOperator {
    /// Insert every bank trip into `schedule`.
    ///
    /// Trips without a feasible position open a new duty. After each trip placed
    /// inside a duty a charging event is attempted with the configured probability,
    /// unless the trip is the last one of its duty.
    pub fn apply<R: Rng>(
        &self,
        problem: &Problem,
        bank: &[TripId],
        mut schedule: Schedule,
        params: InsertionParams,
        rng: &mut R,
    ) -> Insertion {
        if bank.is_empty() {
            return evaluate(problem, schedule, params);
        }

        let mut pool = bank.to_vec();
        while !pool.is_empty() {
            let (trip, placement) = select_trip(problem, &pool, &schedule, rng);

            match placement {
                Some((duty_index, position)) => {
                    schedule.duties[duty_index]
                        .chain
                        .insert(position, Node::Trip(trip));

                    let charge = params.charge_probability > 0.0
                        && rng.gen::<f64>() < params.charge_probability;
                    let successor = schedule.duties[duty_index].chain[position + 1];
                    // no charging right before the depot
                    if charge && successor.is_trip() {
                        if let Some(division) =
                            self.choose_division(problem, &schedule, trip, successor, rng)
                        {
                            schedule.assign_charging(duty_index, position + 1, trip, division);
                        }
                    }
                }
                None => {
                    let vehicle = rng.gen_range(1..=problem.vehicle_types().len());
                    schedule.add_duty(Duty::with_trip(vehicle, trip));
                }
            }

            pool.retain(|&t| t != trip);
        }

        strip_trailing_charging(&mut schedule);

        if *self == InsertionOperator::Greedy {
            optimize_vehicle_types(problem, &mut schedule);
        }

        evaluate(problem, schedule, params)
    }

    fn choose_division<R: Rng>(
        &self,
        problem: &Problem,
        schedule: &Schedule,
        trip: TripId,
        successor: Node,
        rng: &mut R,
    ) -> Option<DivisionId> {
        let windows = problem.charging_windows(trip, successor);
        match self {
            InsertionOperator::Random => windows.choose(rng).copied(),
            InsertionOperator::Greedy => cheapest_division(problem, schedule, &windows, rng),
        }
    }
}

/// Cheapest division whose occupancy is below station capacity, or a random one
/// when the station is full in all of them.
fn cheapest_division<R: Rng>(
    problem: &Problem,
    schedule: &Schedule,
    windows: &[DivisionId],
    rng: &mut R,
) -> Option<DivisionId> {
    let price = |r: DivisionId| problem.division(r).map_or(f64::INFINITY, |d| d.price);

    let cheapest = windows
        .iter()
        .copied()
        .filter(|&r| match problem.settings().station_capacity {
            Some(capacity) => schedule.division_occupancy(problem, r) < capacity,
            None => true,
        })
        .min_by(|&a, &b| price(a).total_cmp(&price(b)));

    cheapest.or_else(|| windows.choose(rng).copied())
}

/// Draw bank trips at random until one fits into an existing duty.
/// If none fits, the last drawn trip is returned without a placement.
fn select_trip<R: Rng>(
    problem: &Problem,
    pool: &[TripId],
    schedule: &Schedule,
    rng: &mut R,
) -> (TripId, Option<(usize, usize)>) {
    let mut candidates = pool.to_vec();
    let mut trip = pool[0];

    while !candidates.is_empty() {
        trip = candidates.remove(rng.gen_range(0..candidates.len()));
        if let Some(placement) = find_position(problem, schedule, trip, rng) {
            return (trip, Some(placement));
        }
    }

    (trip, None)
}

/// Find `(duty index, chain position)` for a trip, scanning duties in random order.
pub fn find_position<R: Rng>(
    problem: &Problem,
    schedule: &Schedule,
    trip: TripId,
    rng: &mut R,
) -> Option<(usize, usize)> {
    let mut order: Vec<usize> = (0..schedule.duties.len()).collect();
    order.shuffle(rng);

    order.into_iter().find_map(|index| {
        position_in_duty(problem, &schedule.duties[index], trip).map(|position| (index, position))
    })
}

/// First chain position where the trip can be inserted, if any.
///
/// The scan stops as soon as the node before the candidate position cannot
/// reach the trip.
pub fn position_in_duty(problem: &Problem, duty: &Duty, trip: TripId) -> Option<usize> {
    let node = Node::Trip(trip);

    for (index, (&prev, &next)) in duty.chain.iter().tuple_windows().enumerate() {
        if !problem.has_arc(prev, node) {
            return None;
        }
        if problem.has_arc(node, next) || next == Node::Destination {
            return Some(index + 1);
        }
    }

    None
}

/// Drop charging events sitting right before the destination.
pub fn strip_trailing_charging(schedule: &mut Schedule) {
    for index in 0..schedule.duties.len() {
        let chain = &schedule.duties[index].chain;
        if chain.len() < 2 {
            continue;
        }
        if let Node::Charging(trip) = chain[chain.len() - 2] {
            schedule.release_charging(index, trip);
        }
    }
}

/// Give every duty its cheapest energy-feasible vehicle type.
pub fn optimize_vehicle_types(problem: &Problem, schedule: &mut Schedule) {
    if problem.vehicle_types().len() == 1 {
        return;
    }
    for duty in &mut schedule.duties {
        if let Some(vehicle) = duty.cheapest_feasible_type(problem) {
            duty.vehicle_type = vehicle;
        }
    }
}

/// Cost a schedule, adding a penalty per violated constraint family.
pub fn evaluate(problem: &Problem, schedule: Schedule, params: InsertionParams) -> Insertion {
    let mut cost = schedule.cost(problem);
    let mut feasible = true;

    if !schedule.is_capacity_feasible(problem) {
        cost += params.capacity_penalty;
        feasible = false;
    }
    if !schedule.is_energy_feasible(problem) {
        cost += params.energy_penalty;
        feasible = false;
    }

    Insertion {
        cost,
        schedule,
        feasible,
    }
}
