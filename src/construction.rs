//! Greedy construction of the initial schedule.
//!
//! Duties are built one at a time with the largest battery type: a bus keeps
//! taking the earliest reachable trip and visits the charger when the next trip
//! would drain the battery below the safe level. Once no trip can follow, the
//! duty is closed and given its cheapest energy-feasible vehicle type.

use crate::problem::{DivisionId, Node, Problem, TripId, VehicleTypeId};
use crate::solution::{Duty, Schedule};
use log::debug;
use std::collections::BTreeMap;

/// Build an initial schedule that charges during operation when needed.
pub fn initial_schedule(problem: &Problem) -> Schedule {
    build(problem, true)
}

/// Build an initial schedule without any charging event during operation.
/// Duties end as soon as the next trip would violate the safe battery level.
pub fn night_charge_schedule(problem: &Problem) -> Schedule {
    build(problem, false)
}

fn build(problem: &Problem, charge_during_day: bool) -> Schedule {
    let base_type = problem.largest_battery_type();
    let capacity = problem.vehicle_type(base_type).battery_capacity;
    let floor = problem.settings().battery_lower_bound * capacity;
    // energy needed to leave a trip for the depot or the charger
    let exit = {
        let deadhead = &problem.settings().deadhead;
        deadhead.trip_to_depot.energy.max(deadhead.trip_to_charger.energy)
    };

    let mut remaining: Vec<TripId> = problem.trip_ids().collect();
    remaining.sort_by(|&a, &b| problem.trip(a).start.total_cmp(&problem.trip(b).start));

    let mut schedule = Schedule::new();

    while !remaining.is_empty() {
        let mut chain = vec![Node::Origin];
        let mut charging: BTreeMap<TripId, DivisionId> = BTreeMap::new();
        // battery level on arrival at `current`
        let mut level = capacity;
        let mut current = Node::Origin;

        while let Some(next) = next_trip(problem, current, &remaining, &charging) {
            let arrival = arrival_level(problem, base_type, current, next, level);
            let exhausted =
                arrival - problem.node_energy(base_type, Node::Trip(next)) - exit < floor;

            if exhausted && current != Node::Origin {
                let trip = match current {
                    Node::Trip(trip) if charge_during_day => trip,
                    _ => break,
                };
                let division = match earliest_division(problem, &schedule, trip) {
                    Some(division) => division,
                    None => break,
                };

                let charger = Node::Charging(trip);
                level -= problem.node_energy(base_type, current)
                    + problem.deadhead(current, charger).energy;
                chain.push(charger);
                charging.insert(trip, division);
                schedule.charging.insert(trip, division);
                current = charger;
                continue;
            }

            chain.push(Node::Trip(next));
            remaining.retain(|&t| t != next);
            level = arrival;
            current = Node::Trip(next);
        }

        if let Some(&Node::Charging(trip)) = chain.last() {
            chain.pop();
            charging.remove(&trip);
            schedule.charging.remove(&trip);
        }
        chain.push(Node::Destination);

        let mut duty = Duty::new(base_type, chain, charging);
        duty.vehicle_type = choose_vehicle_type(problem, &duty, base_type);
        schedule.add_duty(duty);
    }

    debug!(
        "Initial schedule: {} duties, {} charging events",
        schedule.len(),
        schedule.charging_count()
    );

    schedule
}

/// First remaining trip (in start order) that can follow `current`.
fn next_trip(
    problem: &Problem,
    current: Node,
    remaining: &[TripId],
    charging: &BTreeMap<TripId, DivisionId>,
) -> Option<TripId> {
    match current {
        Node::Origin => remaining.first().copied(),
        Node::Trip(_) => remaining
            .iter()
            .copied()
            .find(|&t| problem.has_arc(current, Node::Trip(t))),
        Node::Charging(trip) => {
            let division = charging.get(&trip).and_then(|&r| problem.division(r))?;
            remaining
                .iter()
                .copied()
                .find(|&t| problem.charging_fits(trip, division, Node::Trip(t)))
        }
        Node::Destination => None,
    }
}

/// Battery level on arrival at trip `next`, leaving `current` with `level`.
fn arrival_level(
    problem: &Problem,
    vehicle: VehicleTypeId,
    current: Node,
    next: TripId,
    level: f64,
) -> f64 {
    let deadhead = problem.deadhead(current, Node::Trip(next)).energy;
    match current {
        Node::Charging(_) => level + problem.charge_volume(vehicle, level) - deadhead,
        _ => level - problem.node_energy(vehicle, current) - deadhead,
    }
}

/// Earliest division after `trip` in which the station still has room.
fn earliest_division(problem: &Problem, schedule: &Schedule, trip: TripId) -> Option<DivisionId> {
    let earliest = problem.earliest_charge_start(trip);
    problem
        .divisions()
        .iter()
        .filter(|r| r.start >= earliest)
        .find(|r| match problem.settings().station_capacity {
            Some(capacity) => schedule.division_occupancy(problem, r.id) < capacity,
            None => true,
        })
        .map(|r| r.id)
}

fn choose_vehicle_type(problem: &Problem, duty: &Duty, fallback: VehicleTypeId) -> VehicleTypeId {
    if problem.vehicle_types().len() == 1 {
        return fallback;
    }
    duty.cheapest_feasible_type(problem).unwrap_or(fallback)
}
