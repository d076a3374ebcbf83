//! Duty and schedule representation for the EVSP.

use crate::error::ProblemError;
use crate::problem::{DivisionId, Node, Problem, TripId, VehicleTypeId};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::AddAssign;

/// Cost components of a duty or a schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub vehicle: f64,
    pub time: f64,
    pub electricity: f64,
    /// Sum of the components the instance considers
    pub total: f64,
}

impl AddAssign for CostBreakdown {
    fn add_assign(&mut self, other: Self) {
        self.vehicle += other.vehicle;
        self.time += other.time;
        self.electricity += other.electricity;
        self.total += other.total;
    }
}

/// The day of one bus: vehicle type, node chain and charging time assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duty {
    pub vehicle_type: VehicleTypeId,
    /// `[Origin, ..., Destination]`
    pub chain: Vec<Node>,
    /// Charging event (keyed by the trip it follows) to time division
    pub charging: BTreeMap<TripId, DivisionId>,
}

impl Duty {
    /// Create a duty from its parts.
    pub fn new(
        vehicle_type: VehicleTypeId,
        chain: Vec<Node>,
        charging: BTreeMap<TripId, DivisionId>,
    ) -> Self {
        Duty {
            vehicle_type,
            chain,
            charging,
        }
    }

    /// Create a duty serving a single trip.
    pub fn with_trip(vehicle_type: VehicleTypeId, trip: TripId) -> Self {
        Duty::new(
            vehicle_type,
            vec![Node::Origin, Node::Trip(trip), Node::Destination],
            BTreeMap::new(),
        )
    }

    /// Trips served, in chain order.
    pub fn trips(&self) -> impl Iterator<Item = TripId> + '_ {
        self.chain.iter().filter_map(Node::trip)
    }

    /// Number of nodes between origin and destination.
    pub fn interior_len(&self) -> usize {
        self.chain.len().saturating_sub(2)
    }

    pub fn contains_trip(&self, trip: TripId) -> bool {
        self.chain.contains(&Node::Trip(trip))
    }

    pub fn first_trip(&self) -> Option<TripId> {
        self.trips().next()
    }

    /// Calculate the cost of this duty.
    pub fn cost(&self, problem: &Problem) -> f64 {
        self.cost_breakdown(problem).total
    }

    pub fn cost_breakdown(&self, problem: &Problem) -> CostBreakdown {
        self.evaluate_as(problem, self.vehicle_type).0
    }

    /// Check that the battery never drops below the safe level.
    pub fn is_energy_feasible(&self, problem: &Problem) -> bool {
        self.evaluate_as(problem, self.vehicle_type).1
    }

    /// Simulate the battery along the chain for a given vehicle type.
    /// Returns the cost and whether the safe battery level is respected.
    pub fn evaluate_as(&self, problem: &Problem, vehicle: VehicleTypeId) -> (CostBreakdown, bool) {
        let settings = problem.settings();
        let vehicle_type = problem.vehicle_type(vehicle);
        let capacity = vehicle_type.battery_capacity;
        let floor = settings.battery_lower_bound * capacity;

        let mut level = capacity;
        let mut time = 0.0;
        let mut electricity = 0.0;
        let mut feasible = true;

        for (&node, &next) in self.chain.iter().tuple_windows() {
            let deadhead = problem.deadhead(node, next);
            time += (deadhead.time + problem.node_duration(node)) * settings.time_cost;

            match node {
                Node::Charging(trip) => {
                    let volume = problem.charge_volume(vehicle, level);
                    let price = self
                        .charging
                        .get(&trip)
                        .and_then(|&r| problem.division(r))
                        .map_or(problem.max_price(), |r| r.price);
                    electricity += volume * price;
                    level += volume - deadhead.energy;
                }
                _ => level -= problem.node_energy(vehicle, node) + deadhead.energy,
            }

            if level < floor {
                feasible = false;
            }
        }

        // charged to full after daily operation
        electricity += (capacity - level) * problem.max_price();

        let mut cost = CostBreakdown {
            vehicle: vehicle_type.purchase_cost,
            time,
            electricity,
            total: 0.0,
        };
        if settings.include_vehicle_cost {
            cost.total += cost.vehicle;
        }
        if settings.include_time_cost {
            cost.total += cost.time;
        }
        if settings.include_electricity_cost {
            cost.total += cost.electricity;
        }

        (cost, feasible)
    }

    /// The vehicle type with the lowest cost that keeps this duty energy feasible.
    pub fn cheapest_feasible_type(&self, problem: &Problem) -> Option<VehicleTypeId> {
        problem
            .vehicle_type_ids()
            .filter_map(|vehicle| {
                let (cost, feasible) = self.evaluate_as(problem, vehicle);
                feasible.then_some((vehicle, cost.total))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(vehicle, _)| vehicle)
    }

    fn validate(&self, problem: &Problem) -> Result<(), ProblemError> {
        if self.vehicle_type == 0 || self.vehicle_type > problem.vehicle_types().len() {
            return Err(ProblemError::UnknownVehicleType(self.vehicle_type));
        }
        if self.chain.len() < 2
            || self.chain.first() != Some(&Node::Origin)
            || self.chain.last() != Some(&Node::Destination)
        {
            return Err(ProblemError::MalformedChain);
        }

        let mut chargers = BTreeSet::new();
        for node in &self.chain[1..self.chain.len() - 1] {
            match *node {
                Node::Origin | Node::Destination => return Err(ProblemError::MalformedChain),
                Node::Trip(id) if id == 0 || id > problem.trip_count() => {
                    return Err(ProblemError::UnknownTrip(id))
                }
                Node::Trip(_) => {}
                Node::Charging(id) => {
                    if id == 0 || id > problem.trip_count() {
                        return Err(ProblemError::UnknownTrip(id));
                    }
                    if !self.charging.contains_key(&id) {
                        return Err(ProblemError::UnassignedCharging(id));
                    }
                    chargers.insert(id);
                }
            }
        }

        for (&trip, &division) in &self.charging {
            if !chargers.contains(&trip) {
                return Err(ProblemError::UnassignedCharging(trip));
            }
            if problem.division(division).is_none() {
                return Err(ProblemError::UnknownTimeDivision(division));
            }
        }

        Ok(())
    }
}

/// Represents a complete vehicle schedule.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub duties: Vec<Duty>,
    /// Aggregate charging assignment, always the union of the duty assignments
    pub charging: BTreeMap<TripId, DivisionId>,
}

impl Schedule {
    /// Create a new, empty schedule.
    pub fn new() -> Self {
        Schedule::default()
    }

    /// Build a schedule from duties, checking them against the instance.
    pub fn from_duties(problem: &Problem, duties: Vec<Duty>) -> Result<Self, ProblemError> {
        let mut schedule = Schedule::new();
        for duty in duties {
            duty.validate(problem)?;
            schedule.add_duty(duty);
        }
        Ok(schedule)
    }

    /// Add a duty and register its charging assignments.
    pub fn add_duty(&mut self, duty: Duty) {
        for (&trip, &division) in &duty.charging {
            self.charging.insert(trip, division);
        }
        self.duties.push(duty);
    }

    /// Remove a duty and release its charging assignments.
    pub fn remove_duty(&mut self, index: usize) -> Duty {
        let duty = self.duties.remove(index);
        for trip in duty.charging.keys() {
            self.charging.remove(trip);
        }
        duty
    }

    /// Insert a charging event after `trip` at `position` of a duty chain.
    pub fn assign_charging(
        &mut self,
        duty_index: usize,
        position: usize,
        trip: TripId,
        division: DivisionId,
    ) {
        let duty = &mut self.duties[duty_index];
        duty.chain.insert(position, Node::Charging(trip));
        duty.charging.insert(trip, division);
        self.charging.insert(trip, division);
    }

    /// Remove the charging event following `trip` from a duty.
    pub fn release_charging(&mut self, duty_index: usize, trip: TripId) {
        let duty = &mut self.duties[duty_index];
        duty.chain.retain(|&node| node != Node::Charging(trip));
        duty.charging.remove(&trip);
        self.charging.remove(&trip);
    }

    /// Rebuild the aggregate charging assignment from the duties.
    pub fn resync_charging(&mut self) {
        self.charging = self
            .duties
            .iter()
            .flat_map(|duty| duty.charging.iter().map(|(&f, &r)| (f, r)))
            .collect();
    }

    /// Check that the aggregate charging assignment equals the union of the duty ones.
    pub fn is_charging_consistent(&self) -> bool {
        let union: BTreeMap<TripId, DivisionId> = self
            .duties
            .iter()
            .flat_map(|duty| duty.charging.iter().map(|(&f, &r)| (f, r)))
            .collect();
        union == self.charging
    }

    pub fn len(&self) -> usize {
        self.duties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.duties.is_empty()
    }

    /// All scheduled trips, duty by duty.
    pub fn trip_ids(&self) -> Vec<TripId> {
        self.duties.iter().flat_map(|duty| duty.trips()).collect()
    }

    pub fn trip_count(&self) -> usize {
        self.duties.iter().map(|duty| duty.trips().count()).sum()
    }

    /// Number of charging events during operation.
    pub fn charging_count(&self) -> usize {
        self.charging.len()
    }

    /// Calculate the total cost of all duties.
    pub fn cost(&self, problem: &Problem) -> f64 {
        self.duties.iter().map(|duty| duty.cost(problem)).sum()
    }

    pub fn cost_breakdown(&self, problem: &Problem) -> CostBreakdown {
        let mut total = CostBreakdown::default();
        for duty in &self.duties {
            total += duty.cost_breakdown(problem);
        }
        total
    }

    pub fn is_energy_feasible(&self, problem: &Problem) -> bool {
        self.duties.iter().all(|duty| duty.is_energy_feasible(problem))
    }

    /// Largest number of buses at the station during the slots a charge
    /// starting in `division` would occupy.
    pub fn division_occupancy(&self, problem: &Problem, division: DivisionId) -> usize {
        let counts = self.assignment_counts(problem);
        Self::occupancy(&counts, division, problem.settings().charge_slots as usize)
    }

    /// Check that the station never holds more buses than its capacity.
    pub fn is_capacity_feasible(&self, problem: &Problem) -> bool {
        let capacity = match problem.settings().station_capacity {
            Some(capacity) => capacity,
            None => return true,
        };

        let counts = self.assignment_counts(problem);
        let slots = problem.settings().charge_slots as usize;
        self.charging
            .values()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .all(|&division| Self::occupancy(&counts, division, slots) <= capacity)
    }

    /// Number of charging events starting in each division, indexed by division id.
    fn assignment_counts(&self, problem: &Problem) -> Vec<usize> {
        let mut counts = vec![0; problem.division_count() + 1];
        for &division in self.charging.values() {
            if let Some(count) = counts.get_mut(division) {
                *count += 1;
            }
        }
        counts
    }

    fn occupancy(counts: &[usize], division: DivisionId, slots: usize) -> usize {
        (division..division + slots)
            .map(|slot| {
                (0..slots)
                    .filter_map(|back| slot.checked_sub(back))
                    .filter(|&started| started > 0)
                    .map(|started| counts.get(started).copied().unwrap_or(0))
                    .sum::<usize>()
            })
            .max()
            .unwrap_or(0)
    }

    /// Sort duties by the start time of their first trip.
    pub fn sort_by_start(&mut self, problem: &Problem) {
        self.duties.sort_by(|a, b| {
            let start_a = a.first_trip().map_or(f64::INFINITY, |t| problem.trip(t).start);
            let start_b = b.first_trip().map_or(f64::INFINITY, |t| problem.trip(t).start);
            start_a.total_cmp(&start_b)
        });
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Schedule:")?;
        writeln!(f, "  Duties: {}", self.duties.len())?;
        writeln!(f, "  Charging Events: {}", self.charging.len())?;

        for (i, duty) in self.duties.iter().enumerate() {
            writeln!(
                f,
                "  Duty {} (type {}): {} {:?}",
                i,
                duty.vehicle_type,
                duty.chain.iter().join(" -> "),
                duty.charging
            )?;
        }

        Ok(())
    }
}
