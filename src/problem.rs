//! Problem definition and time-space network for the electric vehicle scheduling problem.

use crate::error::ProblemError;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

pub type TripId = usize;
pub type VehicleTypeId = usize;
pub type DivisionId = usize;

/// A position in a duty chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Node {
    Origin,
    Trip(TripId),
    /// Recharging event that follows the given trip.
    Charging(TripId),
    Destination,
}

impl Node {
    /// The trip id if this is a trip node.
    pub fn trip(&self) -> Option<TripId> {
        match self {
            Node::Trip(id) => Some(*id),
            _ => None,
        }
    }

    /// The id of the trip this charging event follows.
    pub fn charging(&self) -> Option<TripId> {
        match self {
            Node::Charging(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_trip(&self) -> bool {
        matches!(self, Node::Trip(_))
    }

    pub fn is_charging(&self) -> bool {
        matches!(self, Node::Charging(_))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Origin => write!(f, "o"),
            Node::Trip(id) => write!(f, "T{}", id),
            Node::Charging(id) => write!(f, "F{}", id),
            Node::Destination => write!(f, "d"),
        }
    }
}

/// A timetabled service trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub route: String,
    /// Departure in minutes after midnight
    pub start: f64,
    /// Travel time in minutes
    pub duration: f64,
    /// Energy consumption in kWh
    pub consumption: f64,
    /// Length in km, only used by capacity-related consumption
    #[serde(default)]
    pub distance: f64,
}

impl Trip {
    /// Create a new trip.
    pub fn new(
        id: TripId,
        route: impl Into<String>,
        start: f64,
        duration: f64,
        consumption: f64,
    ) -> Self {
        Trip {
            id,
            route: route.into(),
            start,
            duration,
            consumption,
            distance: 0.0,
        }
    }

    /// Set the trip length.
    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = distance;
        self
    }

    /// Arrival time of the trip.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Battery charging behaviour of a vehicle type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChargingCurve {
    /// Constant charging rate in kWh per minute.
    Linear { rate: f64 },
    /// Piecewise-linear state-of-charge curve: breakpoint times (minutes) and
    /// the state of charge (fraction of capacity) reached at each of them.
    Piecewise { times: Vec<f64>, socs: Vec<f64> },
}

impl Default for ChargingCurve {
    fn default() -> Self {
        ChargingCurve::Linear { rate: 1.0 }
    }
}

impl ChargingCurve {
    fn is_valid(&self) -> bool {
        match self {
            ChargingCurve::Linear { rate } => rate.is_finite() && *rate > 0.0,
            ChargingCurve::Piecewise { times, socs } => {
                times.len() >= 2
                    && times.len() == socs.len()
                    && times.iter().chain(socs.iter()).all(|v| v.is_finite())
                    && times.windows(2).all(|w| w[0] < w[1])
                    && socs.windows(2).all(|w| w[0] <= w[1])
                    && socs[1] > socs[0]
            }
        }
    }

    /// Energy in kWh gained by charging for `duration` minutes, starting at `level` kWh
    /// on a battery of `capacity` kWh.
    pub fn charge_volume(&self, capacity: f64, level: f64, duration: f64) -> f64 {
        match self {
            ChargingCurve::Linear { rate } => (capacity - level).min(rate * duration),
            ChargingCurve::Piecewise { times, socs } => {
                let last = socs.len() - 1;
                let soc = level / capacity;
                if soc >= socs[last] {
                    return 0.0;
                }

                let first_rate = (socs[1] - socs[0]) / (times[1] - times[0]);
                let begin = if soc < socs[0] {
                    times[0] + (soc - socs[0]) / first_rate
                } else {
                    match (0..last).find(|&i| socs[i] <= soc && soc < socs[i + 1]) {
                        Some(i) => {
                            let rate = (socs[i + 1] - socs[i]) / (times[i + 1] - times[i]);
                            times[i] + (soc - socs[i]) / rate
                        }
                        None => return 0.0,
                    }
                };

                let reached = Self::soc_at(times, socs, begin + duration);
                ((reached - soc) * capacity).max(0.0)
            }
        }
    }

    fn soc_at(times: &[f64], socs: &[f64], t: f64) -> f64 {
        let last = times.len() - 1;
        if t < times[0] {
            let first_rate = (socs[1] - socs[0]) / (times[1] - times[0]);
            return socs[0] + (t - times[0]) * first_rate;
        }
        if t >= times[last] {
            return socs[last];
        }
        (0..last)
            .find(|&i| times[i] <= t && t < times[i + 1])
            .map(|i| {
                socs[i] + (t - times[i]) * (socs[i + 1] - socs[i]) / (times[i + 1] - times[i])
            })
            .unwrap_or(socs[last])
    }
}

/// A bus type available to the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleType {
    pub id: VehicleTypeId,
    /// Battery capacity in kWh
    pub battery_capacity: f64,
    /// Daily depreciation of one vehicle
    pub purchase_cost: f64,
    #[serde(default)]
    pub charging: ChargingCurve,
}

impl VehicleType {
    /// Create a vehicle type charging linearly at 1 kWh per minute.
    pub fn new(id: VehicleTypeId, battery_capacity: f64, purchase_cost: f64) -> Self {
        VehicleType {
            id,
            battery_capacity,
            purchase_cost,
            charging: ChargingCurve::default(),
        }
    }

    /// Replace the charging curve.
    pub fn with_charging(mut self, charging: ChargingCurve) -> Self {
        self.charging = charging;
        self
    }
}

/// Time and energy spent on a non-revenue movement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Deadhead {
    /// Minutes
    pub time: f64,
    /// kWh
    pub energy: f64,
}

impl Deadhead {
    pub fn new(time: f64, energy: f64) -> Self {
        Deadhead { time, energy }
    }
}

/// Deadhead parameters by movement kind. Leaving the origin and returning from
/// a charger to the depot are free.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadheadSettings {
    pub trip_to_trip: Deadhead,
    pub trip_to_charger: Deadhead,
    pub trip_to_depot: Deadhead,
    pub charger_to_trip: Deadhead,
}

impl Default for DeadheadSettings {
    fn default() -> Self {
        DeadheadSettings {
            trip_to_trip: Deadhead::new(2.0, 0.05),
            trip_to_charger: Deadhead::new(3.0, 0.05),
            trip_to_depot: Deadhead::new(3.0, 0.05),
            charger_to_trip: Deadhead::new(2.0, 0.05),
        }
    }
}

/// Operating parameters of an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemSettings {
    /// Minimum safe battery level as a fraction of capacity
    pub battery_lower_bound: f64,
    /// Buses that can charge at once, `None` for an unconstrained station
    pub station_capacity: Option<usize>,
    /// Length of one time division in minutes
    pub slot_minutes: u32,
    /// Number of divisions a charging event lasts
    pub charge_slots: u32,
    /// Whether a bus may serve trips of different routes
    pub line_change: bool,
    /// Start of the charging day in minutes after midnight
    pub day_start: u32,
    /// Length of the charging day in minutes
    pub day_span: u32,
    /// Time-related cost per minute
    pub time_cost: f64,
    /// Flat electricity price per kWh
    pub electricity_price: f64,
    /// One price per time division, overrides the flat price
    pub time_of_use_prices: Option<Vec<f64>>,
    pub include_vehicle_cost: bool,
    pub include_electricity_cost: bool,
    pub include_time_cost: bool,
    /// Scale trip consumption with battery size
    pub capacity_related_consumption: bool,
    pub bench_capacity: f64,
    /// Extra kWh per km per kWh of battery above the bench capacity
    pub consumption_increase_rate: f64,
    pub deadhead: DeadheadSettings,
}

impl Default for ProblemSettings {
    fn default() -> Self {
        ProblemSettings {
            battery_lower_bound: 0.2,
            station_capacity: None,
            slot_minutes: 10,
            charge_slots: 3,
            line_change: true,
            day_start: 300,
            day_span: 1260,
            time_cost: 0.5,
            electricity_price: 0.6414,
            time_of_use_prices: None,
            include_vehicle_cost: true,
            include_electricity_cost: true,
            include_time_cost: true,
            capacity_related_consumption: false,
            bench_capacity: 220.0,
            consumption_increase_rate: 0.000297,
            deadhead: DeadheadSettings::default(),
        }
    }
}

/// Raw instance data, as read from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default)]
    pub name: String,
    pub trips: Vec<Trip>,
    pub vehicle_types: Vec<VehicleType>,
    #[serde(default)]
    pub settings: ProblemSettings,
}

/// A charging window at the station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeDivision {
    pub id: DivisionId,
    pub start: f64,
    /// Electricity price per kWh
    pub price: f64,
}

/// Represents an EVSP instance together with its time-space network.
#[derive(Debug, Clone)]
pub struct Problem {
    pub name: String,
    trips: Vec<Trip>,
    vehicle_types: Vec<VehicleType>,
    settings: ProblemSettings,
    divisions: Vec<TimeDivision>,
    /// Trip energy per vehicle type, indexed `[type - 1][trip - 1]`
    trip_energy: Vec<Vec<f64>>,
    max_price: f64,
    network: DiGraphMap<Node, Deadhead>,
}

impl Problem {
    /// Validate an instance and build its network.
    pub fn new(instance: Instance) -> Result<Self, ProblemError> {
        let Instance {
            name,
            trips,
            vehicle_types,
            settings,
        } = instance;

        if trips.is_empty() {
            return Err(ProblemError::EmptyTimetable);
        }
        for (position, trip) in trips.iter().enumerate() {
            if trip.id != position + 1 {
                return Err(ProblemError::NonContiguousTripIds {
                    position,
                    found: trip.id,
                });
            }
            if !(trip.start.is_finite() && trip.start >= 0.0)
                || !(trip.duration.is_finite() && trip.duration > 0.0)
            {
                return Err(ProblemError::InvalidTripTimes(trip.id));
            }
        }

        if vehicle_types.is_empty() {
            return Err(ProblemError::NoVehicleTypes);
        }
        for (position, vehicle) in vehicle_types.iter().enumerate() {
            if vehicle.id != position + 1 {
                return Err(ProblemError::NonContiguousVehicleTypeIds {
                    position,
                    found: vehicle.id,
                });
            }
            if !(vehicle.battery_capacity.is_finite() && vehicle.battery_capacity > 0.0) {
                return Err(ProblemError::InvalidBatteryCapacity(vehicle.id));
            }
            if !vehicle.charging.is_valid() {
                return Err(ProblemError::InvalidChargingCurve(vehicle.id));
            }
        }

        if !(settings.include_vehicle_cost
            || settings.include_electricity_cost
            || settings.include_time_cost)
        {
            return Err(ProblemError::NoCostComponent);
        }

        let divisions = Self::build_divisions(&settings)?;
        let max_price = divisions
            .iter()
            .map(|r| r.price)
            .fold(f64::NEG_INFINITY, f64::max);

        let trip_energy = vehicle_types
            .iter()
            .map(|vehicle| {
                trips
                    .iter()
                    .map(|trip| {
                        if settings.capacity_related_consumption {
                            trip.consumption
                                + (vehicle.battery_capacity - settings.bench_capacity)
                                    * settings.consumption_increase_rate
                                    * trip.distance
                        } else {
                            trip.consumption
                        }
                    })
                    .collect()
            })
            .collect();

        let mut problem = Problem {
            name,
            trips,
            vehicle_types,
            settings,
            divisions,
            trip_energy,
            max_price,
            network: DiGraphMap::new(),
        };
        problem.network = problem.build_network();

        Ok(problem)
    }

    /// Load an instance from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProblemError> {
        let content = fs::read_to_string(path)?;
        let instance: Instance = serde_json::from_str(&content)?;
        Problem::new(instance)
    }

    fn build_divisions(settings: &ProblemSettings) -> Result<Vec<TimeDivision>, ProblemError> {
        if settings.slot_minutes == 0 || settings.charge_slots == 0 {
            return Err(ProblemError::InvalidTimeGrid);
        }

        let count = (settings.day_span / settings.slot_minutes).saturating_sub(2) as usize;
        if count == 0 {
            return Err(ProblemError::NoTimeDivisions);
        }

        if let Some(prices) = &settings.time_of_use_prices {
            if prices.len() != count {
                return Err(ProblemError::PriceTableMismatch {
                    expected: count,
                    found: prices.len(),
                });
            }
        }

        Ok((1..=count)
            .map(|id| TimeDivision {
                id,
                start: (settings.day_start + (id as u32 - 1) * settings.slot_minutes) as f64,
                price: settings
                    .time_of_use_prices
                    .as_ref()
                    .map_or(settings.electricity_price, |prices| prices[id - 1]),
            })
            .collect())
    }

    /// Build the feasible arcs between trip and charging nodes.
    fn build_network(&self) -> DiGraphMap<Node, Deadhead> {
        let mut network = DiGraphMap::new();
        let charge_duration = self.charge_duration();

        for trip in &self.trips {
            let i = trip.id;
            for (from, to) in [
                (Node::Origin, Node::Trip(i)),
                (Node::Trip(i), Node::Charging(i)),
                (Node::Trip(i), Node::Destination),
                (Node::Charging(i), Node::Destination),
            ] {
                network.add_edge(from, to, self.deadhead_by_kind(from, to));
            }
        }

        for from in &self.trips {
            let earliest_charge = self.earliest_charge_start(from.id);

            for to in &self.trips {
                if from.id == to.id || !self.routes_compatible(from, to) {
                    continue;
                }

                let link = self.settings.deadhead.trip_to_trip;
                if from.end() + link.time <= to.start {
                    network.add_edge(Node::Trip(from.id), Node::Trip(to.id), link);
                }

                let link = self.settings.deadhead.charger_to_trip;
                let fits = self.divisions.iter().any(|r| {
                    r.start >= earliest_charge && r.start + charge_duration + link.time <= to.start
                });
                if fits {
                    network.add_edge(Node::Charging(from.id), Node::Trip(to.id), link);
                }
            }
        }

        network
    }

    fn routes_compatible(&self, from: &Trip, to: &Trip) -> bool {
        self.settings.line_change || from.route == to.route
    }

    fn deadhead_by_kind(&self, from: Node, to: Node) -> Deadhead {
        let deadhead = &self.settings.deadhead;
        match (from, to) {
            (Node::Trip(_), Node::Trip(_)) => deadhead.trip_to_trip,
            (Node::Trip(_), Node::Charging(_)) => deadhead.trip_to_charger,
            (Node::Trip(_), Node::Destination) => deadhead.trip_to_depot,
            (Node::Charging(_), Node::Trip(_)) => deadhead.charger_to_trip,
            _ => Deadhead::default(),
        }
    }

    /// Check whether a vehicle may move directly from `from` to `to`.
    pub fn has_arc(&self, from: Node, to: Node) -> bool {
        self.network.contains_edge(from, to)
    }

    /// Deadhead between two consecutive chain nodes.
    pub fn deadhead(&self, from: Node, to: Node) -> Deadhead {
        self.network
            .edge_weight(from, to)
            .copied()
            .unwrap_or_else(|| self.deadhead_by_kind(from, to))
    }

    /// Number of feasible arcs in the network.
    pub fn arc_count(&self) -> usize {
        self.network.edge_count()
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    /// Get a trip by id.
    pub fn trip(&self, id: TripId) -> &Trip {
        &self.trips[id - 1]
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    /// All trip ids in ascending order.
    pub fn trip_ids(&self) -> impl Iterator<Item = TripId> {
        1..=self.trips.len()
    }

    pub fn vehicle_types(&self) -> &[VehicleType] {
        &self.vehicle_types
    }

    /// Get a vehicle type by id.
    pub fn vehicle_type(&self, id: VehicleTypeId) -> &VehicleType {
        &self.vehicle_types[id - 1]
    }

    pub fn vehicle_type_ids(&self) -> impl Iterator<Item = VehicleTypeId> {
        1..=self.vehicle_types.len()
    }

    /// The vehicle type with the largest battery, first one on ties.
    pub fn largest_battery_type(&self) -> VehicleTypeId {
        let mut best = &self.vehicle_types[0];
        for vehicle in &self.vehicle_types[1..] {
            if vehicle.battery_capacity > best.battery_capacity {
                best = vehicle;
            }
        }
        best.id
    }

    pub fn settings(&self) -> &ProblemSettings {
        &self.settings
    }

    pub fn divisions(&self) -> &[TimeDivision] {
        &self.divisions
    }

    pub fn division(&self, id: DivisionId) -> Option<&TimeDivision> {
        id.checked_sub(1).and_then(|index| self.divisions.get(index))
    }

    pub fn division_count(&self) -> usize {
        self.divisions.len()
    }

    /// Highest electricity price of the day, used for the overnight recharge.
    pub fn max_price(&self) -> f64 {
        self.max_price
    }

    /// Fixed length of a charging event in minutes.
    pub fn charge_duration(&self) -> f64 {
        (self.settings.charge_slots * self.settings.slot_minutes) as f64
    }

    /// Time a node keeps the vehicle busy, excluding deadhead.
    pub fn node_duration(&self, node: Node) -> f64 {
        match node {
            Node::Trip(id) => self.trip(id).duration,
            _ => 0.0,
        }
    }

    /// Energy a vehicle of type `vehicle` spends serving a node.
    pub fn node_energy(&self, vehicle: VehicleTypeId, node: Node) -> f64 {
        match node {
            Node::Trip(id) => self.trip_energy[vehicle - 1][id - 1],
            _ => 0.0,
        }
    }

    /// Energy recharged by one charging event starting at `level` kWh.
    pub fn charge_volume(&self, vehicle: VehicleTypeId, level: f64) -> f64 {
        let vehicle = self.vehicle_type(vehicle);
        vehicle
            .charging
            .charge_volume(vehicle.battery_capacity, level, self.charge_duration())
    }

    /// Earliest start of a charging event after `trip`.
    pub fn earliest_charge_start(&self, trip: TripId) -> f64 {
        self.trip(trip).end() + self.settings.deadhead.trip_to_charger.time
    }

    /// Check whether a charge in `division` after `trip` still reaches `successor` in time.
    pub fn charging_fits(&self, trip: TripId, division: &TimeDivision, successor: Node) -> bool {
        if division.start < self.earliest_charge_start(trip) {
            return false;
        }
        match successor {
            Node::Destination => true,
            Node::Trip(next) => {
                let charger = Node::Charging(trip);
                self.has_arc(charger, successor)
                    && division.start
                        + self.charge_duration()
                        + self.deadhead(charger, successor).time
                        <= self.trip(next).start
            }
            _ => false,
        }
    }

    /// Divisions in which a charging event between `trip` and `successor` can take place.
    pub fn charging_windows(&self, trip: TripId, successor: Node) -> Vec<DivisionId> {
        self.divisions
            .iter()
            .filter(|r| self.charging_fits(trip, r, successor))
            .map(|r| r.id)
            .collect()
    }
}
