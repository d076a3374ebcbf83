//! Error types for problem construction and run configuration.
//!
//! The search loop itself never fails: infeasibility is tracked as a penalty.
//! Only malformed inputs are reported through these types.

use crate::problem::{DivisionId, TripId, VehicleTypeId};
use std::fmt;
use std::io;

/// An invalid problem instance or solution referencing data the instance does not have.
#[derive(Debug)]
pub enum ProblemError {
    /// The timetable contains no trips.
    EmptyTimetable,
    /// Trip ids must be `1..=n` in timetable order.
    NonContiguousTripIds { position: usize, found: TripId },
    /// A trip has a negative start or a non-positive duration.
    InvalidTripTimes(TripId),
    /// No vehicle type was given.
    NoVehicleTypes,
    /// Vehicle type ids must be `1..=k` in order.
    NonContiguousVehicleTypeIds { position: usize, found: VehicleTypeId },
    /// A vehicle type has a non-positive battery capacity.
    InvalidBatteryCapacity(VehicleTypeId),
    /// A charging curve is empty, unsorted, or has a non-positive rate.
    InvalidChargingCurve(VehicleTypeId),
    /// All cost components are switched off.
    NoCostComponent,
    /// The time-of-use table does not have one price per division.
    PriceTableMismatch { expected: usize, found: usize },
    /// Slot length or charge slot count is zero.
    InvalidTimeGrid,
    /// The operating window does not contain a single time division.
    NoTimeDivisions,
    /// A charging assignment references a division the instance does not define.
    UnknownTimeDivision(DivisionId),
    /// A chain references a trip the instance does not define.
    UnknownTrip(TripId),
    /// A duty references a vehicle type the instance does not define.
    UnknownVehicleType(VehicleTypeId),
    /// A duty chain does not start at the origin and end at the destination.
    MalformedChain,
    /// A charging node has no division assigned, or a division is assigned to a missing node.
    UnassignedCharging(TripId),
    Io(io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ProblemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemError::EmptyTimetable => write!(f, "timetable contains no trips"),
            ProblemError::NonContiguousTripIds { position, found } => write!(
                f,
                "trip at position {} has id {}, expected {}",
                position,
                found,
                position + 1
            ),
            ProblemError::InvalidTripTimes(id) => {
                write!(f, "trip {} has an invalid start time or duration", id)
            }
            ProblemError::NoVehicleTypes => write!(f, "at least one vehicle type is required"),
            ProblemError::NonContiguousVehicleTypeIds { position, found } => write!(
                f,
                "vehicle type at position {} has id {}, expected {}",
                position,
                found,
                position + 1
            ),
            ProblemError::InvalidBatteryCapacity(k) => {
                write!(f, "vehicle type {} has a non-positive battery capacity", k)
            }
            ProblemError::InvalidChargingCurve(k) => {
                write!(f, "vehicle type {} has a malformed charging curve", k)
            }
            ProblemError::NoCostComponent => {
                write!(f, "at least one cost component must be considered")
            }
            ProblemError::PriceTableMismatch { expected, found } => write!(
                f,
                "time-of-use table has {} prices but there are {} time divisions",
                found, expected
            ),
            ProblemError::InvalidTimeGrid => {
                write!(f, "slot length and charge slot count must be positive")
            }
            ProblemError::NoTimeDivisions => {
                write!(f, "operating window does not contain any time division")
            }
            ProblemError::UnknownTimeDivision(r) => write!(f, "time division {} does not exist", r),
            ProblemError::UnknownTrip(id) => write!(f, "trip {} does not exist", id),
            ProblemError::UnknownVehicleType(k) => write!(f, "vehicle type {} does not exist", k),
            ProblemError::MalformedChain => {
                write!(f, "duty chain must start at the origin and end at the destination")
            }
            ProblemError::UnassignedCharging(id) => write!(
                f,
                "charging event after trip {} is not matched with a time division",
                id
            ),
            ProblemError::Io(err) => write!(f, "failed to read instance: {}", err),
            ProblemError::Parse(err) => write!(f, "failed to parse instance: {}", err),
        }
    }
}

impl std::error::Error for ProblemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProblemError::Io(err) => Some(err),
            ProblemError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ProblemError {
    fn from(err: io::Error) -> Self {
        ProblemError::Io(err)
    }
}

impl From<serde_json::Error> for ProblemError {
    fn from(err: serde_json::Error) -> Self {
        ProblemError::Parse(err)
    }
}

/// A run configuration that cannot drive the search.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroIterations,
    RemovalRange { min: usize, max: usize },
    Temperature(f64),
    CoolingRate(f64),
    ReactionFactor(f64),
    ChargeProbability(f64),
    ZeroSegmentLength,
    ZeroStagnationLength,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroIterations => write!(f, "iteration cap must be positive"),
            ConfigError::RemovalRange { min, max } => {
                write!(f, "removal range [{}, {}] is empty", min, max)
            }
            ConfigError::Temperature(t) => {
                write!(f, "initial temperature must be positive, got {}", t)
            }
            ConfigError::CoolingRate(a) => {
                write!(f, "cooling rate must lie in (0, 1), got {}", a)
            }
            ConfigError::ReactionFactor(r) => {
                write!(f, "reaction factor must lie in [0, 1], got {}", r)
            }
            ConfigError::ChargeProbability(p) => {
                write!(f, "charge probability must lie in [0, 1], got {}", p)
            }
            ConfigError::ZeroSegmentLength => write!(f, "segment length must be positive"),
            ConfigError::ZeroStagnationLength => write!(f, "stagnation window must be positive"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Any error raised while setting up a search.
#[derive(Debug)]
pub enum AlnsError {
    Problem(ProblemError),
    Config(ConfigError),
}

impl fmt::Display for AlnsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlnsError::Problem(err) => write!(f, "invalid problem instance: {}", err),
            AlnsError::Config(err) => write!(f, "invalid configuration: {}", err),
        }
    }
}

impl std::error::Error for AlnsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AlnsError::Problem(err) => Some(err),
            AlnsError::Config(err) => Some(err),
        }
    }
}

impl From<ProblemError> for AlnsError {
    fn from(err: ProblemError) -> Self {
        AlnsError::Problem(err)
    }
}

impl From<ConfigError> for AlnsError {
    fn from(err: ConfigError) -> Self {
        AlnsError::Config(err)
    }
}
