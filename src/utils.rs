//! Utility functions and structures for reporting ALNS runs.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::problem::Problem;
use crate::solution::{CostBreakdown, Schedule};
use crate::Termination;

/// Format a duration as hours, minutes, and seconds.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}h {:02}m {:02}s", hours, minutes, seconds)
}

/// Save a schedule to a file, one duty per line.
pub fn save_schedule<P: AsRef<Path>>(
    schedule: &Schedule,
    problem: &Problem,
    path: P,
) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    let breakdown = schedule.cost_breakdown(problem);

    writeln!(file, "EVSP Schedule for instance: {}", problem.name)?;
    writeln!(file, "Total Cost: {:.2}", breakdown.total)?;
    writeln!(file, "Energy Feasible: {}", schedule.is_energy_feasible(problem))?;
    writeln!(file, "Capacity Feasible: {}", schedule.is_capacity_feasible(problem))?;
    writeln!(file, "Number of Duties: {}", schedule.len())?;
    writeln!(file)?;

    for (i, duty) in schedule.duties.iter().enumerate() {
        write!(file, "Duty #{} (type {}): ", i + 1, duty.vehicle_type)?;
        for (j, node) in duty.chain.iter().enumerate() {
            if j > 0 {
                write!(file, " -> ")?;
            }
            write!(file, "{}", node)?;
            if let Some(division) = node.charging().and_then(|trip| duty.charging.get(&trip)) {
                write!(file, "@r{}", division)?;
            }
        }
        writeln!(file)?;
        writeln!(file, "  Cost: {:.2}", duty.cost(problem))?;
    }

    Ok(())
}

/// Statistics about a finished search.
#[derive(Debug, Clone)]
pub struct SearchStatistics {
    pub iterations: usize,
    pub runtime: Duration,
    pub termination: Option<Termination>,
    pub best_cost: f64,
    pub breakdown: CostBreakdown,
    pub best_is_feasible: bool,
    pub duties: usize,
    pub charging_events: usize,
    pub final_temperature: f64,
}

impl SearchStatistics {
    /// Format the statistics as a string.
    pub fn format(&self) -> String {
        let termination = match self.termination {
            Some(Termination::IterationCap) => "iteration cap",
            Some(Termination::Stagnation) => "stagnation",
            None => "not run",
        };

        format!(
            "Search Statistics:
- Iterations: {}
- Runtime: {}
- Stopped By: {}
- Best Cost: {:.2}
  - Vehicles: {:.2}
  - Time: {:.2}
  - Electricity: {:.2}
- Best Schedule Feasible: {}
- Duties: {}
- Charging Events: {}
- Final Temperature: {:.4}",
            self.iterations,
            format_duration(self.runtime),
            termination,
            self.best_cost,
            self.breakdown.vehicle,
            self.breakdown.time,
            self.breakdown.electricity,
            self.best_is_feasible,
            self.duties,
            self.charging_events,
            self.final_temperature
        )
    }
}
