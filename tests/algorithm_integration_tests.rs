//! Integration tests for the full ALNS-EVSP algorithm.

use alns_evsp::config::Config;
use alns_evsp::error::{AlnsError, ConfigError};
use alns_evsp::insertion::InsertionOperator;
use alns_evsp::problem::{Instance, Problem, ProblemSettings, Trip, VehicleType};
use alns_evsp::removal::RemovalOperator;
use alns_evsp::utils::format_duration;
use alns_evsp::weights::Operator;
use alns_evsp::{AlnsAlgorithm, Termination};
use std::time::Duration;

/// Twenty trips on two routes spread over the morning.
fn create_moderate_problem() -> Problem {
    let trips = (1..=20)
        .map(|id| {
            let route = if id % 2 == 0 { "A" } else { "B" };
            let start = 360.0 + 25.0 * (id - 1) as f64;
            let duration = 40.0 + 5.0 * (id % 3) as f64;
            Trip::new(id, route, start, duration, 18.0 + (id % 4) as f64)
        })
        .collect();

    Problem::new(Instance {
        name: "ModerateTestProblem".to_string(),
        trips,
        vehicle_types: vec![
            VehicleType::new(1, 100.0, 800.0),
            VehicleType::new(2, 170.0, 900.0),
        ],
        settings: ProblemSettings {
            station_capacity: Some(2),
            ..ProblemSettings::default()
        },
    })
    .unwrap()
}

fn create_config(seed: u64) -> Config {
    Config::new()
        .with_max_iterations(600)
        .with_segment_length(50)
        .without_stagnation_check()
        .with_seed(seed)
}

#[test]
fn test_histories_track_every_iteration() {
    let problem = create_moderate_problem();
    let mut algorithm = AlnsAlgorithm::new(problem, create_config(1)).unwrap();
    algorithm.run();

    assert_eq!(algorithm.iterations, 600);
    assert_eq!(algorithm.termination, Some(Termination::IterationCap));
    assert_eq!(algorithm.current_cost_history.len(), algorithm.iterations);
    assert_eq!(algorithm.best_cost_history.len(), algorithm.iterations);

    // best cost never increases
    assert!(algorithm
        .best_cost_history
        .windows(2)
        .all(|w| w[1] <= w[0]));
    assert_eq!(algorithm.best_cost_history.last(), Some(&algorithm.best_cost));
}

#[test]
fn test_best_schedule_is_complete_and_feasible() {
    let problem = create_moderate_problem();
    let mut algorithm = AlnsAlgorithm::new(problem, create_config(2)).unwrap();
    let best = algorithm.run().clone();

    let mut trips = best.trip_ids();
    trips.sort_unstable();
    assert_eq!(trips, (1..=20).collect::<Vec<_>>());

    assert!(best.is_charging_consistent());
    assert!(best.is_energy_feasible(&algorithm.problem));
    assert!(best.is_capacity_feasible(&algorithm.problem));
    assert!((best.cost(&algorithm.problem) - algorithm.best_cost).abs() < 1e-6);
}

#[test]
fn test_search_does_not_worsen_initial_schedule() {
    let problem = create_moderate_problem();
    let mut algorithm = AlnsAlgorithm::new(problem, create_config(3)).unwrap();
    algorithm.initialize();
    let initial_cost = algorithm.best_cost;

    algorithm.run();

    assert!(algorithm.best_cost <= initial_cost);
}

#[test]
fn test_weight_history_per_segment() {
    let problem = create_moderate_problem();
    let mut algorithm = AlnsAlgorithm::new(problem, create_config(4)).unwrap();
    algorithm.run();

    // initial weight plus one entry per 50 iterations
    for &operator in RemovalOperator::ALL {
        assert_eq!(algorithm.weights.removal.history(operator).len(), 13);
    }
    for &operator in InsertionOperator::ALL {
        assert_eq!(algorithm.weights.insertion.history(operator).len(), 13);
    }
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let problem = create_moderate_problem();

    let mut first = AlnsAlgorithm::new(problem.clone(), create_config(42)).unwrap();
    first.run();
    let mut second = AlnsAlgorithm::new(problem, create_config(42)).unwrap();
    second.run();

    assert_eq!(first.best_cost, second.best_cost);
    assert_eq!(first.best_schedule, second.best_schedule);
    assert_eq!(first.current_cost_history, second.current_cost_history);
    assert_eq!(
        first.weights.removal.weights(),
        second.weights.removal.weights()
    );
}

#[test]
fn test_stagnation_stops_the_search() {
    let problem = create_moderate_problem();
    let config = Config::new()
        .with_max_iterations(20000)
        .with_segment_length(50)
        .with_stagnation_length(200)
        .with_seed(5);

    let mut algorithm = AlnsAlgorithm::new(problem, config).unwrap();
    algorithm.run();

    assert_eq!(algorithm.termination, Some(Termination::Stagnation));
    assert!(algorithm.iterations < 20000);
    assert_eq!(algorithm.iterations % 50, 0);

    let history = &algorithm.best_cost_history;
    assert_eq!(history[history.len() - 1], history[history.len() - 200]);
}

#[test]
fn test_night_charge_mode_never_charges() {
    let problem = create_moderate_problem();
    let config = create_config(6).with_night_charge_only(true);

    let mut algorithm = AlnsAlgorithm::new(problem, config).unwrap();
    let best = algorithm.run();

    assert_eq!(best.charging_count(), 0);
    assert!(algorithm
        .current_schedule
        .duties
        .iter()
        .all(|duty| duty.chain.iter().all(|node| !node.is_charging())));
}

#[test]
fn test_invalid_config_is_rejected() {
    let problem = create_moderate_problem();

    let config = Config::new().with_removal_range(5, 2);
    assert!(matches!(
        AlnsAlgorithm::new(problem.clone(), config),
        Err(AlnsError::Config(ConfigError::RemovalRange { min: 5, max: 2 }))
    ));

    let config = Config::new().with_cooling_rate(1.0);
    assert!(matches!(
        AlnsAlgorithm::new(problem.clone(), config),
        Err(AlnsError::Config(ConfigError::CoolingRate(_)))
    ));

    let config = Config::new().with_max_iterations(0);
    assert!(matches!(
        AlnsAlgorithm::new(problem, config),
        Err(AlnsError::Config(ConfigError::ZeroIterations))
    ));
}

#[test]
fn test_config_defaults() {
    let config = Config::default();

    assert_eq!(config.max_iterations, 15000);
    assert_eq!((config.min_removal, config.max_removal), (1, 10));
    assert_eq!(config.initial_temperature, 100.0);
    assert_eq!(config.cooling_rate, 0.9997);
    assert_eq!(config.reaction_factor, 0.5);
    assert_eq!(config.energy_penalty, 700.0);
    assert_eq!(config.capacity_penalty, 700.0);
    assert_eq!(config.charge_probability, 0.9);
    assert_eq!(config.segment_length, 100);
    assert!(config.terminate_on_stagnation);
    assert_eq!(config.stagnation_length, 2000);
    assert!(config.validate().is_ok());

    let config: Config = serde_json::from_str(r#"{"max_iterations": 50, "seed": 9}"#).unwrap();
    assert_eq!(config.max_iterations, 50);
    assert_eq!(config.seed, Some(9));
    assert_eq!(config.segment_length, 100);

    assert_eq!(
        Config::new().with_night_charge_only(true).effective_charge_probability(),
        0.0
    );
}

#[test]
fn test_statistics_summary() {
    let problem = create_moderate_problem();
    let mut algorithm = AlnsAlgorithm::new(problem, create_config(8)).unwrap();
    algorithm.run();

    let statistics = algorithm.statistics();
    assert_eq!(statistics.iterations, 600);
    assert_eq!(statistics.duties, algorithm.best_schedule.len());
    assert!(statistics.best_is_feasible);
    assert!((statistics.breakdown.total - algorithm.best_cost).abs() < 1e-6);

    let summary = statistics.format();
    assert!(summary.contains("Iterations: 600"));
    assert!(summary.contains("Stopped By: iteration cap"));
}

#[test]
fn test_format_duration() {
    assert_eq!(format_duration(Duration::from_secs(3725)), "1h 02m 05s");
    assert_eq!(format_duration(Duration::from_secs(59)), "0h 00m 59s");
}
