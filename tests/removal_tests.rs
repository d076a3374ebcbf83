//! Tests for the removal operators.

use alns_evsp::problem::{Instance, Node, Problem, ProblemSettings, Trip, VehicleType};
use alns_evsp::removal::{strip_trips, RemovalOperator};
use alns_evsp::solution::{Duty, Schedule};
use alns_evsp::weights::Operator;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

fn create_test_problem() -> Problem {
    let trips = (1..=8)
        .map(|id| Trip::new(id, "L1", 360.0 + 45.0 * (id - 1) as f64, 40.0, 20.0))
        .collect();

    Problem::new(Instance {
        name: "TestProblem".to_string(),
        trips,
        vehicle_types: vec![
            VehicleType::new(1, 100.0, 800.0),
            VehicleType::new(2, 170.0, 900.0),
        ],
        settings: ProblemSettings::default(),
    })
    .unwrap()
}

/// Two duties: `[o, 1, 2, 3, F3, 5, d]` charging in division 30, and `[o, 4, 6, 7, 8, d]`.
fn create_test_schedule(problem: &Problem) -> Schedule {
    let first = Duty::new(
        2,
        vec![
            Node::Origin,
            Node::Trip(1),
            Node::Trip(2),
            Node::Trip(3),
            Node::Charging(3),
            Node::Trip(5),
            Node::Destination,
        ],
        BTreeMap::from([(3, 30)]),
    );
    let second = Duty::new(
        2,
        vec![
            Node::Origin,
            Node::Trip(4),
            Node::Trip(6),
            Node::Trip(7),
            Node::Trip(8),
            Node::Destination,
        ],
        BTreeMap::new(),
    );
    Schedule::from_duties(problem, vec![first, second]).unwrap()
}

/// Bank and scheduled trips together cover every trip exactly once.
fn assert_partition(problem: &Problem, bank: &[usize], schedule: &Schedule) {
    let mut all: Vec<usize> = bank.to_vec();
    all.extend(schedule.trip_ids());
    all.sort_unstable();
    assert_eq!(all, problem.trip_ids().collect::<Vec<_>>());
}

#[test]
fn test_operator_names() {
    let names: Vec<_> = RemovalOperator::ALL.iter().map(|op| op.name()).collect();
    assert_eq!(
        names,
        vec!["random_removal", "time_related_removal", "neighbor_removal"]
    );
}

#[test]
fn test_zero_removal_keeps_schedule() {
    let problem = create_test_problem();
    let schedule = create_test_schedule(&problem);
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    for &operator in RemovalOperator::ALL {
        let (bank, reduced) = operator.apply(&problem, &schedule, 0, &mut rng);
        assert!(bank.is_empty());
        assert_eq!(reduced, schedule);
    }
}

#[test]
fn test_removal_partitions_trips() {
    let problem = create_test_problem();
    let schedule = create_test_schedule(&problem);

    for seed in 0..50 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for &operator in RemovalOperator::ALL {
            for n in 1..=10 {
                let (bank, reduced) = operator.apply(&problem, &schedule, n, &mut rng);
                assert_partition(&problem, &bank, &reduced);
                assert!(reduced.is_charging_consistent());
                // surviving duties are never degenerate
                assert!(reduced.duties.iter().all(|duty| duty.chain.len() > 4));
            }
        }
    }
}

#[test]
fn test_removal_does_not_modify_input() {
    let problem = create_test_problem();
    let schedule = create_test_schedule(&problem);
    let original = schedule.clone();
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    for &operator in RemovalOperator::ALL {
        let _ = operator.apply(&problem, &schedule, 4, &mut rng);
    }
    assert_eq!(schedule, original);
}

#[test]
fn test_random_removal_clamps_to_trip_count() {
    let problem = create_test_problem();
    let schedule = create_test_schedule(&problem);
    let mut rng = ChaCha8Rng::seed_from_u64(5);

    let (bank, reduced) = RemovalOperator::Random.apply(&problem, &schedule, 20, &mut rng);
    assert_eq!(bank.len(), 8);
    assert!(reduced.is_empty());
    assert!(reduced.charging.is_empty());
}

#[test]
fn test_time_related_removal_takes_closest_trip() {
    let problem = create_test_problem();
    let schedule = create_test_schedule(&problem);

    for seed in 0..20 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut bank = RemovalOperator::TimeRelated.apply(&problem, &schedule, 2, &mut rng).0;
        bank.truncate(2);

        // equal durations, so the closest trip is an adjacent one
        let gap = (problem.trip(bank[0]).start - problem.trip(bank[1]).start).abs();
        assert_eq!(gap, 45.0);
    }
}

#[test]
fn test_time_related_removal_stops_when_exhausted() {
    let problem = create_test_problem();
    let schedule = create_test_schedule(&problem);
    let mut rng = ChaCha8Rng::seed_from_u64(11);

    let (mut bank, reduced) = RemovalOperator::TimeRelated.apply(&problem, &schedule, 50, &mut rng);
    assert!(reduced.is_empty());
    bank.sort_unstable();
    assert_eq!(bank, (1..=8).collect::<Vec<_>>());
}

#[test]
fn test_neighbor_removal_takes_chain_neighbors() {
    let problem = create_test_problem();
    let schedule = create_test_schedule(&problem);

    for seed in 0..20 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (bank, reduced) = RemovalOperator::Neighbor.apply(&problem, &schedule, 1, &mut rng);

        // every trip has at least one neighbor in its duty
        assert!(bank.len() >= 2);
        assert_partition(&problem, &bank, &reduced);
    }
}

#[test]
fn test_random_removal_dissolves_single_trip_duty() {
    let problem = Problem::new(Instance {
        name: "SingleTrip".to_string(),
        trips: vec![Trip::new(1, "L1", 360.0, 40.0, 20.0)],
        vehicle_types: vec![VehicleType::new(1, 100.0, 800.0)],
        settings: ProblemSettings::default(),
    })
    .unwrap();
    let schedule = Schedule::from_duties(&problem, vec![Duty::with_trip(1, 1)]).unwrap();

    for seed in 0..5 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (bank, reduced) = RemovalOperator::Random.apply(&problem, &schedule, 1, &mut rng);

        assert!(reduced.is_empty());
        assert!(reduced.charging.is_empty());
        assert_eq!(bank, vec![1]);
    }
    // the input schedule is left untouched
    assert_eq!(schedule.len(), 1);
}

#[test]
fn test_strip_dissolves_short_duties() {
    let problem = create_test_problem();
    let mut schedule = create_test_schedule(&problem);

    // [o, 4, 6, 7, 8, d] keeps two trips and is dissolved
    let mut bank = vec![6, 7];
    strip_trips(&mut schedule, &mut bank);

    assert_eq!(schedule.len(), 1);
    assert_eq!(bank, vec![6, 7, 4, 8]);
    assert_partition(&problem, &bank, &schedule);
}

#[test]
fn test_strip_releases_charging() {
    let problem = create_test_problem();
    let mut schedule = create_test_schedule(&problem);

    let mut bank = vec![3];
    strip_trips(&mut schedule, &mut bank);

    assert_eq!(
        schedule.duties[0].chain,
        vec![
            Node::Origin,
            Node::Trip(1),
            Node::Trip(2),
            Node::Trip(5),
            Node::Destination
        ]
    );
    assert!(schedule.duties[0].charging.is_empty());
    assert!(schedule.charging.is_empty());
    assert_eq!(bank, vec![3]);
}

#[test]
fn test_seeded_removal_is_reproducible() {
    let problem = create_test_problem();
    let schedule = create_test_schedule(&problem);

    for &operator in RemovalOperator::ALL {
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        let first = operator.apply(&problem, &schedule, 3, &mut a);
        let second = operator.apply(&problem, &schedule, 3, &mut b);
        assert_eq!(first, second);
    }
}
