//! Tests for roulette wheel selection and the adaptive weight update.

use alns_evsp::insertion::InsertionOperator;
use alns_evsp::removal::RemovalOperator;
use alns_evsp::weights::{OperatorWeights, Outcome, WeightTable};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn test_outcome_scores() {
    assert_eq!(Outcome::Reject.score(), 0.0);
    assert_eq!(Outcome::Accept.score(), 5.0);
    assert_eq!(Outcome::Better.score(), 15.0);
    assert_eq!(Outcome::Best.score(), 30.0);
}

#[test]
fn test_initial_weights() {
    let table: WeightTable<RemovalOperator> = WeightTable::new();

    assert_eq!(table.weights(), &[1.0, 1.0, 1.0]);
    assert_eq!(table.history(RemovalOperator::Neighbor), &[1.0]);
    assert_eq!(table.usage(RemovalOperator::Random), 0);
    assert_eq!(table.score(RemovalOperator::Random), 0.0);
}

#[test]
fn test_equal_weights_are_unbiased() {
    let mut table: WeightTable<RemovalOperator> = WeightTable::new();
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut counts = [0usize; 3];

    for _ in 0..30000 {
        match table.select(&mut rng) {
            RemovalOperator::Random => counts[0] += 1,
            RemovalOperator::TimeRelated => counts[1] += 1,
            RemovalOperator::Neighbor => counts[2] += 1,
        }
    }

    for count in counts {
        // expected 10000, standard deviation about 82
        assert!((9500..=10500).contains(&count), "count {} out of range", count);
    }
}

#[test]
fn test_selection_follows_weights() {
    let mut table: WeightTable<InsertionOperator> = WeightTable::new();
    table.set_weight(InsertionOperator::Random, 1.0);
    table.set_weight(InsertionOperator::Greedy, 3.0);
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let greedy = (0..20000)
        .filter(|_| table.select(&mut rng) == InsertionOperator::Greedy)
        .count();

    assert!((14500..=15500).contains(&greedy), "greedy picked {} times", greedy);
}

#[test]
fn test_zero_weight_is_never_selected() {
    let mut table: WeightTable<RemovalOperator> = WeightTable::new();
    table.set_weight(RemovalOperator::Random, 0.0);
    table.set_weight(RemovalOperator::Neighbor, 0.0);
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    for _ in 0..1000 {
        assert_eq!(table.select(&mut rng), RemovalOperator::TimeRelated);
        assert_eq!(table.selected(), RemovalOperator::TimeRelated);
    }
}

#[test]
fn test_all_zero_weights_fall_back_to_uniform() {
    let mut table: WeightTable<RemovalOperator> = WeightTable::new();
    for &operator in &[
        RemovalOperator::Random,
        RemovalOperator::TimeRelated,
        RemovalOperator::Neighbor,
    ] {
        table.set_weight(operator, 0.0);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    let mut seen = Vec::new();
    for _ in 0..300 {
        let operator = table.select(&mut rng);
        if !seen.contains(&operator) {
            seen.push(operator);
        }
    }
    assert_eq!(seen.len(), 3);
}

#[test]
fn test_weight_update() {
    let mut table: WeightTable<RemovalOperator> = WeightTable::new();
    table.set_weight(RemovalOperator::Random, 0.0);
    table.set_weight(RemovalOperator::Neighbor, 0.0);
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    table.select(&mut rng);
    table.record(Outcome::Best.score());
    table.select(&mut rng);
    table.record(Outcome::Accept.score());
    assert_eq!(table.usage(RemovalOperator::TimeRelated), 2);
    assert_eq!(table.score(RemovalOperator::TimeRelated), 35.0);

    table.update(0.5);

    // 1 * 0.5 + 0.5 * 35 / 2
    assert_eq!(table.weight(RemovalOperator::TimeRelated), 9.25);
    assert_eq!(table.history(RemovalOperator::TimeRelated), &[1.0, 9.25]);
    assert_eq!(table.usage(RemovalOperator::TimeRelated), 0);
    assert_eq!(table.score(RemovalOperator::TimeRelated), 0.0);
}

#[test]
fn test_unused_operator_keeps_weight() {
    let mut table: WeightTable<InsertionOperator> = WeightTable::new();

    table.update(0.5);
    table.update(0.5);

    assert_eq!(table.weights(), &[1.0, 1.0]);
    assert_eq!(table.history(InsertionOperator::Greedy), &[1.0, 1.0, 1.0]);
}

#[test]
fn test_reaction_factor_extremes() {
    let mut frozen: WeightTable<InsertionOperator> = WeightTable::new();
    let mut reactive: WeightTable<InsertionOperator> = WeightTable::new();
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let picked = frozen.select(&mut rng);
    frozen.record(Outcome::Better.score());
    frozen.update(0.0);
    assert_eq!(frozen.weight(picked), 1.0);

    let picked = reactive.select(&mut rng);
    reactive.record(Outcome::Better.score());
    reactive.update(1.0);
    assert_eq!(reactive.weight(picked), 15.0);
}

#[test]
fn test_operator_weights_credit_both_tables() {
    let mut weights = OperatorWeights::new(0.5);
    let mut rng = ChaCha8Rng::seed_from_u64(9);

    let removal = weights.select_removal(&mut rng);
    let insertion = weights.select_insertion(&mut rng);
    weights.record(Outcome::Better);

    assert_eq!(weights.removal.score(removal), 15.0);
    assert_eq!(weights.insertion.score(insertion), 15.0);
    assert_eq!(weights.removal.usage(removal), 1);
    assert_eq!(weights.insertion.usage(insertion), 1);

    weights.update_weights();

    assert_eq!(weights.removal.weight(removal), 8.0);
    assert_eq!(weights.insertion.weight(insertion), 8.0);
    assert_eq!(weights.removal.history(removal).len(), 2);
    assert_eq!(weights.insertion.history(insertion).len(), 2);
}
