mod helpers;

use helpers::ModelBoard;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rankset::BucketedIndex;

/// Raises a customer to `target` through deltas no larger than one band.
fn raise(index: &BucketedIndex, customer_id: i64, target: i64) {
    let mut score = 0;
    while score < target {
        let step = (target - score).min(1000);
        score = index.update(customer_id, step);
    }
    assert_eq!(score, target);
}

#[test]
fn centered_window_spans_both_sides() {
    let index = BucketedIndex::new();
    for id in 1..=9 {
        index.update(id, id * 100);
    }
    let rows = index.ranks_by_customer(5, 2, 2);
    let ids: Vec<_> = rows.iter().map(|e| e.customer_id).collect();
    assert_eq!(ids, [7, 6, 5, 4, 3]);
    let ranks: Vec<_> = rows.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, [3, 4, 5, 6, 7]);
}

#[test]
fn window_clips_at_rank_one() {
    let index = BucketedIndex::new();
    for id in 1..=9 {
        index.update(id, id * 100);
    }
    let rows = index.ranks_by_customer(9, 5, 1);
    let ids: Vec<_> = rows.iter().map(|e| e.customer_id).collect();
    assert_eq!(ids, [9, 8]);
    assert_eq!(rows[0].rank, 1);
}

#[test]
fn window_clips_at_the_bottom() {
    let index = BucketedIndex::new();
    for id in 1..=9 {
        index.update(id, id * 100);
    }
    let rows = index.ranks_by_customer(1, 1, 5);
    let ids: Vec<_> = rows.iter().map(|e| e.customer_id).collect();
    assert_eq!(ids, [2, 1]);
    assert_eq!(rows.last().unwrap().rank, 9);
}

#[test]
fn zero_window_returns_only_the_customer() {
    let index = BucketedIndex::new();
    for id in 1..=9 {
        index.update(id, id * 100);
    }
    let rows = index.ranks_by_customer(4, 0, 0);
    assert_eq!(rows.len(), 1);
    assert_eq!((rows[0].customer_id, rows[0].score, rows[0].rank), (4, 400, 6));
}

#[test]
fn window_is_empty_for_non_positive_totals() {
    let index = BucketedIndex::new();
    index.update(1, 500);
    index.update(2, -300);
    index.update(3, 700);
    index.update(3, -700);
    assert!(index.ranks_by_customer(2, 3, 3).is_empty());
    assert!(index.ranks_by_customer(3, 3, 3).is_empty());
    assert!(index.ranks_by_customer(4, 3, 3).is_empty());
}

#[test]
fn upper_window_reaches_into_higher_bands() {
    let index = BucketedIndex::new();
    raise(&index, 1, 4_800);
    raise(&index, 2, 4_900);
    raise(&index, 3, 5_100);
    raise(&index, 4, 5_300);
    // Customer 2 sits in the first band; 3 and 4 sit beyond 5000.
    let rows = index.ranks_by_customer(2, 2, 1);
    let got: Vec<_> = rows.iter().map(|e| (e.customer_id, e.rank)).collect();
    assert_eq!(got, [(4, 1), (3, 2), (2, 3), (1, 4)]);
}

#[test]
fn lower_window_descends_across_bands() {
    let index = BucketedIndex::new();
    raise(&index, 1, 4_800);
    raise(&index, 2, 5_100);
    raise(&index, 3, 5_300);
    raise(&index, 4, 12_000);
    let rows = index.ranks_by_customer(4, 0, 3);
    let got: Vec<_> = rows.iter().map(|e| (e.customer_id, e.rank)).collect();
    assert_eq!(got, [(4, 1), (3, 2), (2, 3), (1, 4)]);
}

#[test]
fn oversized_window_returns_whole_board() {
    let index = BucketedIndex::new();
    raise(&index, 1, 2_000);
    raise(&index, 2, 30_000);
    raise(&index, 3, 600_000);
    let rows = index.ranks_by_customer(1, 1_000, 1_000);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].customer_id, 3);
    assert_eq!(rows[2].customer_id, 1);
}

#[test]
fn windows_match_model_under_random_spread() {
    let mut rng = StdRng::seed_from_u64(21);
    let index = BucketedIndex::new();
    let mut model = ModelBoard::default();
    for _ in 0..5_000 {
        let id = rng.gen_range(1..=300);
        let delta = rng.gen_range(-1000..=1000);
        index.update(id, delta);
        model.update(id, delta);
    }
    for _ in 0..200 {
        let id = rng.gen_range(1..=320);
        let high = rng.gen_range(0..=10);
        let low = rng.gen_range(0..=10);
        assert_eq!(
            index.ranks_by_customer(id, high, low),
            model.ranks_by_customer(id, high, low),
            "window for customer {id} high {high} low {low} diverged"
        );
    }
}
