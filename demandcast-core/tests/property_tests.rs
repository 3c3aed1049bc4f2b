//! Property tests for series completion, segmentation, routing, and the
//! moving-average fallback.

use chrono::NaiveDate;
use demandcast_core::calendar::MonthWindow;
use demandcast_core::domain::{AbcClass, EntityKey, SeriesPoint};
use demandcast_core::forecast::project;
use demandcast_core::preparation::complete_months;
use demandcast_core::routing::split_known;
use demandcast_core::segmentation::classify_abc;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn month(index: u8) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, (index % 12) as u32 + 1, 1).unwrap()
}

fn entity(index: u8) -> EntityKey {
    EntityKey::new("CEMENT", "6012", "W001", format!("M{}", index % 8), "BAG")
}

fn sparse_points() -> impl Strategy<Value = Vec<SeriesPoint>> {
    prop::collection::vec(
        (0u8..12, 0u8..32, 0.0f64..1000.0),
        0..64,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .map(|(m, e, qty)| SeriesPoint::new(entity(e), month(m), qty))
            .collect()
    })
}

proptest! {
    #[test]
    fn completion_is_dense_over_the_window(points in sparse_points()) {
        let window = MonthWindow::new(month(0), month(11));
        let dense = complete_months(&points, &window);

        let keys: BTreeSet<String> = points.iter().map(|p| p.key.canonical()).collect();
        prop_assert_eq!(dense.len(), keys.len() * window.len());

        // Exactly one point per (entity, month), sorted.
        let mut seen = BTreeSet::new();
        for p in &dense {
            prop_assert!(window.contains(p.month));
            prop_assert!(seen.insert((p.key.canonical(), p.month)));
        }
    }

    #[test]
    fn completion_is_idempotent(points in sparse_points()) {
        let window = MonthWindow::new(month(0), month(11));
        let once = complete_months(&points, &window);
        let twice = complete_months(&once, &window);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn completion_preserves_window_totals(points in sparse_points()) {
        let window = MonthWindow::new(month(0), month(11));
        let dense = complete_months(&points, &window);
        let before: f64 = points
            .iter()
            .filter(|p| window.contains(p.month))
            .map(|p| p.qty)
            .sum();
        let after: f64 = dense.iter().map(|p| p.qty).sum();
        prop_assert!((before - after).abs() < 1e-6);
    }

    #[test]
    fn known_split_partitions_the_union(
        current in prop::collection::vec(0u8..16, 0..24),
        master in prop::collection::vec(0u8..16, 0..24),
    ) {
        let current: Vec<EntityKey> = current.into_iter().map(entity).collect();
        let master: Vec<EntityKey> = master.into_iter().map(entity).collect();
        let p = split_known(&current, &master);

        let mut all = BTreeSet::new();
        for k in p.known_active.iter().chain(&p.unknown).chain(&p.known_inactive) {
            // Disjoint: each canonical key appears in exactly one bucket.
            prop_assert!(all.insert(k.canonical()));
        }
        let union: BTreeSet<String> = current
            .iter()
            .chain(&master)
            .map(|k| k.canonical())
            .collect();
        prop_assert_eq!(all, union);
    }

    #[test]
    fn abc_labels_every_entity(totals in prop::collection::vec(0.0f64..10_000.0, 1..40)) {
        let labels = classify_abc(&totals, 0.80, 0.95);
        prop_assert_eq!(labels.len(), totals.len());
    }

    #[test]
    fn abc_zero_total_group_is_all_c(len in 1usize..40) {
        let labels = classify_abc(&vec![0.0; len], 0.80, 0.95);
        prop_assert!(labels.iter().all(|l| *l == AbcClass::C));
    }

    #[test]
    fn abc_class_a_never_appears_without_most_of_the_value(
        totals in prop::collection::vec(1.0f64..10_000.0, 2..40),
    ) {
        let labels = classify_abc(&totals, 0.80, 0.95);
        let total: f64 = totals.iter().sum();
        let a_value: f64 = totals
            .iter()
            .zip(&labels)
            .filter(|(_, l)| **l == AbcClass::A)
            .map(|(t, _)| t)
            .sum();
        // Every A entity sits inside the cumulative 80% band.
        prop_assert!(a_value / total <= 0.80 + 1e-9);
    }

    #[test]
    fn moving_average_output_is_nonnegative_and_sized(
        history in prop::collection::vec(-100.0f64..1000.0, 0..36),
        window in 1usize..24,
        horizon in 1u32..24,
    ) {
        let projected = project(&history, window, horizon);
        prop_assert_eq!(projected.len(), horizon as usize);
        prop_assert!(projected.iter().all(|v| *v >= 0));
    }

    #[test]
    fn moving_average_of_constant_history_is_constant(
        value in 0.0f64..1000.0,
        horizon in 1u32..24,
    ) {
        let history = vec![value.round(); 12];
        let projected = project(&history, 12, horizon);
        let expected = value.round() as i64;
        prop_assert!(projected.iter().all(|v| *v == expected));
    }
}
