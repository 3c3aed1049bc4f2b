//! ABC value-concentration classification within one warehouse group.

use crate::domain::AbcClass;

/// Classify a warehouse group's entities by cumulative value share.
///
/// `totals` holds one accumulated value per entity; the returned labels are
/// aligned with the input order. Entities are ranked descending, the
/// cumulative share of the group total labels A up to `threshold_a`, B up
/// to `threshold_b`, C beyond.
///
/// Edge cases:
/// - Group total <= 0: every entity is C.
/// - Thresholds close enough that A and C both occur but B never does: the
///   first ranked entity whose cumulative share exceeds `threshold_a` is
///   relabeled B, so all three labels can appear when both extremes do.
pub fn classify_abc(totals: &[f64], threshold_a: f64, threshold_b: f64) -> Vec<AbcClass> {
    let total: f64 = totals.iter().sum();
    if total <= 0.0 {
        return vec![AbcClass::C; totals.len()];
    }

    // Rank descending; stable order for ties.
    let mut order: Vec<usize> = (0..totals.len()).collect();
    order.sort_by(|&a, &b| totals[b].partial_cmp(&totals[a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut labels = vec![AbcClass::C; totals.len()];
    let mut cumulative = 0.0;
    let mut first_past_a: Option<usize> = None;
    let mut has_a = false;
    let mut has_b = false;
    let mut has_c = false;

    for &idx in &order {
        cumulative += totals[idx] / total;
        let label = if cumulative <= threshold_a {
            has_a = true;
            AbcClass::A
        } else if cumulative <= threshold_b {
            has_b = true;
            AbcClass::B
        } else {
            has_c = true;
            AbcClass::C
        };
        if cumulative > threshold_a && first_past_a.is_none() {
            first_past_a = Some(idx);
        }
        labels[idx] = label;
    }

    if !has_b && has_a && has_c {
        if let Some(idx) = first_past_a {
            labels[idx] = AbcClass::B;
        }
    }

    labels
}
