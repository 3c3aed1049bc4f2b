//! Recursive moving-average projection.

use super::ring::RingBuffer;

/// Project `horizon` months past the end of `history`.
///
/// The buffer is seeded with the last `window` observed values. Each step
/// emits `round(mean)` clamped to >= 0 and feeds the projection back into
/// the buffer, so later steps average over earlier projections.
pub fn project(history: &[f64], window: usize, horizon: u32) -> Vec<i64> {
    let mut ring = RingBuffer::from_slice(history, window);
    let mut out = Vec::with_capacity(horizon as usize);
    for _ in 0..horizon {
        let step = ring.mean().round().max(0.0) as i64;
        ring.push(step as f64);
        out.push(step);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projections_feed_back_into_the_average() {
        // [10, 20, 30]: mean 20 -> [20, 30, 20] mean 23.33 -> 23 ->
        // [30, 20, 23] mean 24.33 -> 24.
        assert_eq!(project(&[10.0, 20.0, 30.0], 3, 3), vec![20, 23, 24]);
    }

    #[test]
    fn flat_history_projects_flat() {
        assert_eq!(project(&[7.0; 12], 12, 4), vec![7; 4]);
    }

    #[test]
    fn empty_history_projects_zero() {
        assert_eq!(project(&[], 6, 3), vec![0, 0, 0]);
    }

    #[test]
    fn negative_means_clamp_to_zero() {
        assert_eq!(project(&[-5.0, -3.0], 2, 2), vec![0, 0]);
    }

    #[test]
    fn window_limits_the_seed() {
        // Only the last 2 values seed the buffer.
        assert_eq!(project(&[100.0, 10.0, 10.0], 2, 1), vec![10]);
    }
}
