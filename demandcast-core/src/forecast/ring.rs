//! Fixed-capacity ring buffer for the recursive moving average.

use std::collections::VecDeque;

/// Bounded FIFO of the most recent values; pushing at capacity evicts the
/// oldest entry.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: VecDeque<f64>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Seed from a slice, keeping only the last `capacity` values.
    pub fn from_slice(values: &[f64], capacity: usize) -> Self {
        let mut ring = Self::new(capacity);
        for &v in values {
            ring.push(v);
        }
        ring
    }

    pub fn push(&mut self, value: f64) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Mean of the buffered values; 0.0 when empty.
    pub fn mean(&self) -> f64 {
        if self.buf.is_empty() {
            return 0.0;
        }
        self.buf.iter().sum::<f64>() / self.buf.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_at_capacity_evicts_the_oldest() {
        let mut ring = RingBuffer::from_slice(&[1.0, 2.0, 3.0], 3);
        ring.push(4.0);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.mean(), 3.0);
    }

    #[test]
    fn seeding_keeps_only_the_tail() {
        let ring = RingBuffer::from_slice(&[9.0, 9.0, 1.0, 2.0], 2);
        assert_eq!(ring.mean(), 1.5);
    }

    #[test]
    fn empty_buffer_has_zero_mean() {
        assert_eq!(RingBuffer::new(4).mean(), 0.0);
    }
}
