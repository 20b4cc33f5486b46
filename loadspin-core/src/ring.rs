// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Fixed-capacity circular store of recent latency samples.
//!
//! Only the controller loop touches a ring, so there is no synchronisation
//! here. Once full, every push overwrites the oldest sample.

use std::time::Duration;

use crate::error::HardValidationError;

/// Default number of samples kept for scoring.
pub const DEFAULT_RING_CAPACITY: usize = 1000;

/// Circular latency buffer.
#[derive(Debug, Clone)]
pub struct LatencyRing {
    /// Backing storage; grows up to `capacity` and is then reused in place.
    samples: Vec<Duration>,
    /// Next slot to overwrite once the buffer is full.
    next: usize,
    capacity: usize,
}

impl LatencyRing {
    /// Create a ring holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Result<Self, HardValidationError> {
        if capacity == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "ring_capacity",
                value: "0".to_string(),
                reason: "Ring capacity cannot be zero".to_string(),
            });
        }

        Ok(Self {
            samples: Vec::with_capacity(capacity),
            next: 0,
            capacity,
        })
    }

    /// Record a sample in O(1).
    pub fn push(&mut self, sample: Duration) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.next] = sample;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    /// Copy out the current contents. Order is not meaningful.
    pub fn snapshot(&self) -> Vec<Duration> {
        self.samples.clone()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(LatencyRing::new(0).is_err());
    }

    #[test]
    fn test_partial_fill() {
        let mut ring = LatencyRing::new(4).unwrap();
        ring.push(ms(1));
        ring.push(ms(2));

        assert_eq!(ring.len(), 2);
        assert_eq!(ring.snapshot(), vec![ms(1), ms(2)]);
    }

    #[test]
    fn test_overwrites_oldest_when_full() {
        let capacity = 5;

        for k in [0, 1, 3, 7, 12] {
            let mut ring = LatencyRing::new(capacity).unwrap();
            let total = capacity as u64 + k;
            for i in 0..total {
                ring.push(ms(i));
            }

            let mut kept: Vec<u64> = ring
                .snapshot()
                .iter()
                .map(|d| d.as_millis() as u64)
                .collect();
            kept.sort_unstable();

            let expected: Vec<u64> = (total - capacity as u64..total).collect();
            assert_eq!(kept, expected, "k = {}", k);
        }
    }

    #[test]
    fn test_len_is_bounded_by_capacity() {
        let mut ring = LatencyRing::new(DEFAULT_RING_CAPACITY).unwrap();
        for pushes in 1..=2500u64 {
            ring.push(ms(pushes));
            assert_eq!(
                ring.snapshot().len(),
                std::cmp::min(pushes as usize, DEFAULT_RING_CAPACITY)
            );
        }
        assert_eq!(ring.capacity(), DEFAULT_RING_CAPACITY);
    }
}
