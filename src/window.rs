//! Fixed-capacity FIFO of recent detections.

use crate::geometry::Quad;
use std::collections::VecDeque;

/// The most recent accepted quads, oldest first.
///
/// Pushing at capacity evicts the oldest sample. Capacity never changes
/// after construction.
#[derive(Debug, Clone)]
pub struct DetectionWindow {
    samples: VecDeque<Quad>,
    capacity: usize,
}

impl DetectionWindow {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, quad: Quad) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(quad);
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Snapshot of the current contents, oldest first.
    pub fn samples(&self) -> Vec<Quad> {
        self.samples.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quad> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&Quad> {
        self.samples.back()
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
