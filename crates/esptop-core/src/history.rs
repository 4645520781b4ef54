//! Fixed-capacity sample history feeding the sparklines.

use std::collections::VecDeque;

/// Samples kept for the processor graph.
pub const CPU_HISTORY: usize = 50;
/// Samples kept for the memory graph.
pub const MEMORY_HISTORY: usize = 50;
/// Samples kept for each network direction.
pub const NETWORK_HISTORY: usize = 60;

/// FIFO of samples that evicts the oldest entry once `capacity` is reached.
///
/// Contents are always chronological, oldest first.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl HistoryBuffer {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
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

/// The four tracked series.
#[derive(Debug, Clone)]
pub struct Histories {
    /// Aggregate processor load, percent.
    pub cpu: HistoryBuffer,
    /// Heap usage, percent.
    pub memory: HistoryBuffer,
    /// Download rate, KB/s.
    pub download: HistoryBuffer,
    /// Upload rate, KB/s.
    pub upload: HistoryBuffer,
}

impl Default for Histories {
    fn default() -> Self {
        Self {
            cpu: HistoryBuffer::new(CPU_HISTORY),
            memory: HistoryBuffer::new(MEMORY_HISTORY),
            download: HistoryBuffer::new(NETWORK_HISTORY),
            upload: HistoryBuffer::new(NETWORK_HISTORY),
        }
    }
}
