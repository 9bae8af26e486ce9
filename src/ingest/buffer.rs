use std::collections::VecDeque;

use crate::sensors::Sample;

/// Result of appending decoded samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Samples actually stored
    pub appended: usize,
    /// Samples dropped because the buffer had no room
    pub dropped: usize,
    /// Buffer length after the append
    pub len: usize,
}

/// Bounded, insertion-ordered sample queue for one (user, sensor) pair.
///
/// Never overwrites old samples: a full buffer refuses further appends until
/// a flush completes.
#[derive(Debug)]
pub struct SessionBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
    flush_in_flight: bool,
}

impl SessionBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(16_384)),
            capacity,
            flush_in_flight: false,
        }
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

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn flush_in_flight(&self) -> bool {
        self.flush_in_flight
    }

    /// Append as many samples as fit, in order
    pub fn append(&mut self, samples: &[Sample]) -> AppendOutcome {
        let room = self.capacity - self.samples.len();
        let appended = samples.len().min(room);
        self.samples.extend(samples[..appended].iter().copied());

        AppendOutcome {
            appended,
            dropped: samples.len() - appended,
            len: self.samples.len(),
        }
    }

    /// Snapshot the batch for relay if full and nobody else is relaying it
    pub fn begin_flush(&mut self) -> Option<Vec<Sample>> {
        if !self.is_full() || self.flush_in_flight {
            return None;
        }
        self.flush_in_flight = true;
        Some(self.snapshot())
    }

    /// Finish a flush started with `begin_flush`.
    ///
    /// On success the first `flushed` samples are removed; on failure the
    /// batch stays for the next fill-trigger.
    pub fn complete_flush(&mut self, flushed: usize, success: bool) {
        self.flush_in_flight = false;
        if success {
            let flushed = flushed.min(self.samples.len());
            self.samples.drain(..flushed);
        }
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }
}
