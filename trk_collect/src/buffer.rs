use crate::error::BufferError;
use crate::interpolation::interpolate_samples;
use crate::sample::Sample;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use trk_clock::Timestamp;

pub const DEFAULT_CAPACITY: usize = 100;

/// How far outside the buffered span a lookup may land and still get the boundary sample.
pub const DEFAULT_TOLERANCE_S: f64 = 0.5;

/// Internal buffer holding the time ordered samples of one channel
#[derive(Debug)]
struct FrameBufferInternal {
    samples: VecDeque<Sample>,
    capacity: usize,
    tolerance: f64,
}

impl FrameBufferInternal {
    fn new(capacity: usize, tolerance: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            tolerance: tolerance.max(0.0),
        }
    }

    fn insert(&mut self, sample: Sample) -> Result<(), BufferError> {
        if let Some(last) = self.samples.back() {
            // NaN never compares, reject it along with older samples
            if !(sample.timestamp >= last.timestamp) {
                return Err(BufferError::OutOfOrderSample {
                    timestamp: sample.timestamp,
                    last: last.timestamp,
                });
            }
        }
        self.samples.push_back(sample);

        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        Ok(())
    }

    fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        match (self.samples.front(), self.samples.back()) {
            (Some(oldest), Some(newest)) => Some((oldest.timestamp, newest.timestamp)),
            _ => None,
        }
    }

    fn samples_in_range(&self, start: Timestamp, end: Timestamp) -> Vec<Sample> {
        self.samples
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .cloned()
            .collect()
    }

    fn get_by_time(&self, time: Timestamp, interpolate: bool) -> Result<Sample, BufferError> {
        let (oldest, newest) = self.time_range().ok_or(BufferError::BufferEmpty)?;

        let in_range = time >= oldest - self.tolerance && time <= newest + self.tolerance;
        if !in_range {
            return Err(BufferError::TimestampOutOfRange {
                timestamp: time,
                oldest,
                newest,
            });
        }

        let pos = self.samples.partition_point(|s| s.timestamp <= time);

        let closest = match pos {
            0 => &self.samples[0],

            p if p == self.samples.len() => &self.samples[p - 1],

            p => {
                let before = &self.samples[p - 1];
                let after = &self.samples[p];

                if before.timestamp == time {
                    before
                } else {
                    if interpolate {
                        if let Some(sample) = interpolate_samples(before, after, time) {
                            return Ok(sample);
                        }
                    }
                    if time - before.timestamp < after.timestamp - time {
                        before
                    } else {
                        after
                    }
                }
            }
        };
        Ok(closest.clone())
    }
}

/// Thread-safe handle on the samples of one channel.
///
/// Clones share the same storage, so a data source can keep pushing into the buffer while the
/// collector reads from it.
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    buffer: Arc<RwLock<FrameBufferInternal>>,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self::with_tolerance(capacity, DEFAULT_TOLERANCE_S)
    }

    pub fn with_tolerance(capacity: usize, tolerance: f64) -> Self {
        Self {
            buffer: Arc::new(RwLock::new(FrameBufferInternal::new(capacity, tolerance))),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, FrameBufferInternal> {
        self.buffer.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FrameBufferInternal> {
        self.buffer.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a sample, evicting the oldest one when full.
    /// A sample older than the newest one is rejected and the buffer is left untouched.
    pub fn insert(&self, sample: Sample) -> Result<(), BufferError> {
        self.write().insert(sample)
    }

    /// Get the sample closest to `time`, interpolated between its neighbours if asked and possible.
    pub fn get_by_time(&self, time: Timestamp, interpolate: bool) -> Result<Sample, BufferError> {
        self.read().get_by_time(time, interpolate)
    }

    /// Get the newest sample in the buffer
    pub fn latest(&self) -> Option<Sample> {
        self.read().samples.back().cloned()
    }

    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.read().samples.front().map(|s| s.timestamp)
    }

    pub fn newest_timestamp(&self) -> Option<Timestamp> {
        self.read().samples.back().map(|s| s.timestamp)
    }

    /// Get the (oldest, newest) timestamps of the buffered samples
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        self.read().time_range()
    }

    /// Get the samples within a closed time range
    pub fn samples_in_range(&self, start: Timestamp, end: Timestamp) -> Vec<Sample> {
        self.read().samples_in_range(start, end)
    }

    pub fn len(&self) -> usize {
        self.read().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.read().capacity
    }

    pub fn tolerance(&self) -> f64 {
        self.read().tolerance
    }

    pub fn clear(&self) {
        self.write().samples.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
