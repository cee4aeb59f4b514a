//! Fixed-capacity circular sample buffer feeding strip charts
//!
//! One producer appends samples, one consumer takes snapshots on each render
//! tick. Both go through a single mutex; a snapshot copies the whole backing
//! array under the lock and releases it immediately so the producer never
//! waits on rasterization.

use std::ops::Range;

use parking_lot::Mutex;
use tr_core::Sample;

/// Smallest capacity a buffer will take
pub const MIN_CAPACITY: usize = 2;

/// Smallest power of two `>= max(requested, 2)`
pub fn coerce_capacity(requested: usize) -> usize {
    requested
        .max(MIN_CAPACITY)
        .checked_next_power_of_two()
        .unwrap_or(1 << (usize::BITS - 1))
}

/// Mutable ring state, only ever touched under the lock
#[derive(Debug, Clone)]
struct RingState {
    samples: Vec<Sample>,
    /// Slot of the most recently written sample
    head: usize,
    count: usize,
    last_timestamp: Option<i64>,
}

impl RingState {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: vec![Sample::default(); capacity],
            // First accepted sample lands in slot 0
            head: capacity - 1,
            count: 0,
            last_timestamp: None,
        }
    }

    fn reset(&mut self) {
        self.head = self.samples.len() - 1;
        self.count = 0;
        self.last_timestamp = None;
    }

    fn push(&mut self, value: f32, timestamp: i64) {
        if !value.is_finite() {
            return;
        }
        if matches!(self.last_timestamp, Some(last) if timestamp <= last) {
            return;
        }
        let mask = self.samples.len() - 1;
        self.head = (self.head + 1) & mask;
        self.samples[self.head] = Sample { timestamp, value };
        self.count = (self.count + 1).min(self.samples.len());
        self.last_timestamp = Some(timestamp);
    }
}

/// Lock-protected power-of-two ring of [`Sample`]s.
///
/// Samples with non-finite values or timestamps not strictly greater than
/// the last accepted one are dropped without error; callers can only observe
/// rejection through the buffer contents.
pub struct SampleRingBuffer {
    state: Mutex<RingState>,
}

impl SampleRingBuffer {
    /// Create a buffer; `capacity` is coerced with [`coerce_capacity`]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = coerce_capacity(capacity);
        tracing::debug!("Creating sample ring buffer with capacity {}", capacity);
        Self {
            state: Mutex::new(RingState::with_capacity(capacity)),
        }
    }

    /// Reallocate the backing array and reset head, count and last timestamp
    pub fn set_capacity(&self, capacity: usize) {
        let capacity = coerce_capacity(capacity);
        let mut state = self.state.lock();
        *state = RingState::with_capacity(capacity);
        drop(state);
        tracing::debug!("Ring buffer reallocated to capacity {}", capacity);
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().samples.len()
    }

    pub fn len(&self) -> usize {
        self.state.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of the most recently accepted sample
    pub fn last_timestamp(&self) -> Option<i64> {
        self.state.lock().last_timestamp
    }

    /// Append one sample, evicting the oldest once full
    pub fn add_sample(&self, value: f32, timestamp: i64) {
        self.state.lock().push(value, timestamp);
    }

    /// Append a batch of samples under a single lock acquisition
    pub fn add_samples(&self, samples: &[Sample]) {
        let mut state = self.state.lock();
        for sample in samples {
            state.push(sample.value, sample.timestamp);
        }
    }

    /// Drop all samples without reallocating
    pub fn clear(&self) {
        self.state.lock().reset();
    }

    /// Copy the backing array, head and count into `out`.
    ///
    /// `out` keeps its allocation across calls; after the first snapshot at a
    /// given capacity no further heap allocation happens.
    pub fn snapshot_into(&self, out: &mut RingSnapshot) {
        let state = self.state.lock();
        out.samples.clear();
        out.samples.extend_from_slice(&state.samples);
        out.head = state.head;
        out.count = state.count;
    }

    /// Convenience wrapper around [`SampleRingBuffer::snapshot_into`]
    pub fn snapshot(&self) -> RingSnapshot {
        let mut out = RingSnapshot::default();
        self.snapshot_into(&mut out);
        out
    }
}

/// A consumer-side copy of the ring, safe to read while the producer keeps
/// writing to the live buffer.
#[derive(Debug, Clone, Default)]
pub struct RingSnapshot {
    samples: Vec<Sample>,
    head: usize,
    count: usize,
}

impl RingSnapshot {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Sample at logical position `index`, 0 being the oldest
    pub fn get(&self, index: usize) -> Option<Sample> {
        if index >= self.count {
            return None;
        }
        let capacity = self.samples.len();
        let oldest = (self.head + capacity + 1 - self.count) & (capacity - 1);
        Some(self.samples[(oldest + index) & (capacity - 1)])
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<Sample> {
        self.count.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Samples oldest-first
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        (0..self.count).filter_map(move |i| self.get(i))
    }

    /// Logical index of the first sample with `timestamp >= tick`.
    ///
    /// Timestamps are strictly increasing in logical order, so this is a
    /// binary search.
    pub fn first_at_or_after(&self, tick: i64) -> usize {
        let (mut lo, mut hi) = (0, self.count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.get(mid) {
                Some(s) if s.timestamp < tick => lo = mid + 1,
                _ => hi = mid,
            }
        }
        lo
    }

    /// Write samples oldest-first into parallel tick/value arrays.
    ///
    /// Clears both vectors first and reuses their allocations.
    pub fn write_ordered(&self, ticks: &mut Vec<i64>, values: &mut Vec<f32>) {
        self.write_ordered_from(0, ticks, values);
    }

    /// Like [`RingSnapshot::write_ordered`] but only samples visible from
    /// `start_tick` on, plus the one sample before it so a line can enter the
    /// window from the left edge.
    pub fn write_window(&self, start_tick: i64, ticks: &mut Vec<i64>, values: &mut Vec<f32>) {
        self.write_ordered_from(self.window_range(start_tick).start, ticks, values);
    }

    /// Logical indices visible from `start_tick` on, including the one sample
    /// before it
    pub fn window_range(&self, start_tick: i64) -> Range<usize> {
        self.first_at_or_after(start_tick).saturating_sub(1)..self.count
    }

    /// Copy the samples at logical indices `range` into preallocated slices.
    ///
    /// Copies `min(range.len(), ticks.len(), values.len())` samples and
    /// returns that count.
    pub fn copy_range(&self, range: Range<usize>, ticks: &mut [i64], values: &mut [f32]) -> usize {
        let mut copied = 0;
        for ((i, tick), value) in range.zip(ticks.iter_mut()).zip(values.iter_mut()) {
            let Some(s) = self.get(i) else {
                break;
            };
            *tick = s.timestamp;
            *value = s.value;
            copied += 1;
        }
        copied
    }

    fn write_ordered_from(&self, first: usize, ticks: &mut Vec<i64>, values: &mut Vec<f32>) {
        ticks.clear();
        values.clear();
        for s in (first..self.count).filter_map(|i| self.get(i)) {
            ticks.push(s.timestamp);
            values.push(s.value);
        }
    }
}
