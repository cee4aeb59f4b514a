//! Scratch buffer pooling for sustained high-frequency rendering
//!
//! Render calls check working arrays out of a pool and hand them back when
//! the checkout is dropped, so steady-state frames do no heap allocation.
//! Buffers are grouped by power-of-two size class.

use std::ops::{Deref, DerefMut};

use ahash::AHashMap;
use parking_lot::Mutex;

/// Pool usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Checkouts served from a retained buffer
    pub hits: u64,
    /// Checkouts that had to allocate
    pub misses: u64,
    /// Buffers currently retained across all size classes
    pub retained: usize,
    /// Bytes currently retained across all size classes
    pub retained_bytes: usize,
}

struct PoolInner<T> {
    classes: AHashMap<usize, Vec<Vec<T>>>,
    stats: PoolStats,
}

/// Size-classed pool of `Vec<T>` working arrays
pub struct ScratchPool<T> {
    inner: Mutex<PoolInner<T>>,
    max_per_class: usize,
}

impl<T: Copy + Default + Send> ScratchPool<T> {
    /// Create a pool retaining at most `max_per_class` buffers per size class
    pub fn new(max_per_class: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                classes: AHashMap::new(),
                stats: PoolStats::default(),
            }),
            max_per_class,
        }
    }

    /// Check out a buffer of exactly `len` elements, all set to `T::default()`
    pub fn checkout(&self, len: usize) -> Checkout<'_, T> {
        let class = size_class(len);
        let reused = {
            let mut inner = self.inner.lock();
            let reused = inner.classes.get_mut(&class).and_then(|free| free.pop());
            if reused.is_some() {
                inner.stats.hits += 1;
                inner.stats.retained -= 1;
                inner.stats.retained_bytes -= class * std::mem::size_of::<T>();
            } else {
                inner.stats.misses += 1;
            }
            reused
        };

        let mut buf = reused.unwrap_or_else(|| Vec::with_capacity(class));
        buf.clear();
        buf.resize(len, T::default());
        Checkout { pool: self, buf, class }
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats.clone()
    }

    /// Drop every retained buffer
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.classes.clear();
        inner.stats.retained = 0;
        inner.stats.retained_bytes = 0;
    }

    fn give_back(&self, buf: Vec<T>, class: usize) {
        if buf.capacity() < class {
            return;
        }
        let mut inner = self.inner.lock();
        let free = inner.classes.entry(class).or_default();
        if free.len() >= self.max_per_class {
            return;
        }
        free.push(buf);
        inner.stats.retained += 1;
        inner.stats.retained_bytes += class * std::mem::size_of::<T>();
    }
}

fn size_class(len: usize) -> usize {
    len.max(1).checked_next_power_of_two().unwrap_or(len)
}

/// A buffer checked out from a [`ScratchPool`]; returned on drop
pub struct Checkout<'a, T: Copy + Default + Send> {
    pool: &'a ScratchPool<T>,
    buf: Vec<T>,
    class: usize,
}

impl<T: Copy + Default + Send> Deref for Checkout<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.buf
    }
}

impl<T: Copy + Default + Send> DerefMut for Checkout<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.buf
    }
}

impl<T: Copy + Default + Send> Drop for Checkout<'_, T> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf), self.class);
    }
}

/// The pools a renderer works out of
pub struct ScratchPools {
    /// Coordinates, geometry and staged GPU uploads
    pub floats: ScratchPool<f32>,
    /// Timestamps copied out of ring snapshots
    pub ticks: ScratchPool<i64>,
}

impl ScratchPools {
    pub fn new(max_per_class: usize) -> Self {
        Self {
            floats: ScratchPool::new(max_per_class),
            ticks: ScratchPool::new(max_per_class),
        }
    }
}

impl Default for ScratchPools {
    fn default() -> Self {
        Self::new(8)
    }
}
