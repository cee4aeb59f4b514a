//! Sample buffering and scratch memory for the rendering engine

pub mod pool;
pub mod ring;

// Re-exports
pub use pool::{Checkout, PoolStats, ScratchPool, ScratchPools};
pub use ring::{coerce_capacity, RingSnapshot, SampleRingBuffer};
