//! Packet buffer management.
//!
//! Ownership-tracked buffers, the pool that backs every ring, and the
//! barrier contract used around each host/device handoff.

pub mod barriers;
pub mod buffer;
pub mod ownership;
pub mod pool;

pub use barriers::{dma_rmb, dma_wmb, CacheSync, Coherent};
pub use buffer::PacketBuffer;
pub use ownership::BufferOwnership;
pub use pool::{BufferPool, PoolGauge, MAX_POOL_SIZE};
