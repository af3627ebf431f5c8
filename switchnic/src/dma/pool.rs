//! Buffer pool management.
//!
//! Every buffer is allocated once at bring-up. `acquire` and `release` only
//! move buffers on and off a pre-sized LIFO free list, so neither allocates
//! nor blocks at steady state.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::error;

use super::buffer::PacketBuffer;
use crate::error::PoolExhausted;

/// Maximum number of buffers per pool (indices are `u16`).
pub const MAX_POOL_SIZE: usize = u16::MAX as usize;

/// Lock-free view of pool occupancy for diagnostics.
#[derive(Debug)]
pub struct PoolGauge {
    total: usize,
    free: AtomicUsize,
    exhaustions: AtomicU64,
}

impl PoolGauge {
    /// Total buffers owned by the pool.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Free buffers at the last pool operation.
    pub fn free(&self) -> usize {
        self.free.load(Ordering::Relaxed)
    }

    /// Number of `acquire` calls that found the pool empty.
    pub fn exhaustions(&self) -> u64 {
        self.exhaustions.load(Ordering::Relaxed)
    }
}

/// Pre-allocated packet buffer pool.
pub struct BufferPool {
    /// Free list (LIFO: most recently released buffer is handed out first).
    free: Vec<PacketBuffer>,
    /// Total number of buffers in pool.
    total: usize,
    /// Size of each buffer.
    buffer_size: usize,
    gauge: Arc<PoolGauge>,
}

impl BufferPool {
    /// Create a pool of `count` buffers of `buffer_size` bytes each.
    ///
    /// # Panics
    /// Panics if `count` exceeds [`MAX_POOL_SIZE`] or `buffer_size` is zero.
    /// Both are bring-up configuration errors caught by `EngineConfig::validate`.
    pub fn new(count: usize, buffer_size: usize) -> Self {
        assert!(count <= MAX_POOL_SIZE, "Pool size exceeds maximum");
        assert!(buffer_size > 0, "Buffer size must be positive");

        let mut free = Vec::with_capacity(count);
        // Push in reverse so index 0 is handed out first.
        for i in (0..count).rev() {
            free.push(PacketBuffer::new(i as u16, buffer_size));
        }

        Self {
            free,
            total: count,
            buffer_size,
            gauge: Arc::new(PoolGauge {
                total: count,
                free: AtomicUsize::new(count),
                exhaustions: AtomicU64::new(0),
            }),
        }
    }

    /// Take a buffer off the free list.
    ///
    /// Never blocks. On exhaustion the caller drops or defers; it must not
    /// spin waiting for a release.
    pub fn acquire(&mut self) -> Result<PacketBuffer, PoolExhausted> {
        match self.free.pop() {
            Some(mut buf) => {
                buf.mark_acquired();
                self.publish();
                Ok(buf)
            }
            None => {
                self.gauge.exhaustions.fetch_add(1, Ordering::Relaxed);
                Err(PoolExhausted)
            }
        }
    }

    /// Return a buffer to the free list.
    ///
    /// Releasing a buffer that is not in flight is a caller defect.
    pub fn release(&mut self, mut buf: PacketBuffer) {
        let foreign = buf.index() as usize >= self.total || buf.capacity() != self.buffer_size;
        if foreign || self.free.len() >= self.total {
            debug_assert!(false, "release of buffer {} not owned by this pool", buf.index());
            error!("[switchnic] pool: rejected release of foreign buffer {}", buf.index());
            // Never grow past the bring-up capacity.
            return;
        }
        buf.mark_free();
        self.free.push(buf);
        self.publish();
    }

    fn publish(&self) {
        self.gauge.free.store(self.free.len(), Ordering::Relaxed);
    }

    /// Shared occupancy gauge.
    pub fn gauge(&self) -> Arc<PoolGauge> {
        Arc::clone(&self.gauge)
    }

    /// Number of available (free) buffers.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Total number of buffers in pool.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Buffers currently attached to descriptors or held by callers.
    pub fn in_flight(&self) -> usize {
        self.total - self.free.len()
    }

    /// No free buffers.
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Every buffer is home.
    pub fn is_full(&self) -> bool {
        self.free.len() == self.total
    }

    /// Size of each buffer.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Indices of the buffers on the free list (diagnostics).
    pub fn free_indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.free.iter().map(|b| b.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::BufferOwnership;

    #[test]
    fn test_acquire_until_exhausted() {
        let mut pool = BufferPool::new(4, 256);
        let mut held = Vec::new();
        for _ in 0..4 {
            held.push(pool.acquire().unwrap());
        }
        assert_eq!(pool.acquire().unwrap_err(), PoolExhausted);
        assert_eq!(pool.gauge().exhaustions(), 1);
        assert_eq!(pool.in_flight(), 4);
        assert!(held.iter().all(|b| b.ownership() == BufferOwnership::Caller));

        for buf in held {
            pool.release(buf);
        }
        assert!(pool.is_full());
        assert_eq!(pool.gauge().free(), 4);
    }

    #[test]
    fn test_lifo_reuse() {
        let mut pool = BufferPool::new(8, 64);
        let a = pool.acquire().unwrap();
        assert_eq!(a.index(), 0);
        let idx = a.index();
        pool.release(a);
        assert_eq!(pool.acquire().unwrap().index(), idx);
    }

    #[test]
    fn test_conservation_across_exhaustion() {
        let mut pool = BufferPool::new(2, 64);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        for _ in 0..3 {
            assert!(pool.acquire().is_err());
            assert_eq!(pool.available() + 2, pool.total());
        }
        pool.release(b);
        pool.release(a);
        assert_eq!(pool.available(), pool.total());
    }
}
