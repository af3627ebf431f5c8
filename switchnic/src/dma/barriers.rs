//! Visibility barriers and cache maintenance.
//!
//! The CPU and the switch DMA engine are not cache coherent. Every ownership
//! transfer is bracketed:
//!
//! ```text
//! submit:  write data -> clean() -> dma_wmb() -> owner = DEVICE
//! reclaim: owner == HOST observed -> dma_rmb() -> invalidate() -> read data
//! ```
//!
//! On a coherent target `CacheSync` stays at its no-op defaults; the fences
//! still pin the compiler and CPU ordering.

use core::sync::atomic::{fence, Ordering};

/// Make all prior buffer and descriptor writes visible before the ownership
/// flag is handed to the device.
#[inline]
pub fn dma_wmb() {
    fence(Ordering::Release);
}

/// Order the ownership-flag read before any read of device-written data.
#[inline]
pub fn dma_rmb() {
    fence(Ordering::Acquire);
}

/// Cache maintenance around DMA.
pub trait CacheSync {
    /// Write back dirty lines covering `data` so the device sees them.
    #[inline]
    fn clean(&self, _data: &[u8]) {}

    /// Drop stale lines covering `data` before the CPU reads device writes.
    #[inline]
    fn invalidate(&self, _data: &[u8]) {}
}

/// Cache-coherent platform: nothing to maintain.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coherent;

impl CacheSync for Coherent {}
