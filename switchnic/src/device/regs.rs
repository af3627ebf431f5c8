//! CPU interface register block.
//!
//! # Layout
//! ```text
//! Offset  Name       Content
//! 0x00    CPUICR     control: enables (bits 0-1), RX fetch (4), TX fetch per ring (8-11)
//! 0x04    CPUIIMR    completion mask, 1 = enabled (same bit layout as CPUIISR)
//! 0x08    CPUIISR    latched completions, write 1 to clear
//! 0x20    RXBASE(n)  RX ring n descriptor base, lo/hi words, stride 8
//! 0x60    TXBASE(n)  TX ring n descriptor base, lo/hi words, stride 8
//! ```
//!
//! Fetch bits are doorbells: the hardware clears them itself once it has
//! latched the request, so a kick is a read-modify-write that only ever sets
//! bits.
//!
//! # Safety
//! `Mmio` addresses must be valid, aligned, and mapped uncached.

use core::sync::atomic::{AtomicU32, Ordering};

use super::{CompletionFlags, DeviceRegisters, RingId, MAX_RX_RINGS, MAX_TX_RINGS};
use crate::dma::CacheSync;

pub const CPUICR: usize = 0x00;
pub const CPUIIMR: usize = 0x04;
pub const CPUIISR: usize = 0x08;
pub const RXBASE: usize = 0x20;
pub const TXBASE: usize = 0x60;

/// Size of the register block in bytes.
pub const REGISTER_SPAN: usize = 0x80;

pub const CPUICR_TX_ENABLE: u32 = 1 << 0;
pub const CPUICR_RX_ENABLE: u32 = 1 << 1;
pub const CPUICR_RX_FETCH: u32 = 1 << 4;

/// TX fetch doorbell for ring `n`.
#[inline]
pub const fn cpuicr_tx_fetch(n: usize) -> u32 {
    1 << (8 + n)
}

/// Every self-clearing doorbell bit.
pub const CPUICR_DOORBELLS: u32 = CPUICR_RX_FETCH | (0xF << 8);

#[inline]
fn rx_base(n: usize) -> usize {
    RXBASE + n * 8
}

#[inline]
fn tx_base(n: usize) -> usize {
    TXBASE + n * 8
}

/// 32-bit register accessor.
pub trait RegisterIo: Send + Sync {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
}

/// Memory-mapped register block.
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    /// `base` must point at a mapped, uncached register block of at least
    /// `REGISTER_SPAN` bytes that stays mapped for the lifetime of `Self`.
    pub unsafe fn new(base: usize) -> Self {
        Self { base }
    }
}

impl RegisterIo for Mmio {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        debug_assert!(offset < REGISTER_SPAN && offset % 4 == 0);
        // SAFETY: `new` contract; offset is inside the block.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        debug_assert!(offset < REGISTER_SPAN && offset % 4 == 0);
        // SAFETY: `new` contract; offset is inside the block.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}

const REGISTER_WORDS: usize = REGISTER_SPAN / 4;

/// In-memory model of the register block.
///
/// Behaves like the silicon where it matters to the engine: CPUIISR is
/// write-one-to-clear, and doorbell bits written to CPUICR are counted and
/// self-clear. Used for hosted runs and tests.
pub struct RegisterFile {
    words: [AtomicU32; REGISTER_WORDS],
    tx_kicks: [AtomicU32; MAX_TX_RINGS],
    rx_kicks: AtomicU32,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            words: core::array::from_fn(|_| AtomicU32::new(0)),
            tx_kicks: core::array::from_fn(|_| AtomicU32::new(0)),
            rx_kicks: AtomicU32::new(0),
        }
    }

    /// Latch completion conditions, as the device does on completion.
    pub fn raise(&self, flags: CompletionFlags) {
        self.words[CPUIISR / 4].fetch_or(flags.bits(), Ordering::SeqCst);
    }

    /// Doorbells rung for `ring` so far.
    pub fn kick_count(&self, ring: RingId) -> u32 {
        match ring {
            RingId::Tx(n) => self.tx_kicks[n as usize].load(Ordering::SeqCst),
            RingId::Rx(_) => self.rx_kicks.load(Ordering::SeqCst),
        }
    }

    /// Raw register value.
    pub fn peek(&self, offset: usize) -> u32 {
        self.words[offset / 4].load(Ordering::SeqCst)
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterIo for RegisterFile {
    fn read32(&self, offset: usize) -> u32 {
        self.words[offset / 4].load(Ordering::SeqCst)
    }

    fn write32(&self, offset: usize, value: u32) {
        match offset {
            CPUIISR => {
                self.words[CPUIISR / 4].fetch_and(!value, Ordering::SeqCst);
            }
            CPUICR => {
                for n in 0..MAX_TX_RINGS {
                    if value & cpuicr_tx_fetch(n) != 0 {
                        self.tx_kicks[n].fetch_add(1, Ordering::SeqCst);
                    }
                }
                if value & CPUICR_RX_FETCH != 0 {
                    self.rx_kicks.fetch_add(1, Ordering::SeqCst);
                }
                self.words[CPUICR / 4].store(value & !CPUICR_DOORBELLS, Ordering::SeqCst);
            }
            _ => self.words[offset / 4].store(value, Ordering::SeqCst),
        }
    }
}

/// `DeviceRegisters` over a CPU interface register block.
pub struct CpuInterface<R: RegisterIo> {
    io: R,
}

impl<R: RegisterIo> CpuInterface<R> {
    pub fn new(io: R) -> Self {
        Self { io }
    }

    /// Underlying register accessor.
    pub fn io(&self) -> &R {
        &self.io
    }

    /// Turn on both DMA directions, keeping every other control bit.
    pub fn enable(&self) {
        let ctrl = self.io.read32(CPUICR) & !CPUICR_DOORBELLS;
        self.io.write32(CPUICR, ctrl | CPUICR_TX_ENABLE | CPUICR_RX_ENABLE);
    }

    /// Turn off both DMA directions, keeping every other control bit.
    pub fn disable(&self) {
        let ctrl = self.io.read32(CPUICR) & !CPUICR_DOORBELLS;
        self.io.write32(CPUICR, ctrl & !(CPUICR_TX_ENABLE | CPUICR_RX_ENABLE));
    }

    /// Mask bits owned by `ring`. RX rings share the runout condition.
    fn ring_bits(ring: RingId) -> u32 {
        match ring {
            RingId::Rx(n) => (CompletionFlags::rx_done(n as usize) | CompletionFlags::RX_RUNOUT).bits(),
            RingId::Tx(n) => CompletionFlags::tx_done(n as usize).bits(),
        }
    }
}

impl<R: RegisterIo> CacheSync for CpuInterface<R> {}

impl<R: RegisterIo> DeviceRegisters for CpuInterface<R> {
    fn kick_device(&self, ring: RingId) {
        let bell = match ring {
            RingId::Tx(n) => cpuicr_tx_fetch(n as usize),
            RingId::Rx(_) => CPUICR_RX_FETCH,
        };
        // Never write back a stale doorbell; set only ours.
        let ctrl = self.io.read32(CPUICR) & !CPUICR_DOORBELLS;
        self.io.write32(CPUICR, ctrl | bell);
    }

    fn configure_ring_base(&self, ring: RingId, base: u64) {
        let offset = match ring {
            RingId::Rx(n) => {
                debug_assert!((n as usize) < MAX_RX_RINGS);
                rx_base(n as usize)
            }
            RingId::Tx(n) => {
                debug_assert!((n as usize) < MAX_TX_RINGS);
                tx_base(n as usize)
            }
        };
        self.io.write32(offset, base as u32);
        self.io.write32(offset + 4, (base >> 32) as u32);
    }

    fn mask_completion(&self, ring: RingId) {
        let imr = self.io.read32(CPUIIMR);
        self.io.write32(CPUIIMR, imr & !Self::ring_bits(ring));
    }

    fn unmask_completion(&self, ring: RingId) {
        let imr = self.io.read32(CPUIIMR);
        self.io.write32(CPUIIMR, imr | Self::ring_bits(ring));
    }

    fn read_pending_completion_flags(&self) -> CompletionFlags {
        CompletionFlags::from_bits_truncate(self.io.read32(CPUIISR))
    }

    fn clear_pending_completion_flags(&self, flags: CompletionFlags) {
        self.io.write32(CPUIISR, flags.bits());
    }
}
