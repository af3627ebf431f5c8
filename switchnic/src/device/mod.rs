//! Device register interface.
//!
//! The engine drives the switch CPU port only through [`DeviceRegisters`].
//! Register encoding lives behind it; [`regs::CpuInterface`] is one
//! implementation over a plain 32-bit register accessor.

pub mod port;
pub mod regs;

use bitflags::bitflags;

use crate::dma::CacheSync;

pub use port::DevicePort;
pub use regs::{CpuInterface, Mmio, RegisterFile, RegisterIo};

/// Maximum RX rings (priority queues) per ring set.
pub const MAX_RX_RINGS: usize = 6;

/// Maximum TX rings per ring set.
pub const MAX_TX_RINGS: usize = 4;

/// Identifies one ring in a ring set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingId {
    Rx(u8),
    Tx(u8),
}

impl RingId {
    /// Completion flag raised when this ring finishes a descriptor.
    pub fn done_flag(&self) -> CompletionFlags {
        match *self {
            RingId::Rx(n) => CompletionFlags::rx_done(n as usize),
            RingId::Tx(n) => CompletionFlags::tx_done(n as usize),
        }
    }
}

bitflags! {
    /// Latched completion conditions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CompletionFlags: u32 {
        const RX_DONE_0 = 1 << 0;
        const RX_DONE_1 = 1 << 1;
        const RX_DONE_2 = 1 << 2;
        const RX_DONE_3 = 1 << 3;
        const RX_DONE_4 = 1 << 4;
        const RX_DONE_5 = 1 << 5;
        const TX_DONE_0 = 1 << 8;
        const TX_DONE_1 = 1 << 9;
        const TX_DONE_2 = 1 << 10;
        const TX_DONE_3 = 1 << 11;
        /// The device found no host-provided RX descriptor.
        const RX_RUNOUT = 1 << 16;
        const LINK_CHANGE = 1 << 20;
    }
}

impl CompletionFlags {
    /// RX done bit for ring `n`.
    pub fn rx_done(n: usize) -> Self {
        debug_assert!(n < MAX_RX_RINGS);
        Self::from_bits_truncate(1 << n)
    }

    /// TX done bit for ring `n`.
    pub fn tx_done(n: usize) -> Self {
        debug_assert!(n < MAX_TX_RINGS);
        Self::from_bits_truncate(1 << (8 + n))
    }

    /// Any RX ring completed.
    pub fn any_rx(&self) -> bool {
        self.bits() & 0x3F != 0
    }

    /// Any TX ring completed.
    pub fn any_tx(&self) -> bool {
        self.bits() & 0xF00 != 0
    }
}

/// Downstream register interface of the switch CPU port.
///
/// Calls are opaque to the engine. Implementations must make `kick_device`
/// a pulse: idempotent, and never disturbing unrelated enable bits.
pub trait DeviceRegisters: CacheSync + Send + Sync {
    /// Tell the device new descriptors are queued on `ring`.
    fn kick_device(&self, ring: RingId);

    /// Program the descriptor base address of `ring`. Resets the device's
    /// internal pointer for that ring to slot 0.
    fn configure_ring_base(&self, ring: RingId, base: u64);

    /// Stop `ring` from raising completion signals.
    fn mask_completion(&self, ring: RingId);

    /// Let `ring` raise completion signals again.
    fn unmask_completion(&self, ring: RingId);

    /// Latched completion conditions.
    fn read_pending_completion_flags(&self) -> CompletionFlags;

    /// Clear the given latched conditions.
    fn clear_pending_completion_flags(&self, flags: CompletionFlags);
}

impl<T: DeviceRegisters + ?Sized> DeviceRegisters for &T {
    fn kick_device(&self, ring: RingId) {
        (**self).kick_device(ring)
    }

    fn configure_ring_base(&self, ring: RingId, base: u64) {
        (**self).configure_ring_base(ring, base)
    }

    fn mask_completion(&self, ring: RingId) {
        (**self).mask_completion(ring)
    }

    fn unmask_completion(&self, ring: RingId) {
        (**self).unmask_completion(ring)
    }

    fn read_pending_completion_flags(&self) -> CompletionFlags {
        (**self).read_pending_completion_flags()
    }

    fn clear_pending_completion_flags(&self, flags: CompletionFlags) {
        (**self).clear_pending_completion_flags(flags)
    }
}

impl<T: CacheSync + ?Sized> CacheSync for &T {
    fn clean(&self, data: &[u8]) {
        (**self).clean(data)
    }

    fn invalidate(&self, data: &[u8]) {
        (**self).invalidate(data)
    }
}
