//! Ring descriptor layout.
//!
//! One descriptor per ring slot. The owner field is the only word both sides
//! write; it is stored with `Release` and loaded with `Acquire` so it pairs
//! with the explicit barriers in `dma::barriers`.

use core::sync::atomic::{AtomicU8, Ordering};

use bitflags::bitflags;

use crate::dma::PacketBuffer;

/// Which side may touch the descriptor and its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Owner {
    Host = 0,
    Device = 1,
}

impl Owner {
    fn from_raw(raw: u8) -> Self {
        if raw == Owner::Device as u8 {
            Owner::Device
        } else {
            Owner::Host
        }
    }
}

bitflags! {
    /// Completion status written by the device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DescStatus: u16 {
        /// RX: frame check sequence mismatch.
        const CRC_ERROR = 1 << 0;
        /// RX: frame did not fit the attached buffer.
        const OVERRUN = 1 << 1;
        /// Bus error while moving the frame.
        const DMA_ERROR = 1 << 2;
        /// TX: frame was not put on the wire.
        const TX_ERROR = 1 << 3;
    }
}

impl DescStatus {
    /// Status bits that make an RX frame unusable.
    pub const RX_ERRORS: Self = Self::CRC_ERROR.union(Self::OVERRUN).union(Self::DMA_ERROR);
}

/// A single ring slot.
pub struct Descriptor {
    /// Current owner (`Owner` as u8).
    owner: AtomicU8,
    /// Attached buffer, if any.
    pub(super) buffer: Option<PacketBuffer>,
    /// TX: bytes to send. RX: bytes written by the device.
    pub(super) length: u16,
    /// Device-reported completion status.
    pub(super) status: DescStatus,
    /// Last slot of the ring; the device wraps to slot 0 after it.
    boundary: bool,
}

impl Descriptor {
    pub(super) fn new(boundary: bool) -> Self {
        Self {
            owner: AtomicU8::new(Owner::Host as u8),
            buffer: None,
            length: 0,
            status: DescStatus::empty(),
            boundary,
        }
    }

    /// Current owner.
    #[inline]
    pub fn owner(&self) -> Owner {
        Owner::from_raw(self.owner.load(Ordering::Acquire))
    }

    #[inline]
    pub(super) fn set_owner(&self, owner: Owner) {
        self.owner.store(owner as u8, Ordering::Release);
    }

    /// Ring wrap marker.
    pub fn is_boundary(&self) -> bool {
        self.boundary
    }

    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn status(&self) -> DescStatus {
        self.status
    }

    /// Index of the attached buffer, if any.
    pub fn buffer_index(&self) -> Option<u16> {
        self.buffer.as_ref().map(|b| b.index())
    }
}
