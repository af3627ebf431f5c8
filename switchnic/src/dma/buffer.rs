//! Packet buffer with ownership tracking.

use alloc::boxed::Box;
use alloc::vec;

use super::ownership::BufferOwnership;

/// A single fixed-capacity packet buffer.
///
/// Only [`BufferPool`](super::BufferPool) creates these, and the type is
/// deliberately not `Clone`: whoever holds the value is the one holder the
/// ownership invariant talks about.
pub struct PacketBuffer {
    /// Backing storage, sized once at pool construction.
    data: Box<[u8]>,
    /// Valid bytes.
    len: usize,
    /// Buffer index within the pool.
    index: u16,
    /// Current holder.
    ownership: BufferOwnership,
}

impl PacketBuffer {
    pub(crate) fn new(index: u16, capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            index,
            ownership: BufferOwnership::Pool,
        }
    }

    /// Valid bytes as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Whole backing storage, for filling before a send.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Set the number of valid bytes. Clamped to capacity.
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.data.len(), "length exceeds buffer capacity");
        self.len = len.min(self.data.len());
    }

    /// Copy `frame` in and zero-pad up to `pad_to` bytes.
    ///
    /// Returns the resulting length, or `None` if it would not fit.
    pub fn fill_from(&mut self, frame: &[u8], pad_to: usize) -> Option<usize> {
        let len = frame.len().max(pad_to);
        if len > self.data.len() {
            return None;
        }
        self.data[..frame.len()].copy_from_slice(frame);
        self.data[frame.len()..len].fill(0);
        self.len = len;
        Some(len)
    }

    /// Whole backing storage, regardless of `len`.
    pub(crate) fn storage(&self) -> &[u8] {
        &self.data
    }

    /// Device-visible address of the storage.
    ///
    /// Identity mapped: the CPU address doubles as the bus address.
    pub fn bus_addr(&self) -> u64 {
        self.data.as_ptr() as u64
    }

    /// Buffer index within its pool.
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current holder.
    pub fn ownership(&self) -> BufferOwnership {
        self.ownership
    }

    /// Pool -> Caller.
    pub(crate) fn mark_acquired(&mut self) {
        debug_assert!(self.ownership.is_free(), "buffer {} acquired twice", self.index);
        self.ownership = BufferOwnership::Caller;
        self.len = 0;
    }

    /// Caller -> Descriptor.
    pub(crate) fn mark_attached(&mut self) {
        debug_assert!(
            self.ownership.can_access(),
            "buffer {} attached while held by {:?}",
            self.index,
            self.ownership
        );
        self.ownership = BufferOwnership::Descriptor;
    }

    /// Descriptor -> Caller.
    pub(crate) fn mark_detached(&mut self) {
        debug_assert!(
            self.ownership.is_attached(),
            "buffer {} detached while held by {:?}",
            self.index,
            self.ownership
        );
        self.ownership = BufferOwnership::Caller;
    }

    /// Caller or Descriptor -> Pool.
    pub(crate) fn mark_free(&mut self) {
        debug_assert!(!self.ownership.is_free(), "buffer {} released twice", self.index);
        self.ownership = BufferOwnership::Pool;
        self.len = 0;
    }
}

impl core::fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PacketBuffer")
            .field("index", &self.index)
            .field("len", &self.len)
            .field("capacity", &self.data.len())
            .field("ownership", &self.ownership)
            .finish()
    }
}
