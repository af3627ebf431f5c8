//! Descriptor ring shared with the switch DMA engine.
//!
//! ```text
//!        consume                 produce
//!           v                       v
//!   [ H ][ D ][ D ][ D ][ D ][ H ][ H ][ H ]
//!          \___ outstanding ___/
//! ```
//!
//! The host hands slots to the device at `produce` and takes them back at
//! `consume`, strictly in index order. Each index carries a lap bit that
//! flips when it wraps, so `produce == consume` is read as empty when the laps
//! match and full when they differ.
//!
//! The device walks the same slots with its own cursor. It only ever touches
//! device-owned slots and hands each one back by flipping the owner field.

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::descriptor::{DescStatus, Descriptor, Owner};
use crate::dma::{dma_rmb, dma_wmb, BufferPool, CacheSync, PacketBuffer};
use crate::error::{NotReady, Rejected, RingFault};

/// Smallest usable ring.
pub const MIN_RING_SIZE: u16 = 2;

/// Largest ring the descriptor index format allows.
pub const MAX_RING_SIZE: u16 = 4096;

/// A descriptor returned to the host.
#[derive(Debug)]
pub struct Completion {
    /// Slot the completion came from.
    pub index: u16,
    /// Buffer that was attached. `None` means the descriptor was corrupt.
    pub buffer: Option<PacketBuffer>,
    /// Length field as the device left it.
    pub length: u16,
    /// Status field as the device left it.
    pub status: DescStatus,
}

/// Fixed-size circular descriptor ring.
pub struct DescriptorRing {
    slots: Box<[Descriptor]>,
    /// Next slot the host hands to the device.
    produce: u16,
    /// Next slot the host takes back.
    consume: u16,
    produce_lap: bool,
    consume_lap: bool,
    /// Device-side cursor: next slot the DMA engine will process.
    device_cursor: u16,
}

impl DescriptorRing {
    /// Create a ring of `capacity` empty, host-owned descriptors.
    ///
    /// # Panics
    /// Panics if `capacity` is outside `MIN_RING_SIZE..=MAX_RING_SIZE`.
    pub fn new(capacity: u16) -> Self {
        assert!(
            (MIN_RING_SIZE..=MAX_RING_SIZE).contains(&capacity),
            "Ring size out of range"
        );

        let slots: Vec<Descriptor> = (0..capacity)
            .map(|i| Descriptor::new(i == capacity - 1))
            .collect();

        Self {
            slots: slots.into_boxed_slice(),
            produce: 0,
            consume: 0,
            produce_lap: false,
            consume_lap: false,
            device_cursor: 0,
        }
    }

    #[inline]
    fn advance(&self, index: u16) -> (u16, bool) {
        if index + 1 == self.capacity() {
            (0, true)
        } else {
            (index + 1, false)
        }
    }

    /// Number of descriptors.
    #[inline]
    pub fn capacity(&self) -> u16 {
        self.slots.len() as u16
    }

    /// Next slot the host will hand to the device.
    #[inline]
    pub fn produce_index(&self) -> u16 {
        self.produce
    }

    /// Next slot the host will take back.
    #[inline]
    pub fn consume_index(&self) -> u16 {
        self.consume
    }

    /// Slot a submit would use, or `None` if the ring is full.
    pub fn next_produce_index(&self) -> Option<u16> {
        if self.is_full() {
            None
        } else {
            Some(self.produce)
        }
    }

    /// Slots handed to the device and not yet taken back.
    pub fn outstanding(&self) -> usize {
        let cap = self.slots.len();
        let p = self.produce as usize;
        let c = self.consume as usize;
        if self.produce_lap == self.consume_lap {
            p - c
        } else {
            cap - c + p
        }
    }

    /// Slots available for submission.
    pub fn free_slots(&self) -> usize {
        self.slots.len() - self.outstanding()
    }

    /// No outstanding device work.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.produce == self.consume && self.produce_lap == self.consume_lap
    }

    /// No room to submit.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.produce == self.consume && self.produce_lap != self.consume_lap
    }

    /// Some submitted descriptor has not been taken back yet.
    #[inline]
    pub fn has_device_work(&self) -> bool {
        !self.is_empty()
    }

    /// Attach `buffer` to slot `index` and hand it to the device.
    ///
    /// `index` must be the produce index. `length` is clamped to the buffer
    /// capacity: RX passes the capacity, TX the frame length.
    ///
    /// On refusal nothing is modified and the buffer is handed back.
    pub fn submit_to_device<S: CacheSync + ?Sized>(
        &mut self,
        index: u16,
        mut buffer: PacketBuffer,
        length: u16,
        sync: &S,
    ) -> Result<(), Rejected> {
        let capacity = self.capacity();
        let fault = if index >= capacity {
            Some(RingFault::IndexOutOfRange { index, capacity })
        } else if self.is_full() {
            Some(RingFault::Full)
        } else if index != self.produce {
            Some(RingFault::OutOfOrder { index, expected: self.produce })
        } else {
            let slot = &self.slots[index as usize];
            if slot.buffer.is_some() || slot.owner() == Owner::Device {
                Some(RingFault::SlotBusy { index })
            } else {
                None
            }
        };
        if let Some(fault) = fault {
            return Err(Rejected { fault, buffer });
        }

        let length = (length as usize).min(buffer.capacity()) as u16;
        sync.clean(&buffer.storage()[..length as usize]);
        buffer.mark_attached();

        let slot = &mut self.slots[index as usize];
        slot.length = length;
        slot.status = DescStatus::empty();
        slot.buffer = Some(buffer);

        // Buffer and descriptor fields before the ownership flip.
        dma_wmb();
        slot.set_owner(Owner::Device);

        let (next, wrapped) = self.advance(index);
        self.produce = next;
        self.produce_lap ^= wrapped;
        Ok(())
    }

    /// The device has finished with slot `index` and it is the next one due.
    ///
    /// Side-effect free; safe to poll.
    #[inline]
    pub fn is_completed(&self, index: u16) -> bool {
        index == self.consume
            && !self.is_empty()
            && self.slots[index as usize].owner() == Owner::Host
    }

    /// Take slot `index` back from the device.
    ///
    /// Returns `NotReady` without touching anything if the slot is still
    /// device-owned, is not the consume index, or the ring has no outstanding
    /// work. Indices bound the walk; a stray host-owned flag past `produce`
    /// is never taken.
    pub fn try_take_from_device<S: CacheSync + ?Sized>(
        &mut self,
        index: u16,
        sync: &S,
    ) -> Result<Completion, NotReady> {
        if !self.is_completed(index) {
            return Err(NotReady);
        }

        // Ownership observed before any device-written field is read.
        dma_rmb();

        let slot = &mut self.slots[index as usize];
        let length = slot.length;
        let status = slot.status;
        let mut buffer = slot.buffer.take();
        slot.length = 0;
        slot.status = DescStatus::empty();

        if let Some(buf) = buffer.as_mut() {
            let visible = (length as usize).min(buf.capacity());
            sync.invalidate(&buf.storage()[..visible]);
            buf.mark_detached();
        }

        let (next, wrapped) = self.advance(index);
        self.consume = next;
        self.consume_lap ^= wrapped;

        Ok(Completion { index, buffer, length, status })
    }

    /// Drop every descriptor back to the empty, host-owned state.
    ///
    /// Attached buffers go back to `pool` regardless of owner. Only valid
    /// while the device is quiesced. Returns the number of buffers released.
    pub fn reset(&mut self, pool: &mut BufferPool) -> usize {
        let mut released = 0;
        for slot in self.slots.iter_mut() {
            slot.set_owner(Owner::Host);
            slot.length = 0;
            slot.status = DescStatus::empty();
            if let Some(buf) = slot.buffer.take() {
                pool.release(buf);
                released += 1;
            }
        }
        self.produce = 0;
        self.consume = 0;
        self.produce_lap = false;
        self.consume_lap = false;
        self.device_cursor = 0;
        released
    }

    /// Address of descriptor 0, programmed into the ring base register.
    pub fn base_address(&self) -> u64 {
        self.slots.as_ptr() as u64
    }

    /// Owner of slot `index`.
    pub fn owner_of(&self, index: u16) -> Option<Owner> {
        self.slots.get(index as usize).map(|d| d.owner())
    }

    /// Descriptor at `index` (read-only, diagnostics).
    pub fn descriptor(&self, index: u16) -> Option<&Descriptor> {
        self.slots.get(index as usize)
    }

    /// Indices of every buffer currently attached to a descriptor.
    pub fn buffer_indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.slots.iter().filter_map(|d| d.buffer_index())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Device side
    //
    // The DMA engine's view of the ring. Real hardware does this in silicon;
    // hardware models and tests drive it through `DevicePort`.
    // ───────────────────────────────────────────────────────────────────────

    /// Slot at the device cursor, if the device owns it.
    pub fn device_peek(&self) -> Option<u16> {
        let index = self.device_cursor;
        (self.slots[index as usize].owner() == Owner::Device).then_some(index)
    }

    /// Device-owned slots queued from the cursor onward.
    pub fn device_pending(&self) -> usize {
        let cap = self.slots.len();
        let mut index = self.device_cursor as usize;
        let mut count = 0;
        while count < cap && self.slots[index].owner() == Owner::Device {
            count += 1;
            index = (index + 1) % cap;
        }
        count
    }

    /// Buffer attached to a device-owned slot, for the device to write into.
    pub fn device_buffer_mut(&mut self, index: u16) -> Option<&mut PacketBuffer> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.owner() != Owner::Device {
            return None;
        }
        slot.buffer.as_mut()
    }

    /// Bytes the host queued in a device-owned slot.
    pub fn device_frame(&self, index: u16) -> Option<&[u8]> {
        let slot = self.slots.get(index as usize)?;
        if slot.owner() != Owner::Device {
            return None;
        }
        let buf = slot.buffer.as_ref()?;
        Some(&buf.storage()[..(slot.length as usize).min(buf.capacity())])
    }

    /// Write back `length` and `status` and return the slot to the host.
    ///
    /// Only the slot at the device cursor can complete. Returns `false` if
    /// `index` is not there or is not device-owned.
    pub fn device_complete(&mut self, index: u16, length: u16, status: DescStatus) -> bool {
        if index != self.device_cursor {
            return false;
        }
        let slot = &mut self.slots[index as usize];
        if slot.owner() != Owner::Device {
            return false;
        }
        slot.length = length;
        slot.status = status;
        dma_wmb();
        slot.set_owner(Owner::Host);
        self.device_cursor = (index + 1) % self.capacity();
        true
    }

    /// Detach a buffer behind the ring's back, as a corrupted descriptor would.
    #[cfg(test)]
    pub(crate) fn corrupt_detach(&mut self, index: u16) -> Option<PacketBuffer> {
        let mut buf = self.slots[index as usize].buffer.take()?;
        buf.mark_detached();
        Some(buf)
    }
}
