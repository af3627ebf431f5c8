//! RX path.
//!
//! One step per completed descriptor, in consume order:
//!
//! ```text
//! check ownership -> refill -> take -> validate -> recycle -> emit | drop
//! ```
//!
//! The fresh buffer is acquired before the old one leaves the ring, so the
//! slot is never handed back to the device empty and never points at a
//! buffer the consumer holds. If the pool is empty the step stops before
//! touching the slot; the descriptor stays completed and a later step picks
//! it up.

use log::{debug, error, trace};

use super::stats::{add, inc};
use super::{RingSet, RingState, RxPacket};
use crate::device::{DeviceRegisters, RingId};
use crate::dma::{CacheSync, PacketBuffer};
use crate::ring::DescStatus;

/// Why a completed RX descriptor was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropCause {
    /// Shorter than the minimum frame.
    Runt,
    /// Longer than the maximum frame or the attached buffer.
    Oversize,
    /// Descriptor came back without a buffer.
    NullBuffer,
    /// Device flagged a CRC, overrun or bus error.
    HwError,
}

/// Accepted RX descriptor lengths, as the device reports them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RxBounds {
    pub min_wire: usize,
    pub max_wire: usize,
    pub fcs_len: usize,
}

impl RxBounds {
    fn classify(&self, buffer: Option<&PacketBuffer>, length: usize, status: DescStatus) -> Result<usize, DropCause> {
        let buf = buffer.ok_or(DropCause::NullBuffer)?;
        if status.intersects(DescStatus::RX_ERRORS) {
            return Err(DropCause::HwError);
        }
        if length > self.max_wire || length > buf.capacity() {
            return Err(DropCause::Oversize);
        }
        if length < self.min_wire {
            return Err(DropCause::Runt);
        }
        Ok(length - self.fcs_len)
    }
}

/// Outcome of one RX step.
#[derive(Debug)]
pub(crate) enum RxStep {
    /// Nothing completed at the consume index.
    Empty,
    /// A descriptor is ready but the pool is empty.
    Stalled,
    Delivered(RxPacket),
    Dropped(DropCause),
}

impl RingState {
    /// Process the descriptor at the consume index of RX ring `ring`.
    pub(crate) fn rx_step<S: CacheSync + ?Sized>(
        &mut self,
        ring: usize,
        bounds: &RxBounds,
        sync: &S,
    ) -> RxStep {
        let rx = &mut self.rx[ring];
        let index = rx.consume_index();
        if !rx.is_completed(index) {
            return RxStep::Empty;
        }

        let Ok(fresh) = self.pool.acquire() else {
            return RxStep::Stalled;
        };

        let done = match rx.try_take_from_device(index, sync) {
            Ok(done) => done,
            Err(_) => {
                self.pool.release(fresh);
                return RxStep::Empty;
            }
        };

        let verdict = bounds.classify(done.buffer.as_ref(), done.length as usize, done.status);

        // Recycle the slot before the old buffer goes anywhere.
        let produce = rx.produce_index();
        let capacity = fresh.capacity() as u16;
        if let Err(rejected) = rx.submit_to_device(produce, fresh, capacity, sync) {
            error!("[switchnic] rx{}: refill of slot {} refused: {}", ring, produce, rejected.fault);
            self.pool.release(rejected.buffer);
        }

        match (verdict, done.buffer) {
            (Ok(len), Some(mut buffer)) => {
                buffer.set_len(len);
                RxStep::Delivered(RxPacket { ring, buffer })
            }
            (Err(cause), buffer) => {
                trace!(
                    "[switchnic] rx{}: drop slot {} len {} status {:?}: {:?}",
                    ring, index, done.length, done.status, cause
                );
                if let Some(buffer) = buffer {
                    self.pool.release(buffer);
                }
                RxStep::Dropped(cause)
            }
            // classify() refuses a missing buffer.
            (Ok(_), None) => RxStep::Dropped(DropCause::NullBuffer),
        }
    }

    /// Hand buffers to RX ring `ring` until it is full or the pool is empty.
    pub(crate) fn fill_rx<S: CacheSync + ?Sized>(&mut self, ring: usize, sync: &S) -> usize {
        let rx = &mut self.rx[ring];
        let mut filled = 0;
        while let Some(index) = rx.next_produce_index() {
            let Ok(buf) = self.pool.acquire() else {
                break;
            };
            let capacity = buf.capacity() as u16;
            if let Err(rejected) = rx.submit_to_device(index, buf, capacity, sync) {
                error!("[switchnic] rx{}: prefill of slot {} refused: {}", ring, index, rejected.fault);
                self.pool.release(rejected.buffer);
                break;
            }
            filled += 1;
        }
        filled
    }

    /// RX ring `ring` has a completed descriptor waiting.
    pub(crate) fn rx_ready(&self, ring: usize) -> bool {
        let rx = &self.rx[ring];
        rx.is_completed(rx.consume_index())
    }
}

impl<H: DeviceRegisters> RingSet<H> {
    /// Count one RX step and pass out the packet, if any.
    pub(crate) fn account_rx(&self, ring: usize, step: RxStep) -> Option<RxPacket> {
        let stats = &self.rx_stats[ring];
        match step {
            RxStep::Delivered(pkt) => {
                inc(&stats.delivered);
                add(&stats.bytes, pkt.len() as u64);
                Some(pkt)
            }
            RxStep::Dropped(cause) => {
                stats.record_drop(cause);
                None
            }
            RxStep::Stalled => {
                inc(&stats.refill_stalls);
                None
            }
            RxStep::Empty => None,
        }
    }

    /// Fill every RX ring and ring the RX doorbell for those that took
    /// buffers. Returns the number of empty slots left behind.
    pub(crate) fn fill_all_rx(&self, state: &mut RingState) -> usize {
        if self.is_down() {
            return 0;
        }
        let mut shortfall = 0;
        for ring in 0..state.rx.len() {
            if state.fill_rx(ring, &self.hw) > 0 {
                self.hw.kick_device(RingId::Rx(ring as u8));
            }
            shortfall += state.rx[ring].free_slots();
        }
        shortfall
    }

    /// Take the next valid packet from RX ring `ring`.
    ///
    /// Usable without the scheduler. Invalid descriptors on the way are
    /// dropped and recycled. Returns `None` when the ring is drained, the
    /// pool is empty, or the ring set is down.
    ///
    /// The packet's buffer stays valid until it is handed back with
    /// [`release`](Self::release).
    pub fn receive(&self, ring: usize) -> Option<RxPacket> {
        if self.is_down() || ring >= self.rx_stats.len() {
            return None;
        }
        let mut recycled = false;
        let mut packet = None;
        {
            let mut state = self.inner.lock();
            let budget = state.rx[ring].capacity() as usize;
            for _ in 0..budget {
                let step = state.rx_step(ring, &self.rx_bounds, &self.hw);
                let more = matches!(step, RxStep::Dropped(_));
                recycled |= matches!(step, RxStep::Delivered(_) | RxStep::Dropped(_));
                packet = self.account_rx(ring, step);
                if packet.is_some() || !more {
                    break;
                }
            }
        }
        if recycled {
            self.hw.kick_device(RingId::Rx(ring as u8));
        }
        packet
    }

    /// Hand a received packet's buffer back to the pool.
    pub fn release(&self, packet: RxPacket) {
        self.release_buffer(packet.into_buffer());
    }

    /// Hand any buffer taken from this ring set back to the pool.
    pub fn release_buffer(&self, buffer: PacketBuffer) {
        self.inner.lock().pool.release(buffer);
    }

    /// Top up every RX ring after a pass; logs if the pool could not cover
    /// them.
    pub(crate) fn top_up_rx(&self) {
        let mut state = self.inner.lock();
        if self.is_down() {
            return;
        }
        let missing: usize = state.rx.iter().map(|r| r.free_slots()).sum();
        if missing == 0 {
            return;
        }
        let left = self.fill_all_rx(&mut state);
        if left > 0 && left == missing {
            debug!("[switchnic] rx: {} slots without buffers, pool empty", left);
        }
    }
}
