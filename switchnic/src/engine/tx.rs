//! TX path.
//!
//! Fire-and-forget: `send` queues and rings the doorbell, `reclaim` collects
//! completions later. Every refusal is decided before anything is mutated,
//! so a caller that gets an error has lost nothing.

use log::{debug, error};

use super::stats::{add, inc};
use super::{RingSet, RingState};
use crate::device::{DeviceRegisters, RingId};
use crate::dma::{CacheSync, PacketBuffer};
use crate::error::{SendRejected, TxError};
use crate::flow::FlowEvent;
use crate::ring::DescStatus;

impl RingState {
    /// Take back every finished descriptor of TX ring `ring`.
    ///
    /// Bounded by the ring indices: a host-owned flag past the produce index
    /// is never taken.
    pub(crate) fn reclaim_tx<S: CacheSync + ?Sized>(&mut self, ring: usize, sync: &S) -> (usize, usize) {
        let tx = &mut self.tx[ring];
        let mut reclaimed = 0;
        let mut failed = 0;
        while let Ok(done) = tx.try_take_from_device(tx.consume_index(), sync) {
            if done.status.contains(DescStatus::TX_ERROR) {
                failed += 1;
            }
            match done.buffer {
                Some(buf) => self.pool.release(buf),
                None => error!("[switchnic] tx{}: slot {} completed without a buffer", ring, done.index),
            }
            reclaimed += 1;
        }
        (reclaimed, failed)
    }
}

impl<H: DeviceRegisters> RingSet<H> {
    fn check_tx_ring(&self, ring: usize) -> Result<(), TxError> {
        if self.is_down() {
            return Err(TxError::DeviceDown);
        }
        if ring >= self.tx_stats.len() {
            return Err(TxError::UnknownRing(ring));
        }
        Ok(())
    }

    /// Hand the slot at `index` to the device, update flow control, kick.
    fn queue_locked(
        &self,
        state: &mut RingState,
        ring: usize,
        index: u16,
        buffer: PacketBuffer,
    ) -> Result<u16, SendRejected> {
        let len = buffer.len();
        let tx = &mut state.tx[ring];
        if let Err(rejected) = tx.submit_to_device(index, buffer, len as u16, &self.hw) {
            error!("[switchnic] tx{}: slot {} refused: {}", ring, index, rejected.fault);
            return Err(SendRejected { error: TxError::RingFull, buffer: rejected.buffer });
        }
        let free = tx.free_slots();

        // Ownership flipped; now tell the device.
        self.hw.kick_device(RingId::Tx(ring as u8));

        let stats = &self.tx_stats[ring];
        inc(&stats.sent);
        add(&stats.bytes, len as u64);

        if let Some(FlowEvent::Stopped) = self.flow[ring].on_send(free) {
            debug!("[switchnic] tx{}: queue stopped, {} slots free", ring, free);
        }
        Ok(index)
    }

    /// Copy `frame` into a pool buffer and queue it on TX ring `ring`.
    ///
    /// Frames shorter than the minimum are zero-padded. Returns the
    /// descriptor index used.
    pub fn send(&self, ring: usize, frame: &[u8]) -> Result<u16, TxError> {
        self.check_tx_ring(ring)?;
        let max = self.config.max_frame_len;
        if frame.len() > max {
            inc(&self.tx_stats[ring].too_large);
            return Err(TxError::FrameTooLarge { len: frame.len(), max });
        }

        let mut state = self.inner.lock();
        // Shutdown may have reset the rings since the first check.
        if self.is_down() {
            return Err(TxError::DeviceDown);
        }
        let Some(index) = state.tx[ring].next_produce_index() else {
            inc(&self.tx_stats[ring].ring_full);
            return Err(TxError::RingFull);
        };
        let mut buffer = match state.pool.acquire() {
            Ok(buf) => buf,
            Err(_) => {
                inc(&self.tx_stats[ring].pool_exhausted);
                return Err(TxError::PoolExhausted);
            }
        };
        if buffer.fill_from(frame, self.config.min_frame_len).is_none() {
            state.pool.release(buffer);
            inc(&self.tx_stats[ring].too_large);
            return Err(TxError::FrameTooLarge { len: frame.len(), max: state.pool.buffer_size() });
        }

        self.queue_locked(&mut state, ring, index, buffer).map_err(|rejected| {
            state.pool.release(rejected.buffer);
            rejected.error
        })
    }

    /// Take an empty buffer for zero-copy [`send_buffer`](Self::send_buffer).
    pub fn alloc_tx_buffer(&self) -> Result<PacketBuffer, TxError> {
        if self.is_down() {
            return Err(TxError::DeviceDown);
        }
        self.inner.lock().pool.acquire().map_err(|_| TxError::PoolExhausted)
    }

    /// Queue a filled buffer on TX ring `ring` without copying.
    ///
    /// On refusal the buffer comes back in the error.
    pub fn send_buffer(&self, ring: usize, mut buffer: PacketBuffer) -> Result<u16, SendRejected> {
        if let Err(error) = self.check_tx_ring(ring) {
            return Err(SendRejected { error, buffer });
        }
        let max = self.config.max_frame_len;
        if buffer.len() > max {
            inc(&self.tx_stats[ring].too_large);
            return Err(SendRejected { error: TxError::FrameTooLarge { len: buffer.len(), max }, buffer });
        }

        let mut state = self.inner.lock();
        if self.is_down() {
            return Err(SendRejected { error: TxError::DeviceDown, buffer });
        }
        let Some(index) = state.tx[ring].next_produce_index() else {
            inc(&self.tx_stats[ring].ring_full);
            return Err(SendRejected { error: TxError::RingFull, buffer });
        };

        let len = buffer.len();
        let min = self.config.min_frame_len.min(buffer.capacity());
        if len < min {
            buffer.as_mut_slice()[len..min].fill(0);
            buffer.set_len(min);
        }
        self.queue_locked(&mut state, ring, index, buffer)
    }

    /// Collect finished descriptors of TX ring `ring` and return their
    /// buffers to the pool.
    ///
    /// Returns the number reclaimed; zero with nothing done if the device
    /// has completed nothing new.
    pub fn reclaim(&self, ring: usize) -> usize {
        if ring >= self.tx_stats.len() {
            return 0;
        }
        let mut state = self.inner.lock();
        let (reclaimed, failed) = state.reclaim_tx(ring, &self.hw);
        if reclaimed == 0 {
            return 0;
        }
        let free = state.tx[ring].free_slots();
        let event = self.flow[ring].on_reclaim(free);
        drop(state);

        let stats = &self.tx_stats[ring];
        add(&stats.reclaimed, reclaimed as u64);
        add(&stats.tx_errors, failed as u64);
        if let Some(FlowEvent::Woken) = event {
            debug!("[switchnic] tx{}: queue woken, {} slots free", ring, free);
        }
        reclaimed
    }

    /// Producer should hold off on TX ring `ring`.
    pub fn is_tx_stopped(&self, ring: usize) -> bool {
        self.flow.get(ring).is_some_and(|f| f.is_blocked())
    }
}
