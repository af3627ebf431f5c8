//! Per-ring and engine-wide counters.
//!
//! All counters are relaxed atomics so a statistics reader never takes the
//! ring lock or perturbs the data path.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use super::rx::DropCause;

#[inline]
pub(crate) fn inc(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn add(counter: &AtomicU64, n: u64) {
    if n > 0 {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

#[inline]
fn get(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

/// Counters for one RX ring.
#[derive(Debug, Default)]
pub struct RxRingStats {
    pub(crate) delivered: AtomicU64,
    pub(crate) bytes: AtomicU64,
    pub(crate) drop_runt: AtomicU64,
    pub(crate) drop_oversize: AtomicU64,
    pub(crate) drop_null_buffer: AtomicU64,
    pub(crate) drop_hw_error: AtomicU64,
    /// Steps that found a completed slot but no buffer to refill it with.
    pub(crate) refill_stalls: AtomicU64,
}

impl RxRingStats {
    pub(crate) fn record_drop(&self, cause: DropCause) {
        match cause {
            DropCause::Runt => inc(&self.drop_runt),
            DropCause::Oversize => inc(&self.drop_oversize),
            DropCause::NullBuffer => inc(&self.drop_null_buffer),
            DropCause::HwError => inc(&self.drop_hw_error),
        }
    }

    pub fn snapshot(&self) -> RxRingSnapshot {
        RxRingSnapshot {
            delivered: get(&self.delivered),
            bytes: get(&self.bytes),
            drop_runt: get(&self.drop_runt),
            drop_oversize: get(&self.drop_oversize),
            drop_null_buffer: get(&self.drop_null_buffer),
            drop_hw_error: get(&self.drop_hw_error),
            refill_stalls: get(&self.refill_stalls),
        }
    }
}

/// Counters for one TX ring.
#[derive(Debug, Default)]
pub struct TxRingStats {
    pub(crate) sent: AtomicU64,
    pub(crate) bytes: AtomicU64,
    pub(crate) reclaimed: AtomicU64,
    /// Completions the device flagged as not sent.
    pub(crate) tx_errors: AtomicU64,
    pub(crate) ring_full: AtomicU64,
    pub(crate) pool_exhausted: AtomicU64,
    pub(crate) too_large: AtomicU64,
    pub(crate) hangs: AtomicU64,
    /// Buffers dropped unsent by a forced reinitialization.
    pub(crate) discarded: AtomicU64,
}

impl TxRingStats {
    pub fn snapshot(&self) -> TxRingSnapshot {
        TxRingSnapshot {
            sent: get(&self.sent),
            bytes: get(&self.bytes),
            reclaimed: get(&self.reclaimed),
            tx_errors: get(&self.tx_errors),
            ring_full: get(&self.ring_full),
            pool_exhausted: get(&self.pool_exhausted),
            too_large: get(&self.too_large),
            hangs: get(&self.hangs),
            discarded: get(&self.discarded),
            ..Default::default()
        }
    }
}

/// Ring set wide counters.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub(crate) interrupts: AtomicU64,
    pub(crate) spurious_interrupts: AtomicU64,
    pub(crate) passes: AtomicU64,
    pub(crate) lost_wakeups: AtomicU64,
    pub(crate) rx_runouts: AtomicU64,
    pub(crate) reinits: AtomicU64,
}

/// Point-in-time copy of one RX ring's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxRingSnapshot {
    pub delivered: u64,
    pub bytes: u64,
    pub drop_runt: u64,
    pub drop_oversize: u64,
    pub drop_null_buffer: u64,
    pub drop_hw_error: u64,
    pub refill_stalls: u64,
}

impl RxRingSnapshot {
    /// Drops of every cause.
    pub fn dropped(&self) -> u64 {
        self.drop_runt + self.drop_oversize + self.drop_null_buffer + self.drop_hw_error
    }
}

/// Point-in-time copy of one TX ring's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxRingSnapshot {
    pub sent: u64,
    pub bytes: u64,
    pub reclaimed: u64,
    pub tx_errors: u64,
    pub ring_full: u64,
    pub pool_exhausted: u64,
    pub too_large: u64,
    pub hangs: u64,
    pub discarded: u64,
    /// Queue stops and wakes from flow control.
    pub stops: u64,
    pub wakes: u64,
}

/// Point-in-time copy of every counter in a ring set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub rx: Vec<RxRingSnapshot>,
    pub tx: Vec<TxRingSnapshot>,
    pub interrupts: u64,
    pub spurious_interrupts: u64,
    pub passes: u64,
    /// Passes rescheduled because work arrived while re-arming.
    pub lost_wakeups: u64,
    pub rx_runouts: u64,
    pub reinits: u64,
    pub schedules: u64,
    /// Passes that ran out of budget.
    pub yields: u64,
    pub pool_free: usize,
    pub pool_total: usize,
    pub pool_exhaustions: u64,
}

impl EngineStats {
    pub(crate) fn fill(&self, snap: &mut EngineSnapshot) {
        snap.interrupts = get(&self.interrupts);
        snap.spurious_interrupts = get(&self.spurious_interrupts);
        snap.passes = get(&self.passes);
        snap.lost_wakeups = get(&self.lost_wakeups);
        snap.rx_runouts = get(&self.rx_runouts);
        snap.reinits = get(&self.reinits);
    }
}
