//! Interrupt entry and the budgeted poll pass.
//!
//! # Re-arm order
//! A pass that runs out of work clears latched completions, reclaims TX once
//! more, goes `Idle`, unmasks, then looks once more for RX or TX work that
//! landed in between. Clearing before unmasking keeps a stale condition from
//! firing again forever; the final look catches a completion that was
//! cleared along with it.
//!
//! A pass that finds the engine shut down stops where it is and leaves rings
//! and masks as teardown left them.
//!
//! Masking always happens before `try_schedule`, so whichever context loses
//! the race is guaranteed that the winner unmasks later.

use log::trace;

use super::rx::RxStep;
use super::stats::inc;
use super::{PacketSink, RingSet};
use crate::device::{CompletionFlags, DeviceRegisters, RingId, MAX_RX_RINGS};

/// How a poll pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    /// Budget spent or new work found while re-arming; poll again.
    Reschedule,
    /// Work exhausted; completion signals re-armed.
    Complete,
    /// No pass was owed.
    NotScheduled,
}

/// Result of one call to [`RingSet::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Packets handed to the sink.
    pub delivered: usize,
    /// Invalid descriptors dropped and recycled.
    pub dropped: usize,
    /// TX descriptors reclaimed.
    pub reclaimed: usize,
    /// RX stopped on an empty pool; see [`RingSet::retry_stalled`].
    pub stalled: bool,
    pub status: PassStatus,
}

impl PollOutcome {
    fn new(status: PassStatus) -> Self {
        Self { delivered: 0, dropped: 0, reclaimed: 0, stalled: false, status }
    }

    /// Descriptors consumed against the budget.
    pub fn processed(&self) -> usize {
        self.delivered + self.dropped
    }
}

impl<H: DeviceRegisters> RingSet<H> {
    /// Interrupt entry.
    ///
    /// Masks completion signals and schedules a poll pass. Does no ring work.
    /// Returns `true` if this call scheduled the pass.
    pub fn handle_interrupt(&self) -> bool {
        inc(&self.stats.interrupts);
        let pending = self.hw.read_pending_completion_flags();
        if pending.is_empty() {
            inc(&self.stats.spurious_interrupts);
            return false;
        }
        if self.is_down() {
            return false;
        }
        self.mask_all();
        self.scheduler.try_schedule()
    }

    /// Run one budgeted pass, if one is scheduled.
    ///
    /// Reclaims every TX ring, then drains RX rings in priority order until
    /// `budget` descriptors are consumed or RX runs dry. A pass that runs dry
    /// reclaims TX again before re-arming. A `budget` of zero uses the
    /// configured one. Packets go to `sink` outside the ring lock, and the
    /// sink may call back into the engine, including [`RingSet::shutdown`].
    pub fn poll<S: PacketSink + ?Sized>(&self, budget: usize, sink: &mut S) -> PollOutcome {
        if !self.scheduler.begin_pass() {
            return PollOutcome::new(PassStatus::NotScheduled);
        }
        inc(&self.stats.passes);
        let budget = if budget == 0 { self.config.poll_budget } else { budget };
        let mut out = PollOutcome::new(PassStatus::Complete);

        for ring in 0..self.tx_stats.len() {
            out.reclaimed += self.reclaim(ring);
        }

        let mut recycled = [false; MAX_RX_RINGS];
        'rings: for ring in 0..self.rx_stats.len() {
            while out.processed() < budget {
                if self.is_down() {
                    break 'rings;
                }
                let step = self.inner.lock().rx_step(ring, &self.rx_bounds, &self.hw);
                match step {
                    RxStep::Empty => continue 'rings,
                    RxStep::Stalled => {
                        self.account_rx(ring, step);
                        out.stalled = true;
                        break 'rings;
                    }
                    RxStep::Dropped(_) => {
                        self.account_rx(ring, step);
                        out.dropped += 1;
                        recycled[ring] = true;
                    }
                    RxStep::Delivered(_) => {
                        recycled[ring] = true;
                        if let Some(packet) = self.account_rx(ring, step) {
                            out.delivered += 1;
                            sink.deliver(packet);
                        }
                    }
                }
            }
            // Budget spent.
            break;
        }

        // Torn down under us: leave rings and masks as shutdown left them.
        if self.is_down() {
            self.scheduler.complete_pass();
            return out;
        }

        for (ring, _) in recycled.iter().enumerate().filter(|(_, r)| **r) {
            self.hw.kick_device(RingId::Rx(ring as u8));
        }
        if !out.stalled {
            self.top_up_rx();
        }

        if out.processed() >= budget {
            if self.scheduler.yield_pass() {
                out.status = PassStatus::Reschedule;
                trace!("[switchnic] pass yielded after {}", out.processed());
            }
            return out;
        }

        let pending = self.clear_pending();
        if pending.contains(CompletionFlags::RX_RUNOUT) {
            inc(&self.stats.rx_runouts);
        }
        // TX completions latched during the RX drain were just cleared.
        for ring in 0..self.tx_stats.len() {
            out.reclaimed += self.reclaim(ring);
        }
        if !self.scheduler.complete_pass() {
            return out;
        }
        self.unmask_all();
        if self.is_down() {
            // Shutdown masked before we unmasked.
            self.mask_all();
            return out;
        }

        // A stalled pass re-arms and waits for retry_stalled() for RX.
        let rx_left = !out.stalled && self.rx_work_pending();
        if rx_left || self.tx_work_pending() {
            self.mask_all();
            if self.scheduler.try_schedule() {
                inc(&self.stats.lost_wakeups);
                out.status = PassStatus::Reschedule;
            }
        }
        out
    }

    /// Schedule a pass for RX work left behind by a refill stall.
    ///
    /// Call once buffers have gone back to the pool. Returns `true` if a pass
    /// was scheduled.
    pub fn retry_stalled(&self) -> bool {
        if self.is_down() || self.pool_gauge.free() == 0 || !self.rx_work_pending() {
            return false;
        }
        self.mask_all();
        self.scheduler.try_schedule()
    }

    fn rx_work_pending(&self) -> bool {
        let state = self.inner.lock();
        (0..state.rx.len()).any(|ring| state.rx_ready(ring))
    }

    fn tx_work_pending(&self) -> bool {
        let state = self.inner.lock();
        state.tx.iter().any(|tx| tx.is_completed(tx.consume_index()))
    }
}
