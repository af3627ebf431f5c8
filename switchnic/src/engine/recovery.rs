//! Watchdog and forced reinitialization.
//!
//! Recovery is destructive: a hung device will not complete what it holds,
//! so unreclaimed TX buffers are taken back unsent and every ring is rebuilt
//! from scratch.

use alloc::vec::Vec;

use log::{debug, warn};

use super::stats::{add, inc};
use super::{RingSet, RingState};
use crate::device::DeviceRegisters;
use crate::health::{HealthReport, Verdict};

impl<H: DeviceRegisters> RingSet<H> {
    /// One watchdog sample of every TX ring.
    ///
    /// Call on a fixed period, independent of traffic. Reinitializes the
    /// ring set if any TX ring is hung.
    pub fn watchdog_tick(&self) -> HealthReport {
        let samples: Vec<(u16, bool)> = {
            let state = self.inner.lock();
            state.tx.iter().map(|r| (r.consume_index(), r.has_device_work())).collect()
        };

        let (tick, verdicts) = {
            let mut health = self.health.lock();
            let tick = health.advance();
            let verdicts: Vec<Verdict> = samples
                .iter()
                .enumerate()
                .map(|(ring, &(consume, busy))| health.sample(ring, consume, busy))
                .collect();

            let hung: Vec<usize> = verdicts
                .iter()
                .enumerate()
                .filter(|(_, v)| **v == Verdict::Hung)
                .map(|(ring, _)| ring)
                .collect();
            if !hung.is_empty() {
                for &ring in &hung {
                    inc(&self.tx_stats[ring].hangs);
                }
                if let Some(suppressed) = health.log_permit() {
                    warn!(
                        "[switchnic] tx hang on rings {:?}, reinitializing ({} earlier reports suppressed)",
                        hung, suppressed
                    );
                }
            }
            (tick, verdicts)
        };

        let reinitialized = verdicts.contains(&Verdict::Hung) && !self.is_down();
        if reinitialized {
            self.reinitialize();
        }
        HealthReport { tick, verdicts, reinitialized }
    }

    /// Rebuild every ring from scratch.
    ///
    /// Masks completions, returns every descriptor-held buffer to the pool,
    /// reprograms ring bases, refills RX, clears latched completions and
    /// re-arms, unless a poll pass is still owed, which re-arms on its own.
    /// Flow control goes back to `Flowing`.
    pub fn reinitialize(&self) {
        if self.is_down() {
            return;
        }
        self.mask_all();
        {
            let mut state = self.inner.lock();
            if self.is_down() {
                return;
            }
            let RingState { rx, tx, pool } = &mut *state;
            for (ring, tx) in tx.iter_mut().enumerate() {
                add(&self.tx_stats[ring].discarded, tx.reset(pool) as u64);
            }
            for rx in rx.iter_mut() {
                rx.reset(pool);
            }
            self.rebuild(&mut state);
        }
        self.clear_pending();

        {
            let mut health = self.health.lock();
            for ring in 0..self.tx_stats.len() {
                health.reseed(ring, 0);
            }
        }
        for (ring, flow) in self.flow.iter().enumerate() {
            if flow.reset().is_some() {
                debug!("[switchnic] tx{}: queue woken by reinit", ring);
            }
        }
        inc(&self.stats.reinits);

        if self.scheduler.is_idle() {
            self.unmask_all();
        }
    }
}
