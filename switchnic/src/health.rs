//! TX hang detection.
//!
//! Sampled on a fixed watchdog tick, independent of packet activity. A TX
//! ring whose consume index stays put for `K` consecutive samples while it
//! still has device work is hung; the ring set then reinitializes.
//!
//! Time is counted in watchdog ticks so the monitor needs no clock source.

use alloc::vec::Vec;

/// Outcome of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No outstanding work.
    Idle,
    /// The consume index moved since the last sample.
    Progressing,
    /// Unchanged for this many consecutive samples, below the threshold.
    Stalled(u32),
    /// Unchanged for the threshold; the caller must reinitialize.
    Hung,
}

/// Stall counter for one TX ring.
#[derive(Debug, Clone)]
pub struct StallDetector {
    last: u16,
    stalled: u32,
    threshold: u32,
}

impl StallDetector {
    pub fn new(threshold: u32, consume: u16) -> Self {
        debug_assert!(threshold > 0);
        Self { last: consume, stalled: 0, threshold }
    }

    /// Forget history and start from `consume`.
    pub fn seed(&mut self, consume: u16) {
        self.last = consume;
        self.stalled = 0;
    }

    /// Record one sample of the consume index.
    ///
    /// The count is of samples equal to the previous one, so `Hung` comes on
    /// the `threshold`-th repeat. The index seeded by [`new`](Self::new) or
    /// [`seed`](Self::seed) counts as the first value: from bring-up it takes
    /// `threshold` samples, but right after a `Progressing` sample it takes
    /// `threshold + 1` samples at the new index.
    pub fn sample(&mut self, consume: u16, has_work: bool) -> Verdict {
        if !has_work {
            self.seed(consume);
            return Verdict::Idle;
        }
        if consume != self.last {
            self.seed(consume);
            return Verdict::Progressing;
        }
        self.stalled += 1;
        if self.stalled >= self.threshold {
            // Reported once; the count restarts whether or not the ring resets.
            self.stalled = 0;
            Verdict::Hung
        } else {
            Verdict::Stalled(self.stalled)
        }
    }

    /// Consecutive unchanged samples so far.
    pub fn stalled(&self) -> u32 {
        self.stalled
    }
}

/// Tick-based log limiter.
///
/// Lets one entry through per `interval` ticks and counts the rest so the
/// next emitted entry can report them.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: u64,
    last: Option<u64>,
    suppressed: u64,
}

impl RateLimiter {
    pub fn new(interval: u64) -> Self {
        Self { interval, last: None, suppressed: 0 }
    }

    /// `Some(suppressed)` if an entry may be emitted at `now`.
    pub fn check(&mut self, now: u64) -> Option<u64> {
        let open = match self.last {
            None => true,
            Some(last) => now.wrapping_sub(last) >= self.interval,
        };
        if open {
            self.last = Some(now);
            Some(core::mem::take(&mut self.suppressed))
        } else {
            self.suppressed += 1;
            None
        }
    }
}

/// Watchdog state for a ring set.
#[derive(Debug)]
pub struct HealthMonitor {
    detectors: Vec<StallDetector>,
    limiter: RateLimiter,
    tick: u64,
}

impl HealthMonitor {
    /// One detector per TX ring, seeded at consume index 0.
    pub fn new(tx_rings: usize, threshold: u32, log_interval: u64) -> Self {
        Self {
            detectors: (0..tx_rings).map(|_| StallDetector::new(threshold, 0)).collect(),
            limiter: RateLimiter::new(log_interval),
            tick: 0,
        }
    }

    /// Advance the watchdog clock by one tick.
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn now(&self) -> u64 {
        self.tick
    }

    /// Sample TX ring `ring`.
    pub fn sample(&mut self, ring: usize, consume: u16, has_work: bool) -> Verdict {
        match self.detectors.get_mut(ring) {
            Some(d) => d.sample(consume, has_work),
            None => Verdict::Idle,
        }
    }

    /// Restart detection for `ring` at `consume`.
    pub fn reseed(&mut self, ring: usize, consume: u16) {
        if let Some(d) = self.detectors.get_mut(ring) {
            d.seed(consume);
        }
    }

    /// Whether a hang log entry may go out now, with the suppressed count.
    pub fn log_permit(&mut self) -> Option<u64> {
        self.limiter.check(self.tick)
    }

    pub fn detector(&self, ring: usize) -> Option<&StallDetector> {
        self.detectors.get(ring)
    }
}

/// Result of one watchdog tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Watchdog tick this report belongs to.
    pub tick: u64,
    /// Verdict per TX ring.
    pub verdicts: Vec<Verdict>,
    /// A hang was found and the ring set was reinitialized.
    pub reinitialized: bool,
}

impl HealthReport {
    /// TX rings declared hung on this tick.
    pub fn hung_rings(&self) -> impl Iterator<Item = usize> + '_ {
        self.verdicts
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == Verdict::Hung)
            .map(|(i, _)| i)
    }
}
