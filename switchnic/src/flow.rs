//! TX flow control.
//!
//! Two thresholds on a TX ring's free-slot count. The producer is stopped
//! right after a send leaves fewer than `stop_below` slots, and only woken
//! once a reclaim observes at least `wake_above`. Anything in between keeps
//! the current state.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Producer-facing state of one TX ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Flowing,
    Blocked,
}

/// A state change the producer should hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    /// Stop queueing on this ring.
    Stopped,
    /// Queueing may resume.
    Woken,
}

/// Hysteresis controller for one TX ring.
///
/// Transitions happen under the ring set lock; the state itself is atomic so
/// producers can read it without taking that lock.
#[derive(Debug)]
pub struct FlowController {
    stop_below: usize,
    wake_above: usize,
    blocked: AtomicBool,
    stops: AtomicU64,
    wakes: AtomicU64,
}

impl FlowController {
    pub fn new(stop_below: usize, wake_above: usize) -> Self {
        debug_assert!(stop_below < wake_above, "flow thresholds need a gap");
        Self {
            stop_below,
            wake_above,
            blocked: AtomicBool::new(false),
            stops: AtomicU64::new(0),
            wakes: AtomicU64::new(0),
        }
    }

    /// Check after a successful send left `free` slots.
    pub fn on_send(&self, free: usize) -> Option<FlowEvent> {
        if free < self.stop_below && !self.blocked.swap(true, Ordering::AcqRel) {
            self.stops.fetch_add(1, Ordering::Relaxed);
            return Some(FlowEvent::Stopped);
        }
        None
    }

    /// Check after a reclaim left `free` slots.
    pub fn on_reclaim(&self, free: usize) -> Option<FlowEvent> {
        if free >= self.wake_above
            && self
                .blocked
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.wakes.fetch_add(1, Ordering::Relaxed);
            return Some(FlowEvent::Woken);
        }
        None
    }

    /// Back to `Flowing`, for a ring whose slots were all freed at once.
    ///
    /// Returns `Woken` if the ring was blocked.
    pub fn reset(&self) -> Option<FlowEvent> {
        self.blocked.swap(false, Ordering::AcqRel).then_some(FlowEvent::Woken)
    }

    pub fn state(&self) -> FlowState {
        if self.blocked.load(Ordering::Acquire) {
            FlowState::Blocked
        } else {
            FlowState::Flowing
        }
    }

    #[inline]
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::Acquire)
    }

    /// Flowing -> Blocked transitions so far.
    pub fn stops(&self) -> u64 {
        self.stops.load(Ordering::Relaxed)
    }

    /// Blocked -> Flowing transitions so far.
    pub fn wakes(&self) -> u64 {
        self.wakes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_then_wake() {
        let fc = FlowController::new(4, 16);
        assert_eq!(fc.on_send(4), None);
        assert_eq!(fc.on_send(3), Some(FlowEvent::Stopped));
        assert_eq!(fc.on_send(2), None);
        assert_eq!(fc.state(), FlowState::Blocked);
        assert_eq!(fc.on_reclaim(16), Some(FlowEvent::Woken));
        assert_eq!(fc.state(), FlowState::Flowing);
        assert_eq!((fc.stops(), fc.wakes()), (1, 1));
    }

    #[test]
    fn test_no_flap_between_thresholds() {
        let fc = FlowController::new(4, 16);
        fc.on_send(3);
        for free in (3..16).chain((3..16).rev()) {
            assert_eq!(fc.on_reclaim(free), None);
            assert!(fc.is_blocked());
        }
        assert_eq!(fc.on_reclaim(16), Some(FlowEvent::Woken));
    }

    #[test]
    fn test_reclaim_never_stops() {
        let fc = FlowController::new(4, 16);
        assert_eq!(fc.on_reclaim(0), None);
        assert_eq!(fc.state(), FlowState::Flowing);
    }

    #[test]
    fn test_reset() {
        let fc = FlowController::new(4, 16);
        assert_eq!(fc.reset(), None);
        fc.on_send(0);
        assert_eq!(fc.reset(), Some(FlowEvent::Woken));
        assert!(!fc.is_blocked());
    }
}
