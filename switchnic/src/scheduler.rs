//! Interrupt-to-poll scheduling.
//!
//! ```text
//!   Idle --signal--> Scheduled --begin--> Running --complete--> Idle
//!                        ^                   |
//!                        +------yield--------+
//! ```
//!
//! The interrupt side only ever moves `Idle -> Scheduled`. Everything else
//! happens in the poll pass that claimed `Running`, so at most one pass runs
//! per ring set.

use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

const SCHED_IDLE: u8 = 0;
const SCHED_SCHEDULED: u8 = 1;
const SCHED_RUNNING: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedState {
    /// Completion signals armed, no pass pending.
    Idle,
    /// A pass is owed; signals masked.
    Scheduled,
    /// A pass is in progress; signals masked.
    Running,
}

impl SchedState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            SCHED_SCHEDULED => SchedState::Scheduled,
            SCHED_RUNNING => SchedState::Running,
            _ => SchedState::Idle,
        }
    }
}

/// Atomic scheduler state for one ring set.
#[derive(Debug)]
pub struct Scheduler {
    state: AtomicU8,
    schedules: AtomicU64,
    yields: AtomicU64,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(SCHED_IDLE),
            schedules: AtomicU64::new(0),
            yields: AtomicU64::new(0),
        }
    }

    /// `Idle -> Scheduled`. Fails if a pass is already owed or running.
    pub fn try_schedule(&self) -> bool {
        let won = self
            .state
            .compare_exchange(SCHED_IDLE, SCHED_SCHEDULED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.schedules.fetch_add(1, Ordering::Relaxed);
        }
        won
    }

    /// `Scheduled -> Running`. Fails if no pass is owed.
    pub fn begin_pass(&self) -> bool {
        self.state
            .compare_exchange(SCHED_SCHEDULED, SCHED_RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Running -> Scheduled`: budget spent, work remains.
    ///
    /// Returns `false` if teardown already forced the scheduler idle.
    pub fn yield_pass(&self) -> bool {
        if !self.leave_running(SCHED_SCHEDULED) {
            return false;
        }
        self.yields.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// `Running -> Idle`: work exhausted.
    ///
    /// Returns `false` if teardown already forced the scheduler idle.
    pub fn complete_pass(&self) -> bool {
        self.leave_running(SCHED_IDLE)
    }

    fn leave_running(&self, next: u8) -> bool {
        match self
            .state
            .compare_exchange(SCHED_RUNNING, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(prev) => {
                debug_assert_eq!(prev, SCHED_IDLE, "pass ended outside a pass");
                false
            }
        }
    }

    /// Drop any owed pass. Only for teardown.
    pub(crate) fn force_idle(&self) {
        self.state.store(SCHED_IDLE, Ordering::Release);
    }

    pub fn state(&self) -> SchedState {
        SchedState::from_raw(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.state() == SchedState::Idle
    }

    /// Successful `Idle -> Scheduled` transitions.
    pub fn schedules(&self) -> u64 {
        self.schedules.load(Ordering::Relaxed)
    }

    /// Passes that ran out of budget.
    pub fn yields(&self) -> u64 {
        self.yields.load(Ordering::Relaxed)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
