//! Buffer ownership state machine.
//!
//! # State Machine
//! ```text
//!     POOL ──acquire()──> CALLER ──submit()──> DESCRIPTOR
//!       ▲                   │ ▲                     │
//!       └────release()──────┘ └──take_from_device()─┘
//! ```
//!
//! A buffer has exactly one holder at any time. Moving a `PacketBuffer`
//! transfers the holder; this tag only exists so debug builds can catch a
//! transition that skips a state.

/// Current holder of a packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOwnership {
    /// Sitting on the pool free list.
    Pool,
    /// Attached to a ring descriptor (host- or device-owned slot).
    Descriptor,
    /// Held by engine code, a packet producer, or a packet consumer.
    Caller,
}

impl BufferOwnership {
    /// Buffer is available for allocation.
    pub fn is_free(&self) -> bool {
        matches!(self, Self::Pool)
    }

    /// Buffer is attached to a descriptor.
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Descriptor)
    }

    /// Software may read or write the buffer contents.
    pub fn can_access(&self) -> bool {
        matches!(self, Self::Caller)
    }
}
