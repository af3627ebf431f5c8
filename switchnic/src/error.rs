//! Engine error types.
//!
//! Transient exhaustion, malformed descriptors and device hangs are absorbed
//! inside the engine and surface as counters. What remains here is what a
//! producer or integrator can act on.

use core::fmt;

use crate::dma::PacketBuffer;

/// The buffer pool had nothing to hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolExhausted;

impl fmt::Display for PoolExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer pool exhausted")
    }
}

/// The descriptor at the requested index is still owned by the device, or
/// there is no outstanding work at that index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotReady;

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Descriptor not ready")
    }
}

/// Ring misuse detected by `submit_to_device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingFault {
    /// Index is past the end of the ring.
    IndexOutOfRange { index: u16, capacity: u16 },
    /// Index is not the ring's produce index.
    OutOfOrder { index: u16, expected: u16 },
    /// Every slot is already handed to the device.
    Full,
    /// Slot still holds a buffer or is device-owned.
    SlotBusy { index: u16 },
}

impl fmt::Display for RingFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { index, capacity } => {
                write!(f, "Descriptor index {} out of range (capacity {})", index, capacity)
            }
            Self::OutOfOrder { index, expected } => {
                write!(f, "Descriptor index {} submitted out of order (expected {})", index, expected)
            }
            Self::Full => write!(f, "Ring full"),
            Self::SlotBusy { index } => write!(f, "Descriptor {} still in use", index),
        }
    }
}

/// A refused submission. The buffer is handed back so it is never lost.
#[derive(Debug)]
pub struct Rejected {
    pub fault: RingFault,
    pub buffer: PacketBuffer,
}

/// TX error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxError {
    /// TX ring is full, try again after completions are reclaimed.
    RingFull,
    /// No buffer available to copy the frame into.
    PoolExhausted,
    /// Frame exceeds the configured maximum.
    FrameTooLarge { len: usize, max: usize },
    /// No TX ring with this index.
    UnknownRing(usize),
    /// Engine has been shut down.
    DeviceDown,
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RingFull => write!(f, "TX ring full"),
            Self::PoolExhausted => write!(f, "No TX buffer available"),
            Self::FrameTooLarge { len, max } => {
                write!(f, "Frame too large: {} bytes (max {})", len, max)
            }
            Self::UnknownRing(ring) => write!(f, "No TX ring {}", ring),
            Self::DeviceDown => write!(f, "Device is down"),
        }
    }
}

/// A refused zero-copy send. The buffer goes back to the producer.
#[derive(Debug)]
pub struct SendRejected {
    pub error: TxError,
    pub buffer: PacketBuffer,
}

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Ring count outside `1..=max` for one direction.
    RingCount { requested: usize, max: usize },
    /// Ring size outside the supported range.
    RingSize { requested: u16, min: u16, max: u16 },
    /// Pool cannot cover every RX descriptor with buffers to spare.
    PoolTooSmall { pool: usize, required: usize },
    /// Pool larger than buffer indices can address.
    PoolTooLarge { pool: usize, max: usize },
    /// Buffers cannot hold the largest accepted frame.
    BufferTooSmall { buffer: usize, required: usize },
    /// Buffers larger than a descriptor length field can describe.
    BufferTooLarge { buffer: usize, max: usize },
    /// Frame length bounds are inverted or zero.
    FrameBounds { min: usize, max: usize },
    /// Flow thresholds must satisfy `0 < stop_below < wake_above <= ring size`.
    FlowThresholds { stop_below: usize, wake_above: usize, ring_size: u16 },
    /// Poll budget must be non-zero.
    ZeroBudget,
    /// Hang detection needs at least one sample.
    ZeroHangSamples,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RingCount { requested, max } => {
                write!(f, "Ring count {} not in 1..={}", requested, max)
            }
            Self::RingSize { requested, min, max } => {
                write!(f, "Ring size {} not in {}..={}", requested, min, max)
            }
            Self::PoolTooSmall { pool, required } => {
                write!(f, "Pool of {} buffers too small (need more than {})", pool, required)
            }
            Self::PoolTooLarge { pool, max } => {
                write!(f, "Pool of {} buffers exceeds maximum {}", pool, max)
            }
            Self::BufferTooSmall { buffer, required } => {
                write!(f, "Buffer size {} too small (need {})", buffer, required)
            }
            Self::BufferTooLarge { buffer, max } => {
                write!(f, "Buffer size {} exceeds maximum {}", buffer, max)
            }
            Self::FrameBounds { min, max } => {
                write!(f, "Invalid frame length bounds {}..={}", min, max)
            }
            Self::FlowThresholds { stop_below, wake_above, ring_size } => write!(
                f,
                "Invalid flow thresholds stop<{} wake>={} for ring of {}",
                stop_below, wake_above, ring_size
            ),
            Self::ZeroBudget => write!(f, "Poll budget must be non-zero"),
            Self::ZeroHangSamples => write!(f, "Hang sample count must be non-zero"),
        }
    }
}
