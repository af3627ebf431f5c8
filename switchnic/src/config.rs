//! Ring set configuration.

use crate::device::{MAX_RX_RINGS, MAX_TX_RINGS};
use crate::dma::MAX_POOL_SIZE;
use crate::error::ConfigError;
use crate::ring::{MAX_RING_SIZE, MIN_RING_SIZE};

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════

pub const DEFAULT_RX_RING_SIZE: u16 = 256;
pub const DEFAULT_TX_RING_SIZE: u16 = 128;
pub const DEFAULT_POOL_SIZE: usize = 512;
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Shortest Ethernet frame without FCS.
pub const MIN_FRAME_LEN: usize = 60;
/// Longest untagged Ethernet frame without FCS.
pub const MAX_FRAME_LEN: usize = 1514;
/// Frame check sequence length.
pub const FCS_LEN: usize = 4;

pub const DEFAULT_POLL_BUDGET: usize = 64;
pub const DEFAULT_TX_STOP_BELOW: usize = 4;
pub const DEFAULT_TX_WAKE_ABOVE: usize = 32;
pub const DEFAULT_HANG_SAMPLES: u32 = 3;
/// Watchdog ticks between hang log entries.
pub const DEFAULT_HANG_LOG_INTERVAL: u64 = 10;

/// Whether the MAC leaves the FCS on received frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// RX lengths include the 4-byte FCS.
    CrcIncluded,
    /// The MAC strips the FCS before DMA.
    CrcStripped,
}

impl FramingMode {
    /// FCS bytes counted in an RX descriptor length.
    pub fn fcs_len(self) -> usize {
        match self {
            FramingMode::CrcIncluded => FCS_LEN,
            FramingMode::CrcStripped => 0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════

/// Ring set configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of RX rings. Ring 0 has the highest priority.
    pub rx_rings: usize,
    /// Descriptors per RX ring.
    pub rx_ring_size: u16,
    /// Number of TX rings.
    pub tx_rings: usize,
    /// Descriptors per TX ring.
    pub tx_ring_size: u16,
    /// Buffers in the shared pool.
    pub pool_size: usize,
    /// Size of each buffer.
    pub buffer_size: usize,
    pub framing: FramingMode,
    /// Shortest accepted frame, FCS excluded. Shorter TX frames are padded.
    pub min_frame_len: usize,
    /// Longest accepted frame, FCS excluded.
    pub max_frame_len: usize,
    /// Default descriptors consumed per poll pass.
    pub poll_budget: usize,
    /// TX backpressure starts when free slots drop below this.
    pub tx_stop_below: usize,
    /// TX backpressure clears once free slots reach this.
    pub tx_wake_above: usize,
    /// Consecutive unchanged watchdog samples that declare a hang.
    pub hang_samples: u32,
    /// Minimum watchdog ticks between hang log entries.
    pub hang_log_interval: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rx_rings: 1,
            rx_ring_size: DEFAULT_RX_RING_SIZE,
            tx_rings: 1,
            tx_ring_size: DEFAULT_TX_RING_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            framing: FramingMode::CrcIncluded,
            min_frame_len: MIN_FRAME_LEN,
            max_frame_len: MAX_FRAME_LEN,
            poll_budget: DEFAULT_POLL_BUDGET,
            tx_stop_below: DEFAULT_TX_STOP_BELOW,
            tx_wake_above: DEFAULT_TX_WAKE_ABOVE,
            hang_samples: DEFAULT_HANG_SAMPLES,
            hang_log_interval: DEFAULT_HANG_LOG_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// FCS bytes included in RX descriptor lengths.
    #[inline]
    pub fn fcs_len(&self) -> usize {
        self.framing.fcs_len()
    }

    /// Accepted RX descriptor lengths, FCS included where the framing has one.
    #[inline]
    pub fn rx_len_bounds(&self) -> (usize, usize) {
        let fcs = self.fcs_len();
        (self.min_frame_len + fcs, self.max_frame_len + fcs)
    }

    /// Descriptors across every RX ring.
    pub fn rx_descriptors(&self) -> usize {
        self.rx_rings * self.rx_ring_size as usize
    }

    /// Check every constraint bring-up relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rx_rings == 0 || self.rx_rings > MAX_RX_RINGS {
            return Err(ConfigError::RingCount { requested: self.rx_rings, max: MAX_RX_RINGS });
        }
        if self.tx_rings == 0 || self.tx_rings > MAX_TX_RINGS {
            return Err(ConfigError::RingCount { requested: self.tx_rings, max: MAX_TX_RINGS });
        }
        for size in [self.rx_ring_size, self.tx_ring_size] {
            if !(MIN_RING_SIZE..=MAX_RING_SIZE).contains(&size) {
                return Err(ConfigError::RingSize {
                    requested: size,
                    min: MIN_RING_SIZE,
                    max: MAX_RING_SIZE,
                });
            }
        }
        if self.pool_size > MAX_POOL_SIZE {
            return Err(ConfigError::PoolTooLarge { pool: self.pool_size, max: MAX_POOL_SIZE });
        }
        // RX alone must not be able to drain the pool.
        if self.pool_size <= self.rx_descriptors() {
            return Err(ConfigError::PoolTooSmall {
                pool: self.pool_size,
                required: self.rx_descriptors(),
            });
        }
        if self.min_frame_len == 0 || self.min_frame_len > self.max_frame_len {
            return Err(ConfigError::FrameBounds { min: self.min_frame_len, max: self.max_frame_len });
        }
        let (_, max_wire) = self.rx_len_bounds();
        if self.buffer_size < max_wire {
            return Err(ConfigError::BufferTooSmall { buffer: self.buffer_size, required: max_wire });
        }
        if self.buffer_size > u16::MAX as usize {
            return Err(ConfigError::BufferTooLarge {
                buffer: self.buffer_size,
                max: u16::MAX as usize,
            });
        }
        if self.tx_stop_below == 0
            || self.tx_stop_below >= self.tx_wake_above
            || self.tx_wake_above > self.tx_ring_size as usize
        {
            return Err(ConfigError::FlowThresholds {
                stop_below: self.tx_stop_below,
                wake_above: self.tx_wake_above,
                ring_size: self.tx_ring_size,
            });
        }
        if self.poll_budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if self.hang_samples == 0 {
            return Err(ConfigError::ZeroHangSamples);
        }
        Ok(())
    }
}
