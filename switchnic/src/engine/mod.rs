//! Ring set context.
//!
//! A [`RingSet`] owns every RX and TX ring of one switch CPU port plus the
//! buffer pool behind them. It is built at bring-up, shared by reference with
//! the interrupt handler, the poll context, producers and the watchdog, and
//! torn down with [`RingSet::shutdown`].
//!
//! # Locking
//! One `spin::Mutex` guards ring indices and the pool. It is held per step,
//! never across a consumer callback. Scheduler, flow control and counters are
//! atomics readable without it. The health monitor has its own lock, never
//! taken while the ring lock is held.

mod poll;
mod recovery;
pub mod rx;
pub mod stats;
mod tx;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use spin::Mutex;

use crate::config::EngineConfig;
use crate::device::{CompletionFlags, DevicePort, DeviceRegisters, RingId};
use crate::dma::{BufferPool, PacketBuffer, PoolGauge};
use crate::error::ConfigError;
use crate::flow::FlowController;
use crate::health::HealthMonitor;
use crate::ring::DescriptorRing;
use crate::scheduler::{SchedState, Scheduler};

pub use poll::{PassStatus, PollOutcome};
pub use rx::DropCause;
pub use stats::{EngineSnapshot, RxRingSnapshot, TxRingSnapshot};

use rx::RxBounds;
use stats::{EngineStats, RxRingStats, TxRingStats};

// ═══════════════════════════════════════════════════════════════════════════
// PACKETS
// ═══════════════════════════════════════════════════════════════════════════

/// A received frame, FCS stripped.
///
/// Holds its buffer until handed back with [`RingSet::release`]. A packet
/// that is dropped instead never returns to the pool.
#[derive(Debug)]
pub struct RxPacket {
    ring: usize,
    buffer: PacketBuffer,
}

impl RxPacket {
    /// RX ring the frame arrived on.
    pub fn ring(&self) -> usize {
        self.ring
    }

    /// Frame bytes.
    pub fn data(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &PacketBuffer {
        &self.buffer
    }

    /// Keep the buffer, e.g. to forward it with `send_buffer`.
    pub fn into_buffer(self) -> PacketBuffer {
        self.buffer
    }
}

/// Upstream consumer of received packets.
pub trait PacketSink {
    fn deliver(&mut self, packet: RxPacket);
}

impl<F: FnMut(RxPacket)> PacketSink for F {
    fn deliver(&mut self, packet: RxPacket) {
        self(packet)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RING SET
// ═══════════════════════════════════════════════════════════════════════════

/// Rings and pool, under the ring set lock.
pub(crate) struct RingState {
    pub(crate) rx: Vec<DescriptorRing>,
    pub(crate) tx: Vec<DescriptorRing>,
    pub(crate) pool: BufferPool,
}

/// Where every buffer of the pool currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCensus {
    pub total: usize,
    /// On the pool free list.
    pub free: usize,
    /// Attached to RX descriptors.
    pub rx_attached: usize,
    /// Attached to TX descriptors.
    pub tx_attached: usize,
    /// Buffer indices found in more than one place.
    pub duplicates: usize,
}

impl BufferCensus {
    /// Buffers held outside the ring set (consumers, producers).
    pub fn held_outside(&self) -> usize {
        self.total.saturating_sub(self.free + self.rx_attached + self.tx_attached)
    }
}

/// One switch CPU port's rings, pool and control state.
pub struct RingSet<H: DeviceRegisters> {
    config: EngineConfig,
    hw: H,
    inner: Mutex<RingState>,
    scheduler: Scheduler,
    flow: Box<[FlowController]>,
    health: Mutex<HealthMonitor>,
    rx_bounds: RxBounds,
    rx_stats: Box<[RxRingStats]>,
    tx_stats: Box<[TxRingStats]>,
    stats: EngineStats,
    pool_gauge: Arc<PoolGauge>,
    down: AtomicBool,
}

impl<H: DeviceRegisters> RingSet<H> {
    /// Bring up a ring set on `hw`.
    ///
    /// Validates `config`, allocates the pool and rings, programs the ring
    /// bases, hands every RX slot a buffer, clears stale completions and
    /// arms completion signals.
    pub fn new(config: EngineConfig, hw: H) -> Result<Self, ConfigError> {
        config.validate()?;

        let pool = BufferPool::new(config.pool_size, config.buffer_size);
        let pool_gauge = pool.gauge();
        let state = RingState {
            rx: (0..config.rx_rings).map(|_| DescriptorRing::new(config.rx_ring_size)).collect(),
            tx: (0..config.tx_rings).map(|_| DescriptorRing::new(config.tx_ring_size)).collect(),
            pool,
        };
        let (min_wire, max_wire) = config.rx_len_bounds();

        let set = Self {
            flow: (0..config.tx_rings)
                .map(|_| FlowController::new(config.tx_stop_below, config.tx_wake_above))
                .collect(),
            health: Mutex::new(HealthMonitor::new(
                config.tx_rings,
                config.hang_samples,
                config.hang_log_interval,
            )),
            rx_bounds: RxBounds { min_wire, max_wire, fcs_len: config.fcs_len() },
            rx_stats: (0..config.rx_rings).map(|_| RxRingStats::default()).collect(),
            tx_stats: (0..config.tx_rings).map(|_| TxRingStats::default()).collect(),
            stats: EngineStats::default(),
            scheduler: Scheduler::new(),
            inner: Mutex::new(state),
            pool_gauge,
            down: AtomicBool::new(false),
            hw,
            config,
        };

        set.mask_all();
        {
            let mut state = set.inner.lock();
            set.rebuild(&mut state);
        }
        set.clear_pending();
        set.unmask_all();

        info!(
            "[switchnic] up: {} rx x {}, {} tx x {}, pool {} x {}B",
            set.config.rx_rings,
            set.config.rx_ring_size,
            set.config.tx_rings,
            set.config.tx_ring_size,
            set.config.pool_size,
            set.config.buffer_size
        );
        Ok(set)
    }

    /// Program every ring base and prefill RX. Rings must be empty.
    fn rebuild(&self, state: &mut RingState) {
        for (n, ring) in state.rx.iter().enumerate() {
            self.hw.configure_ring_base(RingId::Rx(n as u8), ring.base_address());
        }
        for (n, ring) in state.tx.iter().enumerate() {
            self.hw.configure_ring_base(RingId::Tx(n as u8), ring.base_address());
        }
        let shortfall = self.fill_all_rx(state);
        if shortfall > 0 {
            warn!("[switchnic] rx prefill short by {} buffers", shortfall);
        }
    }

    pub(crate) fn mask_all(&self) {
        for n in 0..self.config.rx_rings {
            self.hw.mask_completion(RingId::Rx(n as u8));
        }
        for n in 0..self.config.tx_rings {
            self.hw.mask_completion(RingId::Tx(n as u8));
        }
    }

    pub(crate) fn unmask_all(&self) {
        for n in 0..self.config.rx_rings {
            self.hw.unmask_completion(RingId::Rx(n as u8));
        }
        for n in 0..self.config.tx_rings {
            self.hw.unmask_completion(RingId::Tx(n as u8));
        }
    }

    /// Clear whatever is latched. Returns what was.
    pub(crate) fn clear_pending(&self) -> CompletionFlags {
        let pending = self.hw.read_pending_completion_flags();
        if !pending.is_empty() {
            self.hw.clear_pending_completion_flags(pending);
        }
        pending
    }

    /// Tear the ring set down.
    ///
    /// Masks completions, returns every descriptor-held buffer to the pool
    /// and fails further sends with `DeviceDown`. Buffers held by consumers
    /// may still be released afterwards.
    pub fn shutdown(&self) {
        if self.down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.mask_all();
        let returned = {
            let mut state = self.inner.lock();
            let RingState { rx, tx, pool } = &mut *state;
            rx.iter_mut().chain(tx.iter_mut()).map(|ring| ring.reset(pool)).sum::<usize>()
        };
        self.clear_pending();
        self.scheduler.force_idle();
        for flow in self.flow.iter() {
            flow.reset();
        }
        info!("[switchnic] down, {} buffers returned", returned);
    }

    #[inline]
    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::Acquire)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Diagnostics
    // ───────────────────────────────────────────────────────────────────────

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register interface the ring set drives.
    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn scheduler_state(&self) -> SchedState {
        self.scheduler.state()
    }

    /// Free pool buffers, without taking the ring lock.
    pub fn pool_free(&self) -> usize {
        self.pool_gauge.free()
    }

    /// Snapshot of every counter. Never takes the ring lock.
    pub fn stats(&self) -> EngineSnapshot {
        let mut snap = EngineSnapshot {
            rx: self.rx_stats.iter().map(RxRingStats::snapshot).collect(),
            tx: self
                .tx_stats
                .iter()
                .zip(self.flow.iter())
                .map(|(stats, flow)| TxRingSnapshot {
                    stops: flow.stops(),
                    wakes: flow.wakes(),
                    ..stats.snapshot()
                })
                .collect(),
            schedules: self.scheduler.schedules(),
            yields: self.scheduler.yields(),
            pool_free: self.pool_gauge.free(),
            pool_total: self.pool_gauge.total(),
            pool_exhaustions: self.pool_gauge.exhaustions(),
            ..Default::default()
        };
        self.stats.fill(&mut snap);
        snap
    }

    /// Count where every buffer is. Takes the ring lock.
    pub fn buffer_census(&self) -> BufferCensus {
        let state = self.inner.lock();
        let total = state.pool.total();
        let mut seen = vec![false; total];
        let mut duplicates = 0;
        let mut mark = |index: u16| {
            match seen.get_mut(index as usize) {
                Some(slot) if *slot => duplicates += 1,
                Some(slot) => *slot = true,
                None => duplicates += 1,
            }
        };

        let mut free = 0;
        for index in state.pool.free_indices() {
            mark(index);
            free += 1;
        }
        let mut rx_attached = 0;
        for index in state.rx.iter().flat_map(DescriptorRing::buffer_indices) {
            mark(index);
            rx_attached += 1;
        }
        let mut tx_attached = 0;
        for index in state.tx.iter().flat_map(DescriptorRing::buffer_indices) {
            mark(index);
            tx_attached += 1;
        }
        BufferCensus { total, free, rx_attached, tx_attached, duplicates }
    }

    /// Run `f` as the device, under the ring lock.
    ///
    /// For hardware models: `f` sees the rings the way the DMA engine does.
    pub fn with_device_port<R>(&self, f: impl FnOnce(&mut DevicePort<'_>) -> R) -> R {
        let mut state = self.inner.lock();
        let RingState { rx, tx, .. } = &mut *state;
        let mut port = DevicePort::new(rx, tx, self.rx_bounds.fcs_len);
        f(&mut port)
    }
}

impl<H: DeviceRegisters> Drop for RingSet<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
