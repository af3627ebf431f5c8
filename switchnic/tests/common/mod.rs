//! Common test utilities: an in-memory switch CPU port and helpers

#![allow(dead_code)]

use morpheus_switchnic::device::{CpuInterface, RegisterFile};
use morpheus_switchnic::{CompletionFlags, EngineConfig, PollOutcome, RingSet, RxPacket};

pub type TestHw = CpuInterface<RegisterFile>;
pub type TestSet = RingSet<TestHw>;

/// One RX and one TX ring of 16, a 64-buffer pool.
pub fn small_config() -> EngineConfig {
    EngineConfig {
        rx_rings: 1,
        rx_ring_size: 16,
        tx_rings: 1,
        tx_ring_size: 16,
        pool_size: 64,
        tx_stop_below: 4,
        tx_wake_above: 8,
        poll_budget: 32,
        hang_samples: 3,
        hang_log_interval: 1,
        ..Default::default()
    }
}

pub fn ring_set(config: EngineConfig) -> TestSet {
    let hw = CpuInterface::new(RegisterFile::new());
    hw.enable();
    RingSet::new(config, hw).expect("valid config")
}

/// A frame of `len` bytes whose first byte is `tag`.
pub fn frame(len: usize, tag: u8) -> Vec<u8> {
    let mut f: Vec<u8> = (0..len).map(|i| i as u8).collect();
    if let Some(first) = f.first_mut() {
        *first = tag;
    }
    f
}

/// Device receives `frames` on RX ring `ring` and latches RX done.
/// Returns how many found a descriptor.
pub fn inject(set: &TestSet, ring: usize, frames: &[Vec<u8>]) -> usize {
    let taken = set.with_device_port(|port| {
        frames.iter().filter(|f| port.receive_frame(ring, f)).count()
    });
    set.hw().io().raise(CompletionFlags::rx_done(ring));
    taken
}

/// Device puts up to `max` frames from TX ring `ring` on the wire and
/// latches TX done.
pub fn transmit(set: &TestSet, ring: usize, max: usize) -> Vec<Vec<u8>> {
    let sent = set.with_device_port(|port| port.transmit(ring, max));
    set.hw().io().raise(CompletionFlags::tx_done(ring));
    sent
}

/// Interrupt, then one pass collecting packets.
pub fn interrupt_and_poll(set: &TestSet, budget: usize) -> (PollOutcome, Vec<RxPacket>) {
    set.handle_interrupt();
    poll_once(set, budget)
}

/// One pass collecting packets.
pub fn poll_once(set: &TestSet, budget: usize) -> (PollOutcome, Vec<RxPacket>) {
    let mut got = Vec::new();
    let outcome = set.poll(budget, &mut |p: RxPacket| got.push(p));
    (outcome, got)
}

pub fn release_all(set: &TestSet, packets: Vec<RxPacket>) {
    for p in packets {
        set.release(p);
    }
}
