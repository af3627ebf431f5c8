//! Producer, device and poll contexts running at once

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

use common::*;
use morpheus_switchnic::scheduler::Scheduler;
use morpheus_switchnic::{PassStatus, RxPacket, SchedState, TxError};

const FRAMES: usize = 2000;
const RX_FRAMES: usize = 1500;

#[test]
fn test_producer_device_and_poller_race() {
    let set = ring_set(small_config());
    let stop = AtomicBool::new(false);
    let rx_accepted = AtomicUsize::new(0);
    let rx_delivered = AtomicUsize::new(0);
    let mut wire = Vec::new();

    thread::scope(|s| {
        // Producer
        s.spawn(|| {
            for i in 0..FRAMES {
                loop {
                    match set.send(0, &frame(64 + i % 200, i as u8)) {
                        Ok(_) => break,
                        Err(TxError::RingFull) | Err(TxError::PoolExhausted) => {
                            set.reclaim(0);
                            thread::yield_now();
                        }
                        Err(e) => panic!("unexpected send error: {}", e),
                    }
                }
            }
        });

        // Poll context
        s.spawn(|| {
            while !stop.load(Ordering::Acquire) {
                set.handle_interrupt();
                let outcome = set.poll(8, &mut |p: RxPacket| {
                    assert_eq!(p.len(), 60);
                    rx_delivered.fetch_add(1, Ordering::Relaxed);
                    set.release(p);
                });
                if outcome.status == PassStatus::NotScheduled {
                    thread::yield_now();
                }
            }
        });

        // Device
        let mut offered = 0;
        while wire.len() < FRAMES {
            wire.extend(transmit(&set, 0, 5));
            if offered < RX_FRAMES {
                let taken = inject(&set, 0, &[frame(60, offered as u8)]);
                rx_accepted.fetch_add(taken, Ordering::Relaxed);
                offered += 1;
            }
            thread::yield_now();
        }
        stop.store(true, Ordering::Release);
    });

    // Drain what the poller left.
    for _ in 0..8 {
        set.handle_interrupt();
        let (_, packets) = poll_once(&set, 0);
        rx_delivered.fetch_add(packets.len(), Ordering::Relaxed);
        release_all(&set, packets);
    }
    while let Some(p) = set.receive(0) {
        rx_delivered.fetch_add(1, Ordering::Relaxed);
        set.release(p);
    }
    set.reclaim(0);

    for (i, f) in wire.iter().enumerate() {
        assert_eq!(f[0], i as u8, "frame {} out of order", i);
        assert_eq!(f.len(), 64 + i % 200);
    }
    let stats = set.stats();
    assert_eq!(stats.tx[0].sent, FRAMES as u64);
    assert_eq!(stats.tx[0].reclaimed, FRAMES as u64);
    assert_eq!(rx_delivered.load(Ordering::Relaxed), rx_accepted.load(Ordering::Relaxed));
    assert_eq!(stats.rx[0].delivered, rx_accepted.load(Ordering::Relaxed) as u64);

    let census = set.buffer_census();
    assert_eq!(census.duplicates, 0);
    assert_eq!(census.held_outside(), 0);
    assert_eq!(census.tx_attached, 0);
    assert_eq!(census.rx_attached, 16);
    assert_eq!(census.free, 48);
}

#[test]
fn test_concurrent_senders_share_a_ring() {
    let set = ring_set(small_config());
    let sent = AtomicUsize::new(0);
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for t in 0..4u8 {
            let (set, sent) = (&set, &sent);
            s.spawn(move || {
                let mut mine = 0;
                while mine < 250 {
                    match set.send(0, &frame(60, t)) {
                        Ok(_) => {
                            mine += 1;
                            sent.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(TxError::RingFull) | Err(TxError::PoolExhausted) => thread::yield_now(),
                        Err(e) => panic!("unexpected send error: {}", e),
                    }
                }
            });
        }
        s.spawn(|| {
            let mut seen = [0usize; 4];
            while seen.iter().sum::<usize>() < 1000 {
                for f in transmit(&set, 0, 16) {
                    seen[f[0] as usize] += 1;
                }
                set.reclaim(0);
                thread::yield_now();
            }
            assert_eq!(seen, [250; 4]);
            done.store(true, Ordering::Release);
        });
    });

    assert!(done.load(Ordering::Acquire));
    assert_eq!(sent.load(Ordering::Relaxed), 1000);
    set.reclaim(0);
    assert_eq!(set.pool_free(), 48);
    assert_eq!(set.buffer_census().duplicates, 0);
}

#[test]
fn test_one_schedule_wins() {
    let scheduler = Scheduler::new();
    let barrier = Barrier::new(8);
    let wins = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                barrier.wait();
                for _ in 0..1000 {
                    if scheduler.try_schedule() {
                        wins.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(wins.load(Ordering::Relaxed), 1);
    assert_eq!(scheduler.state(), SchedState::Scheduled);
    assert!(scheduler.begin_pass());
    assert!(!scheduler.try_schedule());
    scheduler.complete_pass();
    assert!(scheduler.is_idle());
}

#[test]
fn test_interrupts_race_one_pass() {
    let set = ring_set(small_config());
    inject(&set, 0, &[frame(60, 0)]);
    let scheduled = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..100 {
                    if set.handle_interrupt() {
                        scheduled.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(scheduled.load(Ordering::Relaxed), 1);
    let (outcome, packets) = poll_once(&set, 32);
    assert_eq!(outcome.delivered, 1);
    assert_eq!(outcome.status, PassStatus::Complete);
    release_all(&set, packets);
}
