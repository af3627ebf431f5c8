//! TX path and flow control tests

mod common;

use common::*;
use morpheus_switchnic::device::RingId;
use morpheus_switchnic::{EngineConfig, PassStatus, RxPacket, TxError, Verdict};

#[test]
fn test_send_transmit_reclaim() {
    let set = ring_set(small_config());
    assert_eq!(set.send(0, &frame(100, 1)), Ok(0));
    assert_eq!(set.send(0, &frame(200, 2)), Ok(1));
    assert_eq!(set.hw().io().kick_count(RingId::Tx(0)), 2);
    assert_eq!(set.buffer_census().tx_attached, 2);
    assert_eq!(set.pool_free(), 46);

    let wire = transmit(&set, 0, 16);
    assert_eq!(wire.len(), 2);
    assert_eq!(wire[0], frame(100, 1));
    assert_eq!(wire[1], frame(200, 2));

    assert_eq!(set.reclaim(0), 2);
    assert_eq!(set.pool_free(), 48);
    let tx = set.stats().tx[0];
    assert_eq!((tx.sent, tx.reclaimed, tx.bytes), (2, 2, 300));
}

#[test]
fn test_reclaim_twice_is_idempotent() {
    let set = ring_set(small_config());
    set.send(0, &frame(64, 0)).unwrap();
    set.send(0, &frame(64, 0)).unwrap();
    transmit(&set, 0, 1);

    assert_eq!(set.reclaim(0), 1);
    let before = (set.stats(), set.buffer_census());
    assert_eq!(set.reclaim(0), 0);
    assert_eq!((set.stats(), set.buffer_census()), before);

    // The unfinished descriptor is still outstanding.
    assert_eq!(set.buffer_census().tx_attached, 1);
}

#[test]
fn test_reclaim_with_nothing_sent() {
    let set = ring_set(small_config());
    assert_eq!(set.reclaim(0), 0);
    assert_eq!(set.reclaim(7), 0);
}

#[test]
fn test_short_frame_is_padded() {
    let set = ring_set(small_config());
    set.send(0, &[0xFF; 20]).unwrap();
    let wire = transmit(&set, 0, 1);
    assert_eq!(wire[0].len(), 60);
    assert!(wire[0][..20].iter().all(|&b| b == 0xFF));
    assert!(wire[0][20..].iter().all(|&b| b == 0));
}

#[test]
fn test_oversize_frame_refused() {
    let set = ring_set(small_config());
    let err = set.send(0, &frame(1515, 0)).unwrap_err();
    assert_eq!(err, TxError::FrameTooLarge { len: 1515, max: 1514 });
    assert_eq!(set.pool_free(), 48);
    assert_eq!(set.stats().tx[0].too_large, 1);
    assert_eq!(set.send(0, &frame(1514, 0)), Ok(0));
}

#[test]
fn test_ring_full_mutates_nothing() {
    let set = ring_set(small_config());
    for i in 0..16 {
        assert_eq!(set.send(0, &frame(60, 0)), Ok(i));
    }
    let free = set.pool_free();
    let kicks = set.hw().io().kick_count(RingId::Tx(0));

    assert_eq!(set.send(0, &frame(60, 0)), Err(TxError::RingFull));
    assert_eq!(set.pool_free(), free);
    assert_eq!(set.hw().io().kick_count(RingId::Tx(0)), kicks);
    assert_eq!(set.stats().tx[0].ring_full, 1);

    transmit(&set, 0, 1);
    set.reclaim(0);
    assert_eq!(set.send(0, &frame(60, 0)), Ok(0));
}

#[test]
fn test_unknown_ring() {
    let set = ring_set(small_config());
    assert_eq!(set.send(1, &frame(60, 0)), Err(TxError::UnknownRing(1)));
}

#[test]
fn test_pool_exhaustion_on_send() {
    // RX takes 16 of 17 buffers.
    let set = ring_set(EngineConfig { pool_size: 17, ..small_config() });
    assert_eq!(set.send(0, &frame(60, 0)), Ok(0));
    assert_eq!(set.send(0, &frame(60, 0)), Err(TxError::PoolExhausted));
    assert_eq!(set.stats().tx[0].pool_exhausted, 1);
    assert_eq!(set.buffer_census().tx_attached, 1);
}

#[test]
fn test_zero_copy_send() {
    let set = ring_set(small_config());
    let mut buf = set.alloc_tx_buffer().unwrap();
    buf.as_mut_slice()[..4].copy_from_slice(&[1, 2, 3, 4]);
    buf.set_len(4);
    assert_eq!(set.send_buffer(0, buf).map_err(|r| r.error), Ok(0));

    let wire = transmit(&set, 0, 1);
    assert_eq!(wire[0].len(), 60);
    assert_eq!(&wire[0][..4], &[1, 2, 3, 4]);
    assert_eq!(set.reclaim(0), 1);
    assert_eq!(set.pool_free(), 48);
}

#[test]
fn test_zero_copy_refusal_hands_buffer_back() {
    let set = ring_set(small_config());
    for _ in 0..16 {
        set.send(0, &frame(60, 0)).unwrap();
    }
    let mut buf = set.alloc_tx_buffer().unwrap();
    buf.set_len(60);
    let rejected = set.send_buffer(0, buf).unwrap_err();
    assert_eq!(rejected.error, TxError::RingFull);

    let rejected = set.send_buffer(3, rejected.buffer).unwrap_err();
    assert_eq!(rejected.error, TxError::UnknownRing(3));

    set.release_buffer(rejected.buffer);
    assert_eq!(set.buffer_census().held_outside(), 0);
}

#[test]
fn test_forward_received_buffer() {
    let set = ring_set(small_config());
    inject(&set, 0, &[frame(90, 0x42)]);
    let (_, mut packets) = interrupt_and_poll(&set, 32);
    let packet = packets.pop().unwrap();

    set.send_buffer(0, packet.into_buffer()).map_err(|r| r.error).unwrap();
    let wire = transmit(&set, 0, 1);
    assert_eq!(wire[0], frame(90, 0x42));
}

#[test]
fn test_poll_reclaims_tx() {
    let set = ring_set(small_config());
    set.send(0, &frame(60, 0)).unwrap();
    transmit(&set, 0, 1);
    let (outcome, _) = interrupt_and_poll(&set, 32);
    assert_eq!(outcome.reclaimed, 1);
    assert_eq!(outcome.status, PassStatus::Complete);
    assert_eq!(set.buffer_census().tx_attached, 0);
}

#[test]
fn test_send_after_shutdown() {
    let set = ring_set(small_config());
    set.shutdown();
    assert_eq!(set.send(0, &frame(60, 0)), Err(TxError::DeviceDown));
    assert_eq!(set.alloc_tx_buffer().unwrap_err(), TxError::DeviceDown);
}

#[test]
fn test_hysteresis_on_64_slot_ring() {
    let config = EngineConfig {
        tx_ring_size: 64,
        pool_size: 256,
        tx_stop_below: 4,
        tx_wake_above: 16,
        ..small_config()
    };
    let set = ring_set(config);

    for _ in 0..60 {
        set.send(0, &frame(60, 0)).unwrap();
        assert!(!set.is_tx_stopped(0));
    }
    // 3 free.
    set.send(0, &frame(60, 0)).unwrap();
    assert!(set.is_tx_stopped(0));

    // Oscillate between 3 and 15 free.
    for _ in 0..3 {
        transmit(&set, 0, 12);
        assert_eq!(set.reclaim(0), 12);
        assert!(set.is_tx_stopped(0), "15 free must not wake");
        for _ in 0..12 {
            set.send(0, &frame(60, 0)).unwrap();
        }
        assert!(set.is_tx_stopped(0));
    }

    transmit(&set, 0, 12);
    set.reclaim(0);
    assert!(set.is_tx_stopped(0));
    transmit(&set, 0, 1);
    set.reclaim(0);
    assert!(!set.is_tx_stopped(0), "16 free wakes");

    let stats = set.stats().tx[0];
    assert_eq!(stats.stops, 1);
    assert_eq!(stats.wakes, 1);
}

#[test]
fn test_tx_completion_during_rx_drain_is_reclaimed() {
    let set = ring_set(small_config());
    set.send(0, &frame(60, 7)).unwrap();
    inject(&set, 0, &[frame(60, 1)]);
    assert!(set.handle_interrupt());

    // The device finishes the send while the pass is delivering RX.
    let mut wire = Vec::new();
    let mut got = Vec::new();
    let outcome = set.poll(32, &mut |p: RxPacket| {
        wire.extend(transmit(&set, 0, 1));
        got.push(p);
    });
    assert_eq!(outcome.delivered, 1);
    assert_eq!(outcome.reclaimed, 1);
    assert_eq!(outcome.status, PassStatus::Complete);
    assert_eq!(wire.len(), 1);
    assert_eq!(set.buffer_census().tx_attached, 0);

    for _ in 0..3 {
        assert_eq!(set.watchdog_tick().verdicts, vec![Verdict::Idle]);
    }
    assert_eq!(set.stats().reinits, 0);
    release_all(&set, got);
    assert_eq!(set.pool_free(), 48);
}
