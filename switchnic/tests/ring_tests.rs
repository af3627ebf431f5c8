//! Descriptor ring and pool properties under random host/device interleavings

use std::collections::HashSet;

use morpheus_switchnic::dma::Coherent;
use morpheus_switchnic::ring::DescStatus;
use morpheus_switchnic::{BufferPool, DescriptorRing, Owner};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    /// Host submits at the produce index.
    Submit,
    /// Device completes the slot at its cursor.
    Complete,
    /// Host takes back the consume index.
    Take,
    /// Host polls an arbitrary index.
    TakeAt(u16),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Submit),
        2 => Just(Op::Complete),
        2 => Just(Op::Take),
        1 => (0u16..32).prop_map(Op::TakeAt),
    ]
}

fn assert_no_shared_buffers(ring: &DescriptorRing, pool: &BufferPool) {
    let mut seen = HashSet::new();
    for index in ring.buffer_indices().chain(pool.free_indices()) {
        assert!(seen.insert(index), "buffer {} in two places", index);
    }
}

proptest! {
    #[test]
    fn test_ring_matches_model(
        capacity in 2u16..12,
        ops in prop::collection::vec(op(), 1..200),
    ) {
        let mut pool = BufferPool::new(capacity as usize + 4, 128);
        let total = pool.total();
        let mut ring = DescriptorRing::new(capacity);
        let mut held = Vec::new();

        // (submitted, completed by device) in FIFO order
        let mut outstanding = 0usize;
        let mut completed = 0usize;

        for op in ops {
            match op {
                Op::Submit => {
                    let Ok(buf) = pool.acquire() else { continue };
                    match ring.next_produce_index() {
                        Some(idx) => {
                            prop_assert!(ring.submit_to_device(idx, buf, 64, &Coherent).is_ok());
                            outstanding += 1;
                        }
                        None => {
                            prop_assert_eq!(outstanding, capacity as usize);
                            let idx = ring.produce_index();
                            let rejected = ring.submit_to_device(idx, buf, 64, &Coherent).unwrap_err();
                            pool.release(rejected.buffer);
                        }
                    }
                }
                Op::Complete => {
                    let done = match ring.device_peek() {
                        Some(idx) => ring.device_complete(idx, 60, DescStatus::empty()),
                        None => false,
                    };
                    prop_assert_eq!(done, completed < outstanding);
                    if done {
                        completed += 1;
                    }
                }
                Op::Take => {
                    let idx = ring.consume_index();
                    match ring.try_take_from_device(idx, &Coherent) {
                        Ok(c) => {
                            prop_assert!(completed > 0);
                            prop_assert_eq!(c.length, 60);
                            held.push(c.buffer.unwrap());
                            completed -= 1;
                            outstanding -= 1;
                        }
                        Err(_) => {
                            prop_assert_eq!(completed, 0);
                        }
                    }
                }
                Op::TakeAt(idx) => {
                    if idx != ring.consume_index() {
                        let before = (ring.produce_index(), ring.consume_index(), ring.outstanding());
                        prop_assert!(ring.try_take_from_device(idx, &Coherent).is_err());
                        let after = (ring.produce_index(), ring.consume_index(), ring.outstanding());
                        prop_assert_eq!(before, after);
                    }
                }
            }

            prop_assert!(!(ring.is_empty() && ring.is_full()));
            prop_assert_eq!(ring.outstanding(), outstanding);
            prop_assert_eq!(ring.free_slots(), capacity as usize - outstanding);
            prop_assert_eq!(ring.is_empty(), outstanding == 0);
            prop_assert_eq!(ring.is_full(), outstanding == capacity as usize);
            prop_assert_eq!(ring.device_pending(), outstanding - completed);
            prop_assert_eq!(pool.available() + outstanding + held.len(), total);
            assert_no_shared_buffers(&ring, &pool);

            // Give some taken buffers back so submits keep flowing.
            if held.len() > 2 {
                pool.release(held.remove(0));
            }
        }

        for buf in held.drain(..) {
            pool.release(buf);
        }
        prop_assert_eq!(ring.reset(&mut pool), outstanding);
        prop_assert!(pool.is_full());
        prop_assert!(ring.is_empty());
    }

    #[test]
    fn test_every_slot_is_host_owned_after_reset(
        capacity in 2u16..16,
        submitted in 0usize..16,
    ) {
        let mut pool = BufferPool::new(32, 128);
        let mut ring = DescriptorRing::new(capacity);
        for _ in 0..submitted.min(capacity as usize) {
            let idx = ring.produce_index();
            let buf = pool.acquire().unwrap();
            ring.submit_to_device(idx, buf, 64, &Coherent).unwrap();
        }
        ring.reset(&mut pool);
        for idx in 0..capacity {
            prop_assert_eq!(ring.owner_of(idx), Some(Owner::Host));
        }
        prop_assert_eq!(ring.produce_index(), 0);
        prop_assert_eq!(ring.consume_index(), 0);
        prop_assert_eq!(pool.available(), 32);
    }
}

#[test]
fn test_wrap_many_laps() {
    let mut pool = BufferPool::new(8, 128);
    let mut ring = DescriptorRing::new(4);
    for lap in 0..50u32 {
        for _ in 0..3 {
            let idx = ring.next_produce_index().unwrap();
            ring.submit_to_device(idx, pool.acquire().unwrap(), 64, &Coherent).unwrap();
        }
        while let Some(idx) = ring.device_peek() {
            assert!(ring.device_complete(idx, lap as u16, DescStatus::empty()));
        }
        for _ in 0..3 {
            let c = ring.try_take_from_device(ring.consume_index(), &Coherent).unwrap();
            assert_eq!(c.length, lap as u16);
            pool.release(c.buffer.unwrap());
        }
        assert!(ring.is_empty());
    }
    assert!(pool.is_full());
}
