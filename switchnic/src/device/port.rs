//! Device side of a ring set.
//!
//! What the switch DMA engine does in silicon: pick up host-owned work at its
//! own cursor, move bytes, write back length and status, flip ownership.
//! Hardware models and tests drive the engine through this instead of a
//! real device.

use alloc::vec::Vec;

use crate::ring::{DescStatus, DescriptorRing};

/// Borrowed device view of every ring in a set.
pub struct DevicePort<'a> {
    rx: &'a mut [DescriptorRing],
    tx: &'a mut [DescriptorRing],
    /// Bytes of FCS the MAC appends to received frames.
    fcs_len: usize,
}

impl<'a> DevicePort<'a> {
    pub(crate) fn new(
        rx: &'a mut [DescriptorRing],
        tx: &'a mut [DescriptorRing],
        fcs_len: usize,
    ) -> Self {
        Self { rx, tx, fcs_len }
    }

    /// Deliver `frame` into the next device-owned slot of RX ring `ring`.
    ///
    /// Appends a zero FCS when the framing includes one. Returns `false` if
    /// the ring has no slot to receive into (runout) or the frame does not
    /// fit, in which case the slot completes with `OVERRUN`.
    pub fn receive_frame(&mut self, ring: usize, frame: &[u8]) -> bool {
        let fcs_len = self.fcs_len;
        let Some(rx) = self.rx.get_mut(ring) else {
            return false;
        };
        let Some(index) = rx.device_peek() else {
            return false;
        };
        let wire_len = frame.len() + fcs_len;

        let fits = match rx.device_buffer_mut(index) {
            Some(buf) if wire_len <= buf.capacity() => {
                let data = buf.as_mut_slice();
                data[..frame.len()].copy_from_slice(frame);
                data[frame.len()..wire_len].fill(0);
                true
            }
            Some(_) => false,
            // Null buffer: the device still reports the length it saw.
            None => true,
        };

        if fits {
            rx.device_complete(index, wire_len as u16, DescStatus::empty())
        } else {
            rx.device_complete(index, 0, DescStatus::OVERRUN);
            false
        }
    }

    /// Complete the next RX slot with an arbitrary length and status.
    ///
    /// Models a misbehaving device: nothing is written to the buffer.
    pub fn receive_raw(&mut self, ring: usize, length: u16, status: DescStatus) -> bool {
        let Some(rx) = self.rx.get_mut(ring) else {
            return false;
        };
        match rx.device_peek() {
            Some(index) => rx.device_complete(index, length, status),
            None => false,
        }
    }

    /// RX slots the device could receive into right now.
    pub fn rx_free_slots(&self, ring: usize) -> usize {
        self.rx.get(ring).map_or(0, DescriptorRing::device_pending)
    }

    /// TX slots queued for the device.
    pub fn tx_pending(&self, ring: usize) -> usize {
        self.tx.get(ring).map_or(0, DescriptorRing::device_pending)
    }

    /// Put up to `max` queued frames from TX ring `ring` on the wire.
    pub fn transmit(&mut self, ring: usize, max: usize) -> Vec<Vec<u8>> {
        let mut sent = Vec::new();
        let Some(tx) = self.tx.get_mut(ring) else {
            return sent;
        };
        while sent.len() < max {
            let Some(index) = tx.device_peek() else {
                break;
            };
            let frame = tx.device_frame(index).map(<[u8]>::to_vec).unwrap_or_default();
            let len = frame.len() as u16;
            if !tx.device_complete(index, len, DescStatus::empty()) {
                break;
            }
            sent.push(frame);
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::{BufferPool, Coherent};

    #[test]
    fn test_receive_appends_fcs() {
        let mut pool = BufferPool::new(4, 128);
        let mut rx = [DescriptorRing::new(4)];
        let mut tx: [DescriptorRing; 0] = [];
        let buf = pool.acquire().unwrap();
        rx[0].submit_to_device(0, buf, 128, &Coherent).unwrap();

        let mut port = DevicePort::new(&mut rx, &mut tx, 4);
        assert_eq!(port.rx_free_slots(0), 1);
        assert!(port.receive_frame(0, &[0xAB; 60]));
        assert!(!port.receive_frame(0, &[0xAB; 60]));

        let done = rx[0].try_take_from_device(0, &Coherent).unwrap();
        assert_eq!(done.length, 64);
        assert_eq!(done.status, DescStatus::empty());
        pool.release(done.buffer.unwrap());
    }

    #[test]
    fn test_transmit_in_ring_order() {
        let mut pool = BufferPool::new(4, 128);
        let mut rx: [DescriptorRing; 0] = [];
        let mut tx = [DescriptorRing::new(4)];
        for tag in 1..=3u8 {
            let mut buf = pool.acquire().unwrap();
            buf.fill_from(&[tag; 10], 60).unwrap();
            let idx = tx[0].produce_index();
            let len = buf.len() as u16;
            tx[0].submit_to_device(idx, buf, len, &Coherent).unwrap();
        }

        let mut port = DevicePort::new(&mut rx, &mut tx, 4);
        assert_eq!(port.tx_pending(0), 3);
        let wire = port.transmit(0, 2);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].len(), 60);
        assert_eq!((wire[0][0], wire[1][0]), (1, 2));
        assert_eq!(port.tx_pending(0), 1);
        assert_eq!(port.transmit(0, 8).len(), 1);
        assert_eq!(port.tx_pending(0), 0);
    }

    #[test]
    fn test_oversize_frame_completes_with_overrun() {
        let mut pool = BufferPool::new(4, 64);
        let mut rx = [DescriptorRing::new(4)];
        let mut tx: [DescriptorRing; 0] = [];
        let buf = pool.acquire().unwrap();
        rx[0].submit_to_device(0, buf, 64, &Coherent).unwrap();

        let mut port = DevicePort::new(&mut rx, &mut tx, 0);
        assert!(!port.receive_frame(0, &[0u8; 65]));
        let done = rx[0].try_take_from_device(0, &Coherent).unwrap();
        assert!(done.status.contains(DescStatus::OVERRUN));
        pool.release(done.buffer.unwrap());
    }
}
