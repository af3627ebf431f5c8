//! Descriptor rings.
//!
//! One `DescriptorRing` per RX and per TX ring; the hardware supports several
//! priority rings in each direction and every instance is independent.

pub mod descriptor;
pub mod descriptor_ring;

pub use descriptor::{DescStatus, Descriptor, Owner};
pub use descriptor_ring::{Completion, DescriptorRing, MAX_RING_SIZE, MIN_RING_SIZE};
