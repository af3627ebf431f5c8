//! MorpheusX switch CPU port packet engine
//!
//! Moves Ethernet frames between the CPU and the switch DMA engine over
//! shared descriptor rings. The device is an asynchronous agent that cannot
//! take a lock, so every slot is handed across with an ownership flag and a
//! visibility barrier on each side.
//!
//! # Layout
//! - `dma`: barriers, cache hooks, packet buffers and the pool
//! - `ring`: descriptors and the descriptor ring
//! - `device`: register interface and the device-side port
//! - `engine`: the ring set (RX, TX, poll pass, watchdog)
//! - `scheduler`, `flow`, `health`: the control state machines

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod device;
pub mod dma;
pub mod engine;
pub mod error;
pub mod flow;
pub mod health;
pub mod ring;
pub mod scheduler;

pub use config::{EngineConfig, FramingMode};
pub use device::{CompletionFlags, DeviceRegisters, RingId};
pub use dma::{BufferPool, PacketBuffer};
pub use engine::{BufferCensus, PacketSink, PassStatus, PollOutcome, RingSet, RxPacket};
pub use error::{ConfigError, NotReady, PoolExhausted, SendRejected, TxError};
pub use health::{HealthReport, Verdict};
pub use ring::{DescriptorRing, Owner};
pub use scheduler::SchedState;
