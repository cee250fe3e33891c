//! Durable message bus abstraction for stoneridge (spec §4.2).
//!
//! A trait abstraction over the queue contract (`QueueWriter`,
//! `QueueListener`, `Rpc`) backed by a concrete AMQP 0.9.1 implementation
//! via `amiquip`. A `LoopbackBus` in-memory double backs tests that would
//! otherwise need a running broker.

pub mod amqp;
pub mod loopback;
pub mod traits;

pub use amqp::AmqpBus;
pub use loopback::LoopbackBus;
pub use traits::{QueueListener, QueueWriter, Rpc};
