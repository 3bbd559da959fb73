//! Broker backend implementations.
//!
//! - `in_memory.rs` - process-local queues for testing and single-node use
//! - `rabbitmq.rs` - AMQP 0.9.1 via the `lapin` crate

pub mod in_memory;
pub mod rabbitmq;

pub use in_memory::InMemoryMessagingService;
pub use rabbitmq::RabbitMqMessagingService;
