//! Message queue integration layer.
//!
//! This module provides the backend-agnostic queue capability the task
//! layer builds on:
//!
//! - [`envelope`] - wire-level wrapper types (`Envelope`, `StatusMessage`)
//! - [`errors`] - broker errors and the consumer failure taxonomy
//! - [`service`] - the provider abstraction and backend implementations
//! - [`gateway`] - uniform queue operations plus the acknowledgment policy

pub mod envelope;
pub mod errors;
pub mod gateway;
pub mod service;

pub use envelope::{Envelope, StatusMessage};
pub use errors::{ConsumeError, MessagingError, MessagingResult};
pub use gateway::{consumer_callback, ConsumerCallback, QueueGateway};
pub use service::{
    InMemoryMessagingService, MessagingProvider, MessagingService, QueueMessage, QueueStats,
    QueuedMessage, RabbitMqMessagingService,
};
