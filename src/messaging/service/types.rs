//! Core types for the provider-agnostic messaging abstraction.

use std::time::Duration;

/// Unique identifier for a queued message.
///
/// The format is provider-specific:
/// - RabbitMQ: session-local publish counter as string
/// - InMemory: per-queue sequence number as string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Handle for acknowledging a received message.
///
/// The format is provider-specific:
/// - RabbitMQ: delivery tag as string
/// - InMemory: message sequence number as string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(pub String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReceiptHandle {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ReceiptHandle {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}

/// A message received from a queue, with delivery metadata.
#[derive(Debug, Clone)]
pub struct QueuedMessage<T> {
    /// Handle for acknowledging this message.
    pub receipt_handle: ReceiptHandle,

    /// The deserialized message payload.
    pub message: T,

    /// Number of times this message has been delivered.
    ///
    /// Increments each time the message becomes visible again after an
    /// unacknowledged delivery.
    pub receive_count: u32,

    /// When the message was originally enqueued.
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

impl<T> QueuedMessage<T> {
    pub fn new(
        receipt_handle: ReceiptHandle,
        message: T,
        receive_count: u32,
        enqueued_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            receipt_handle,
            message,
            receive_count,
            enqueued_at,
        }
    }
}

/// Queue statistics for observability and test assertions.
#[derive(Debug, Clone)]
pub struct QueueStats {
    /// Queue name.
    pub queue_name: String,

    /// Total number of messages in the queue (visible + in flight).
    pub message_count: u64,

    /// Number of messages currently claimed by a consumer.
    ///
    /// Only available for providers that track it.
    pub in_flight_count: Option<u64>,

    /// Age of the oldest message in the queue.
    pub oldest_message_age: Option<Duration>,
}

impl QueueStats {
    pub fn new(queue_name: impl Into<String>, message_count: u64) -> Self {
        Self {
            queue_name: queue_name.into(),
            message_count,
            in_flight_count: None,
            oldest_message_age: None,
        }
    }

    pub fn with_in_flight_count(mut self, count: u64) -> Self {
        self.in_flight_count = Some(count);
        self
    }

    pub fn with_oldest_message_age(mut self, age: Duration) -> Self {
        self.oldest_message_age = Some(age);
        self
    }
}
