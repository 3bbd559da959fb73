//! Core trait definitions for provider-agnostic messaging.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{MessageId, QueueStats, QueuedMessage, ReceiptHandle};
use super::MessagingError;

/// Provider-agnostic messaging operations.
///
/// Implementations provide the actual broker backend (RabbitMQ, InMemory).
/// The trait is designed to be implementable by any queue system that
/// supports:
///
/// - idempotent, durable queue declaration
/// - send/receive with a visibility window
/// - message acknowledgment (ack/nack)
/// - purging and basic statistics
#[async_trait]
pub trait MessagingService: Send + Sync + 'static {
    /// Create a queue if it doesn't exist (idempotent, durable).
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError>;

    /// Send a message to a queue.
    ///
    /// Returns the message id assigned by the provider.
    async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> Result<MessageId, MessagingError> {
        self.send_expiring_message(queue_name, message, None).await
    }

    /// Send a message with an optional time-to-live.
    ///
    /// A message still enqueued when its TTL elapses is discarded by the
    /// broker instead of being delivered.
    async fn send_expiring_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
        ttl: Option<Duration>,
    ) -> Result<MessageId, MessagingError>;

    /// Receive up to `max_messages` messages.
    ///
    /// Received messages become invisible to other consumers for
    /// `visibility_timeout`. If not acknowledged before the window
    /// expires, they become visible again and are redelivered.
    async fn receive_messages<T: QueueMessage>(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<T>>, MessagingError>;

    /// Acknowledge successful processing (delete the message).
    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError>;

    /// Negative acknowledge.
    ///
    /// With `requeue = true` the message becomes immediately visible
    /// again; with `requeue = false` it is discarded (or dead-lettered,
    /// where the broker supports it).
    async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), MessagingError>;

    /// Drop every message currently enqueued without processing any.
    ///
    /// Returns the number of messages removed.
    async fn purge_queue(&self, queue_name: &str) -> Result<u64, MessagingError>;

    /// Get queue statistics.
    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError>;

    /// Verify the broker connection is live.
    async fn health_check(&self) -> Result<bool, MessagingError>;

    /// Release the underlying connection.
    async fn close(&self) -> Result<(), MessagingError>;

    /// Provider name for logging/metrics.
    fn provider_name(&self) -> &'static str;
}

/// Message serialization contract.
///
/// Types implementing this trait can be sent through the messaging
/// system. The blanket implementation below covers any serde-compatible
/// type with JSON framing, which is the wire format for all payloads.
pub trait QueueMessage: Send + Sync + Clone + 'static {
    /// Serialize the message to bytes.
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError>;

    /// Deserialize the message from bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError>
    where
        Self: Sized;
}

impl<T> QueueMessage for T
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + Clone + 'static,
{
    fn to_bytes(&self) -> Result<Vec<u8>, MessagingError> {
        serde_json::to_vec(self).map_err(|e| MessagingError::message_serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(bytes)
            .map_err(|e| MessagingError::message_deserialization(e.to_string()))
    }
}
