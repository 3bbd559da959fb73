//! Enum dispatch for messaging providers.
//!
//! Uses enum dispatch instead of `Arc<dyn MessagingService>`: the service
//! trait has generic send/receive methods, so it is not object-safe, and
//! the closed set of backends keeps hot-path calls free of vtable
//! indirection.

use std::time::Duration;

use super::providers::{InMemoryMessagingService, RabbitMqMessagingService};
use super::traits::{MessagingService, QueueMessage};
use super::types::{MessageId, QueueStats, QueuedMessage, ReceiptHandle};
use crate::config::{BrokerConfig, BrokerKind};
use crate::messaging::errors::MessagingError;

/// One of the supported broker backends.
#[derive(Debug)]
pub enum MessagingProvider {
    /// In-memory queues (testing, single-process deployments).
    InMemory(InMemoryMessagingService),
    /// RabbitMQ via the lapin crate.
    RabbitMq(RabbitMqMessagingService),
}

impl MessagingProvider {
    /// Construct the backend selected by `config`, connecting where the
    /// backend has a remote broker.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, MessagingError> {
        match config.kind {
            BrokerKind::InMemory => Ok(Self::InMemory(InMemoryMessagingService::new())),
            BrokerKind::RabbitMq => Ok(Self::RabbitMq(
                RabbitMqMessagingService::connect(config).await?,
            )),
        }
    }

    /// Provider name for logging/metrics.
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::InMemory(s) => s.provider_name(),
            Self::RabbitMq(s) => s.provider_name(),
        }
    }

    /// Create a queue if it doesn't exist.
    pub async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        match self {
            Self::InMemory(s) => s.ensure_queue(queue_name).await,
            Self::RabbitMq(s) => s.ensure_queue(queue_name).await,
        }
    }

    /// Send a message to a queue.
    pub async fn send_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> Result<MessageId, MessagingError> {
        match self {
            Self::InMemory(s) => s.send_message(queue_name, message).await,
            Self::RabbitMq(s) => s.send_message(queue_name, message).await,
        }
    }

    /// Send a message with an optional time-to-live.
    pub async fn send_expiring_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
        ttl: Option<Duration>,
    ) -> Result<MessageId, MessagingError> {
        match self {
            Self::InMemory(s) => s.send_expiring_message(queue_name, message, ttl).await,
            Self::RabbitMq(s) => s.send_expiring_message(queue_name, message, ttl).await,
        }
    }

    /// Receive messages with a visibility window.
    pub async fn receive_messages<T: QueueMessage>(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<T>>, MessagingError> {
        match self {
            Self::InMemory(s) => {
                s.receive_messages(queue_name, max_messages, visibility_timeout)
                    .await
            }
            Self::RabbitMq(s) => {
                s.receive_messages(queue_name, max_messages, visibility_timeout)
                    .await
            }
        }
    }

    /// Acknowledge a message.
    pub async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        match self {
            Self::InMemory(s) => s.ack_message(queue_name, receipt_handle).await,
            Self::RabbitMq(s) => s.ack_message(queue_name, receipt_handle).await,
        }
    }

    /// Negative acknowledge a message.
    pub async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), MessagingError> {
        match self {
            Self::InMemory(s) => s.nack_message(queue_name, receipt_handle, requeue).await,
            Self::RabbitMq(s) => s.nack_message(queue_name, receipt_handle, requeue).await,
        }
    }

    /// Drop every message currently enqueued.
    pub async fn purge_queue(&self, queue_name: &str) -> Result<u64, MessagingError> {
        match self {
            Self::InMemory(s) => s.purge_queue(queue_name).await,
            Self::RabbitMq(s) => s.purge_queue(queue_name).await,
        }
    }

    /// Get queue statistics.
    pub async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        match self {
            Self::InMemory(s) => s.queue_stats(queue_name).await,
            Self::RabbitMq(s) => s.queue_stats(queue_name).await,
        }
    }

    /// Verify the broker connection is live.
    pub async fn health_check(&self) -> Result<bool, MessagingError> {
        match self {
            Self::InMemory(s) => s.health_check().await,
            Self::RabbitMq(s) => s.health_check().await,
        }
    }

    /// Release the underlying connection.
    pub async fn close(&self) -> Result<(), MessagingError> {
        match self {
            Self::InMemory(s) => s.close().await,
            Self::RabbitMq(s) => s.close().await,
        }
    }
}
