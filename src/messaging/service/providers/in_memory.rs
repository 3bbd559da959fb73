//! Thread-safe in-memory queue implementation for testing and development.
//!
//! Messages live in a `VecDeque` per queue behind a `tokio::sync::RwLock`,
//! with per-message visibility timestamps simulating broker redelivery:
//! a received message stays invisible until its window expires, then
//! becomes deliverable again unless acknowledged first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::messaging::errors::MessagingError;
use crate::messaging::service::traits::{MessagingService, QueueMessage};
use crate::messaging::service::types::{MessageId, QueueStats, QueuedMessage, ReceiptHandle};

/// In-memory message with visibility tracking.
#[derive(Debug, Clone)]
struct StoredMessage {
    id: u64,
    payload: Vec<u8>,
    enqueued_at: DateTime<Utc>,
    /// When the message becomes visible again (None = visible now).
    visible_at: Option<DateTime<Utc>>,
    /// When the message expires and must be silently discarded.
    expires_at: Option<DateTime<Utc>>,
    receive_count: u32,
}

/// In-memory queue with message storage and delivery counters.
#[derive(Debug, Default)]
struct StoredQueue {
    messages: VecDeque<StoredMessage>,
    next_id: u64,
    total_sent: AtomicU64,
    total_received: AtomicU64,
    total_acked: AtomicU64,
    total_nacked: AtomicU64,
}

impl StoredQueue {
    fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    /// Drop messages whose TTL elapsed while they sat in the queue.
    fn evict_expired(&mut self, now: DateTime<Utc>) {
        self.messages
            .retain(|m| m.expires_at.map(|at| at > now).unwrap_or(true));
    }
}

/// In-memory messaging service.
///
/// Provides a complete [`MessagingService`] implementation without an
/// external broker. The primary consumer is the test suite, but it is
/// also the backend behind the `in-memory` broker kind for single-process
/// deployments.
#[derive(Debug)]
pub struct InMemoryMessagingService {
    queues: RwLock<HashMap<String, StoredQueue>>,
    connected: AtomicBool,
}

impl Default for InMemoryMessagingService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessagingService {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(true),
        }
    }

    /// Number of messages currently stored in a queue.
    pub async fn queue_length(&self, queue_name: &str) -> usize {
        let queues = self.queues.read().await;
        queues
            .get(queue_name)
            .map(|q| q.messages.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessagingService for InMemoryMessagingService {
    async fn ensure_queue(&self, queue_name: &str) -> Result<(), MessagingError> {
        let mut queues = self.queues.write().await;
        queues
            .entry(queue_name.to_string())
            .or_insert_with(StoredQueue::new);
        Ok(())
    }

    async fn send_expiring_message<T: QueueMessage>(
        &self,
        queue_name: &str,
        message: &T,
        ttl: Option<Duration>,
    ) -> Result<MessageId, MessagingError> {
        let payload = message.to_bytes()?;

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let id = queue.next_id;
        queue.next_id += 1;
        queue.total_sent.fetch_add(1, Ordering::Relaxed);

        let now = Utc::now();
        queue.messages.push_back(StoredMessage {
            id,
            payload,
            enqueued_at: now,
            visible_at: None,
            expires_at: ttl
                .and_then(|d| chrono::Duration::from_std(d).ok())
                .map(|d| now + d),
            receive_count: 0,
        });

        Ok(MessageId::from(id))
    }

    async fn receive_messages<T: QueueMessage>(
        &self,
        queue_name: &str,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueuedMessage<T>>, MessagingError> {
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Utc::now();
        queue.evict_expired(now);

        let visible_until = now
            + chrono::Duration::from_std(visibility_timeout)
                .unwrap_or_else(|_| chrono::Duration::seconds(30));
        let mut received = Vec::new();

        for msg in queue.messages.iter_mut() {
            if received.len() >= max_messages {
                break;
            }

            let is_visible = msg.visible_at.map(|at| at <= now).unwrap_or(true);
            if !is_visible {
                continue;
            }

            let deserialized = T::from_bytes(&msg.payload)?;

            msg.visible_at = Some(visible_until);
            msg.receive_count += 1;
            queue.total_received.fetch_add(1, Ordering::Relaxed);

            received.push(QueuedMessage::new(
                ReceiptHandle::from(msg.id),
                deserialized,
                msg.receive_count,
                msg.enqueued_at,
            ));
        }

        Ok(received)
    }

    async fn ack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), MessagingError> {
        let message_id: u64 = receipt_handle
            .as_str()
            .parse()
            .map_err(|_| MessagingError::invalid_receipt_handle(receipt_handle.as_str()))?;

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        if let Some(pos) = queue.messages.iter().position(|m| m.id == message_id) {
            queue.messages.remove(pos);
            queue.total_acked.fetch_add(1, Ordering::Relaxed);
            Ok(())
        } else {
            Err(MessagingError::message_not_found(message_id.to_string()))
        }
    }

    async fn nack_message(
        &self,
        queue_name: &str,
        receipt_handle: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), MessagingError> {
        let message_id: u64 = receipt_handle
            .as_str()
            .parse()
            .map_err(|_| MessagingError::invalid_receipt_handle(receipt_handle.as_str()))?;

        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        if requeue {
            if let Some(msg) = queue.messages.iter_mut().find(|m| m.id == message_id) {
                msg.visible_at = None;
                queue.total_nacked.fetch_add(1, Ordering::Relaxed);
                Ok(())
            } else {
                Err(MessagingError::message_not_found(message_id.to_string()))
            }
        } else if let Some(pos) = queue.messages.iter().position(|m| m.id == message_id) {
            queue.messages.remove(pos);
            queue.total_nacked.fetch_add(1, Ordering::Relaxed);
            Ok(())
        } else {
            Err(MessagingError::message_not_found(message_id.to_string()))
        }
    }

    async fn purge_queue(&self, queue_name: &str) -> Result<u64, MessagingError> {
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let purged = queue.messages.len() as u64;
        queue.messages.clear();
        Ok(purged)
    }

    async fn queue_stats(&self, queue_name: &str) -> Result<QueueStats, MessagingError> {
        let queues = self.queues.read().await;
        let queue = queues
            .get(queue_name)
            .ok_or_else(|| MessagingError::queue_not_found(queue_name))?;

        let now = Utc::now();

        let in_flight = queue
            .messages
            .iter()
            .filter(|m| m.visible_at.map(|at| at > now).unwrap_or(false))
            .count() as u64;

        let oldest_age = queue
            .messages
            .front()
            .and_then(|m| (now - m.enqueued_at).to_std().ok());

        let mut stats = QueueStats::new(queue_name, queue.messages.len() as u64)
            .with_in_flight_count(in_flight);

        if let Some(age) = oldest_age {
            stats = stats.with_oldest_message_age(age);
        }

        Ok(stats)
    }

    async fn health_check(&self) -> Result<bool, MessagingError> {
        Ok(self.connected.load(Ordering::SeqCst))
    }

    async fn close(&self) -> Result<(), MessagingError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}
