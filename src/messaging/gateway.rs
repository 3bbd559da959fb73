//! Uniform queue operations over a broker backend.
//!
//! A [`QueueGateway`] owns a set of competing consumers and exposes the
//! small operation surface the task layer needs: declare, consume, send,
//! report status, purge, close. Each task gets its own gateway instance
//! (so cancelling its consumers cannot affect siblings), typically sharing
//! one underlying [`MessagingProvider`] connection.
//!
//! The gateway also owns the acknowledgment policy applied to every
//! consumed message, regardless of backend: see [`ConsumeError`] for the
//! three-way classification.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::constants::ExecutionStatus;
use crate::messaging::envelope::{Envelope, StatusMessage};
use crate::messaging::errors::{ConsumeError, MessagingResult};
use crate::messaging::service::types::{QueueStats, QueuedMessage};
use crate::messaging::service::MessagingProvider;

/// Interval between connection-liveness probes while an operation waits
/// for the broker.
const READY_POLL: Duration = Duration::from_millis(100);

/// Callback invoked for every consumed message.
///
/// Receives the raw JSON payload; the returned [`ConsumeError`] variant
/// (if any) drives the acknowledgment policy.
pub type ConsumerCallback =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), ConsumeError>> + Send + Sync>;

/// Build a [`ConsumerCallback`] from an async closure.
pub fn consumer_callback<F, Fut>(f: F) -> ConsumerCallback
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), ConsumeError>> + Send + 'static,
{
    Arc::new(move |value| Box::pin(f(value)))
}

struct ConsumerHandle {
    queue: String,
    handle: JoinHandle<()>,
}

/// Backend-agnostic queue gateway.
pub struct QueueGateway {
    provider: Arc<MessagingProvider>,
    consumers: Mutex<Vec<ConsumerHandle>>,
    poll_interval: Duration,
    visibility_timeout: Duration,
}

impl QueueGateway {
    pub fn new(provider: Arc<MessagingProvider>) -> Self {
        Self {
            provider,
            consumers: Mutex::new(Vec::new()),
            poll_interval: Duration::from_millis(50),
            visibility_timeout: Duration::from_secs(30),
        }
    }

    /// Interval consumers sleep between polls of an empty queue.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Visibility window for consumed-but-unacknowledged messages.
    ///
    /// A message left unacknowledged (the retryable-error path) becomes
    /// deliverable again once this window expires.
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn provider(&self) -> &Arc<MessagingProvider> {
        &self.provider
    }

    /// Block until the underlying connection reports itself live.
    ///
    /// Single-connection-per-gateway design: operations poll connection
    /// state rather than queueing behind a reconnect mechanism.
    async fn wait_until_ready(&self) {
        loop {
            match self.provider.health_check().await {
                Ok(true) => return,
                Ok(false) => {
                    debug!(
                        provider = self.provider.provider_name(),
                        "connection not ready, waiting"
                    );
                }
                Err(e) => {
                    debug!(
                        provider = self.provider.provider_name(),
                        error = %e,
                        "connection health probe failed, waiting"
                    );
                }
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    /// Idempotent durable queue declaration.
    pub async fn create_queue(&self, queue: &str) -> MessagingResult<()> {
        self.wait_until_ready().await;
        self.provider.ensure_queue(queue).await
    }

    /// Start `replicas` competing consumers on `queue`.
    ///
    /// Each replica is an independent poll loop; the broker's visibility
    /// semantics deliver every message to exactly one of them.
    pub async fn create_consumers(
        &self,
        queue: &str,
        replicas: usize,
        on_message: ConsumerCallback,
    ) -> MessagingResult<()> {
        self.wait_until_ready().await;

        let mut consumers = self.consumers.lock();
        for replica in 0..replicas {
            debug!(queue, replica = replica + 1, "creating consumer");
            let handle = self.spawn_consumer(queue, on_message.clone());
            consumers.push(ConsumerHandle {
                queue: queue.to_string(),
                handle,
            });
        }

        Ok(())
    }

    fn spawn_consumer(&self, queue: &str, on_message: ConsumerCallback) -> JoinHandle<()> {
        let provider = Arc::clone(&self.provider);
        let queue = queue.to_string();
        let poll_interval = self.poll_interval;
        let visibility_timeout = self.visibility_timeout;

        tokio::spawn(async move {
            loop {
                let batch = match provider
                    .receive_messages::<Value>(&queue, 1, visibility_timeout)
                    .await
                {
                    Ok(batch) => batch,
                    Err(e) => {
                        warn!(queue, error = %e, "receive failed, backing off");
                        tokio::time::sleep(poll_interval).await;
                        continue;
                    }
                };

                if batch.is_empty() {
                    tokio::time::sleep(poll_interval).await;
                    continue;
                }

                for message in batch {
                    Self::dispatch(&provider, &queue, message, &on_message).await;
                }
            }
        })
    }

    /// Run the callback for one message and apply the acknowledgment
    /// policy to its result.
    ///
    /// - success: acknowledge
    /// - retryable failure: leave unacknowledged; the broker redelivers
    ///   once the visibility window expires
    /// - malformed message: acknowledge; redelivery cannot fix a format
    ///   defect
    /// - anything else: acknowledge; dropping beats an infinite
    ///   redelivery loop
    async fn dispatch(
        provider: &MessagingProvider,
        queue: &str,
        message: QueuedMessage<Value>,
        on_message: &ConsumerCallback,
    ) {
        let receipt = message.receipt_handle.clone();

        let mut acknowledge = true;
        match on_message(message.message).await {
            Ok(()) => {}
            Err(ConsumeError::Retry(reason)) => {
                warn!(queue, reason = %reason, "leaving message unacknowledged for redelivery");
                acknowledge = false;
            }
            Err(ConsumeError::Malformed(reason)) => {
                error!(queue, reason = %reason, "dropping malformed message");
            }
            Err(ConsumeError::Other(reason)) => {
                error!(queue, reason = %reason, "consumer failed, message dropped");
            }
        }

        if acknowledge {
            if let Err(e) = provider.ack_message(queue, &receipt).await {
                warn!(queue, error = %e, "acknowledgment failed");
            }
        }
    }

    /// Stop and discard every consumer owned by this gateway.
    pub fn cancel_consumers(&self) {
        let mut consumers = self.consumers.lock();
        for consumer in consumers.drain(..) {
            debug!(queue = consumer.queue, "cancelling consumer");
            consumer.handle.abort();
        }
    }

    /// Wrap `payload` in an [`Envelope`] stamped with the current time and
    /// publish it.
    ///
    /// When `execution_id` is `None` a fresh id is generated. Returns the
    /// execution id the envelope was sent with.
    pub async fn send(
        &self,
        sender: &str,
        queue: &str,
        payload: Value,
        execution_id: Option<String>,
    ) -> MessagingResult<String> {
        self.send_expiring(sender, queue, payload, execution_id, None)
            .await
    }

    /// Like [`send`](Self::send), with an optional message time-to-live.
    pub async fn send_expiring(
        &self,
        sender: &str,
        queue: &str,
        payload: Value,
        execution_id: Option<String>,
        ttl: Option<Duration>,
    ) -> MessagingResult<String> {
        self.wait_until_ready().await;

        let execution_id = execution_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let envelope = Envelope::new(Some(payload), sender, Utc::now(), execution_id.clone());
        self.provider
            .send_expiring_message(queue, &envelope, ttl)
            .await?;

        Ok(execution_id)
    }

    /// Publish a [`StatusMessage`] for an execution.
    pub async fn send_status(
        &self,
        sender: &str,
        queue: &str,
        execution_id: &str,
        execution_status: ExecutionStatus,
    ) -> MessagingResult<()> {
        self.wait_until_ready().await;

        let status = StatusMessage::new(sender, execution_id, execution_status);
        self.provider.send_message(queue, &status).await?;
        Ok(())
    }

    /// Drain all currently enqueued messages without processing them.
    pub async fn purge(&self, queue: &str) -> MessagingResult<u64> {
        self.wait_until_ready().await;
        self.provider.purge_queue(queue).await
    }

    /// Queue depth and in-flight statistics.
    pub async fn queue_stats(&self, queue: &str) -> MessagingResult<QueueStats> {
        self.wait_until_ready().await;
        self.provider.queue_stats(queue).await
    }

    /// Cancel consumers and release the underlying connection.
    pub async fn close(&self) -> MessagingResult<()> {
        self.cancel_consumers();
        self.provider.close().await
    }
}

impl Drop for QueueGateway {
    fn drop(&mut self) {
        for consumer in self.consumers.lock().drain(..) {
            consumer.handle.abort();
        }
    }
}
