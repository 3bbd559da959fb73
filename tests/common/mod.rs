//! Shared helpers for integration tests: a scriptable recording handler
//! and queue-draining utilities over the in-memory broker.
#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::Instant;

use conductor_core::messaging::{
    Envelope, InMemoryMessagingService, MessagingProvider, QueueGateway, StatusMessage,
};
use conductor_core::task::{HandlerError, TaskHandler};

/// What the recording handler should do on launch.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Return the inbound payload (or a marker value when there is none).
    Echo,
    /// Succeed with no result.
    ReturnNone,
    /// Fail the transform.
    Fail(String),
    /// Observe a cooperative cancellation inside the transform.
    Interrupt,
    /// Sleep, then return the given result.
    Sleep { ms: u64, result: Option<Value> },
    /// Succeed, but the correctness predicate rejects the result.
    WrongResult,
    /// Succeed, but the correctness predicate itself fails.
    PredicateFails,
    /// Behave according to the payload's `mode` field: `ok`, `wrong`,
    /// `fail`, `interrupt` or `hang`.
    PayloadDriven,
}

/// Observable side effects of a handler, shared with the test body.
#[derive(Debug, Default)]
pub struct Probe {
    pub launches: AtomicU64,
    pub exceptions: AtomicU64,
    pub ends: AtomicU64,
    pub timeouts: AtomicU64,
    pub constructs: AtomicU64,
    pub destroys: AtomicU64,
    pub active: AtomicI64,
    pub max_active: AtomicI64,
    pub intervals: Mutex<Vec<(Instant, Instant)>>,
}

impl Probe {
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::SeqCst)
    }

    pub fn exceptions(&self) -> u64 {
        self.exceptions.load(Ordering::SeqCst)
    }

    pub fn ends(&self) -> u64 {
        self.ends.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> i64 {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn intervals(&self) -> Vec<(Instant, Instant)> {
        self.intervals.lock().clone()
    }
}

/// Task handler scripted by a [`Behavior`], recording everything into a
/// [`Probe`].
pub struct RecordingHandler {
    behavior: Behavior,
    probe: Arc<Probe>,
}

impl RecordingHandler {
    pub fn new(behavior: Behavior) -> (Arc<Self>, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let handler = Arc::new(Self {
            behavior,
            probe: Arc::clone(&probe),
        });
        (handler, probe)
    }
}

#[async_trait]
impl TaskHandler for RecordingHandler {
    async fn on_launch(
        &self,
        payload: Option<&Value>,
        _sender: &str,
        _dispatch_time: DateTime<Utc>,
    ) -> Result<Option<Value>, HandlerError> {
        let started = Instant::now();
        let active = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(active, Ordering::SeqCst);

        let outcome = match &self.behavior {
            Behavior::Echo => Ok(Some(
                payload.cloned().unwrap_or_else(|| json!({"tick": true})),
            )),
            Behavior::ReturnNone => Ok(None),
            Behavior::Fail(message) => Err(HandlerError::failed(message.clone())),
            Behavior::Interrupt => Err(HandlerError::Interrupted),
            Behavior::Sleep { ms, result } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(result.clone())
            }
            Behavior::WrongResult | Behavior::PredicateFails => {
                Ok(Some(json!({"checked": false})))
            }
            Behavior::PayloadDriven => {
                let mode = payload
                    .and_then(|p| p.get("mode"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("ok");
                match mode {
                    "fail" => Err(HandlerError::failed("scripted failure")),
                    "interrupt" => Err(HandlerError::Interrupted),
                    "hang" => {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Ok(None)
                    }
                    mode => Ok(Some(json!({"mode": mode}))),
                }
            }
        };

        self.probe.active.fetch_sub(1, Ordering::SeqCst);
        self.probe.intervals.lock().push((started, Instant::now()));
        self.probe.launches.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn on_exception(
        &self,
        _error: &HandlerError,
        _payload: Option<&Value>,
        _sender: &str,
        _dispatch_time: DateTime<Utc>,
    ) {
        self.probe.exceptions.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_end(&self, _payload: Option<&Value>, _sender: &str, _dispatch_time: DateTime<Utc>) {
        self.probe.ends.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_timeout(
        &self,
        _payload: Option<&Value>,
        _sender: &str,
        _dispatch_time: DateTime<Utc>,
    ) {
        self.probe.timeouts.fetch_add(1, Ordering::SeqCst);
    }

    async fn result_is_correct(
        &self,
        result: Option<&Value>,
        _payload: Option<&Value>,
        _sender: &str,
        _dispatch_time: DateTime<Utc>,
    ) -> Result<bool, HandlerError> {
        match &self.behavior {
            Behavior::WrongResult => Ok(false),
            Behavior::PredicateFails => Err(HandlerError::failed("predicate blew up")),
            Behavior::PayloadDriven => Ok(result
                .and_then(|r| r.get("mode"))
                .and_then(|m| m.as_str())
                .map(|mode| mode != "wrong")
                .unwrap_or(true)),
            _ => Ok(true),
        }
    }

    async fn on_construct(&self) -> Result<(), HandlerError> {
        self.probe.constructs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_destroy(&self) -> Result<(), HandlerError> {
        self.probe.destroys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Gateway over a fresh in-memory broker, tuned for fast test polling.
pub fn in_memory_gateway() -> Arc<QueueGateway> {
    let provider = Arc::new(MessagingProvider::InMemory(InMemoryMessagingService::new()));
    Arc::new(
        QueueGateway::new(provider)
            .with_poll_interval(Duration::from_millis(10))
            .with_visibility_timeout(Duration::from_millis(200)),
    )
}

/// Poll a predicate until it holds or the timeout elapses.
pub async fn wait_until<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

/// Receive-and-acknowledge every status message currently on a queue.
pub async fn drain_statuses(gateway: &QueueGateway, queue: &str) -> Vec<StatusMessage> {
    drain(gateway, queue).await
}

/// Receive-and-acknowledge every envelope currently on a queue.
pub async fn drain_envelopes(gateway: &QueueGateway, queue: &str) -> Vec<Envelope<Value>> {
    drain(gateway, queue).await
}

async fn drain<T>(gateway: &QueueGateway, queue: &str) -> Vec<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + Clone + 'static,
{
    let provider = gateway.provider();
    let mut drained = Vec::new();

    loop {
        let batch = provider
            .receive_messages::<T>(queue, 32, Duration::from_secs(60))
            .await
            .expect("receive from test queue");
        if batch.is_empty() {
            break;
        }
        for message in batch {
            provider
                .ack_message(queue, &message.receipt_handle)
                .await
                .expect("ack test message");
            drained.push(message.message);
        }
    }

    drained
}
