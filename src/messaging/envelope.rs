//! Wire-level wrapper types.
//!
//! Every payload in transit is wrapped in an [`Envelope`] correlating it
//! with its sender, dispatch time and execution id. Outcomes are reported
//! with a [`StatusMessage`]. Field names follow the established wire shape
//! (`camelCase`), so envelopes interoperate with the other producers and
//! consumers on the same brokers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::ExecutionStatus;

/// Generic wrapper correlating a payload with its origin.
///
/// The `execution_id` is the sole correlation key between a triggering
/// message and its eventual [`StatusMessage`]; the runtime performs no
/// deduplication on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub message: Option<T>,
    pub sender: String,
    pub dispatch_time: DateTime<Utc>,
    pub execution_id: String,
}

impl<T> Envelope<T> {
    pub fn new(
        message: Option<T>,
        sender: impl Into<String>,
        dispatch_time: DateTime<Utc>,
        execution_id: impl Into<String>,
    ) -> Self {
        Self {
            message,
            sender: sender.into(),
            dispatch_time,
            execution_id: execution_id.into(),
        }
    }

    /// Wrap a payload with the current timestamp and a freshly generated
    /// execution id.
    pub fn wrap(sender: impl Into<String>, message: Option<T>) -> Self {
        Self::new(message, sender, Utc::now(), Uuid::new_v4().to_string())
    }
}

/// Outcome report published once per execution to the control queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub sender: String,
    pub execution_id: String,
    pub execution_status: ExecutionStatus,
}

impl StatusMessage {
    pub fn new(
        sender: impl Into<String>,
        execution_id: impl Into<String>,
        execution_status: ExecutionStatus,
    ) -> Self {
        Self {
            sender: sender.into(),
            execution_id: execution_id.into(),
            execution_status,
        }
    }
}
