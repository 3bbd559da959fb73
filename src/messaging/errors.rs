//! Error types for the messaging layer.
//!
//! Two taxonomies live here. [`MessagingError`] covers broker operations
//! (connect, declare, publish, receive, ack). [`ConsumeError`] is the
//! classification a consumer callback returns to drive the gateway's
//! acknowledgment policy: retry, drop-as-poison, or drop-as-unexpected.

use thiserror::Error;

/// Broker operation failures.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },

    #[error("Invalid receipt handle: {handle}")]
    InvalidReceiptHandle { handle: String },

    #[error("Message not found: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },
}

impl MessagingError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a queue operation error
    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a queue not found error
    pub fn queue_not_found(queue_name: impl Into<String>) -> Self {
        Self::QueueNotFound {
            queue_name: queue_name.into(),
        }
    }

    /// Create a message serialization error
    pub fn message_serialization(message: impl Into<String>) -> Self {
        Self::MessageSerialization {
            message: message.into(),
        }
    }

    /// Create a message deserialization error
    pub fn message_deserialization(message: impl Into<String>) -> Self {
        Self::MessageDeserialization {
            message: message.into(),
        }
    }

    /// Create an invalid receipt handle error
    pub fn invalid_receipt_handle(handle: impl Into<String>) -> Self {
        Self::InvalidReceiptHandle {
            handle: handle.into(),
        }
    }

    /// Create a message not found error
    pub fn message_not_found(message_id: impl Into<String>) -> Self {
        Self::MessageNotFound {
            message_id: message_id.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;

/// Failure classification returned by a consumer callback.
///
/// The gateway applies a three-way acknowledgment policy based on the
/// variant:
///
/// - [`Retry`](ConsumeError::Retry): the message is left unacknowledged so
///   the broker redelivers it once its visibility window expires. Use
///   sparingly; a message that fails the same way on every delivery will
///   stall its queue.
/// - [`Malformed`](ConsumeError::Malformed): the message is acknowledged
///   and dropped. Redelivery cannot fix a format defect.
/// - [`Other`](ConsumeError::Other): the message is acknowledged and
///   dropped rather than risking an infinite redelivery loop.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("retryable delivery failure: {0}")]
    Retry(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("consumer failure: {0}")]
    Other(String),
}

impl ConsumeError {
    pub fn retry(message: impl Into<String>) -> Self {
        Self::Retry(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}
