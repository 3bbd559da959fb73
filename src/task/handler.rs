//! The pluggable hook surface a concrete task type supplies.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// Failure raised by a handler hook.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The transform observed a cooperative cancellation signal (a
    /// shutdown request, an interrupted blocking call) and unwound.
    /// Distinct from the timeout supervisor cancelling the job.
    #[error("execution interrupted")]
    Interrupted,
    /// The transform failed.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self::Failed(error.to_string())
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(error: anyhow::Error) -> Self {
        Self::Failed(error.to_string())
    }
}

/// Business logic and lifecycle hooks for one task type.
///
/// Payloads and results cross this boundary as raw JSON values; a
/// concrete handler owns its typed decoding. Returning `None` from
/// [`on_launch`](Self::on_launch) means there is no result to forward to
/// the task's receivers.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// The transform: turn an inbound payload into a result.
    async fn on_launch(
        &self,
        payload: Option<&Value>,
        sender: &str,
        dispatch_time: DateTime<Utc>,
    ) -> Result<Option<Value>, HandlerError>;

    /// Invoked when [`on_launch`](Self::on_launch) fails (excluding
    /// interruption).
    async fn on_exception(
        &self,
        error: &HandlerError,
        payload: Option<&Value>,
        sender: &str,
        dispatch_time: DateTime<Utc>,
    );

    /// Invoked once per execution after its status has been reported,
    /// regardless of outcome.
    async fn on_end(&self, payload: Option<&Value>, sender: &str, dispatch_time: DateTime<Utc>);

    /// Invoked when the timeout supervisor cancels the execution.
    async fn on_timeout(
        &self,
        payload: Option<&Value>,
        sender: &str,
        dispatch_time: DateTime<Utc>,
    );

    /// Correctness predicate applied to a successful transform's result.
    ///
    /// `Ok(false)` or any non-interruption error demotes the outcome to
    /// `FINISHED_WITH_ERRORS` without aborting the execution.
    async fn result_is_correct(
        &self,
        _result: Option<&Value>,
        _payload: Option<&Value>,
        _sender: &str,
        _dispatch_time: DateTime<Utc>,
    ) -> Result<bool, HandlerError> {
        Ok(true)
    }

    /// Setup hook, run once when the task starts.
    async fn on_construct(&self) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Teardown hook, run once when the task stops.
    async fn on_destroy(&self) -> Result<(), HandlerError> {
        Ok(())
    }
}
