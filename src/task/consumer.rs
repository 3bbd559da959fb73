//! Binding between inbound queues and a task runtime's launch entry
//! point.
//!
//! Every queue-fed task consumes its internal queue (named after the
//! task) on the orchestrator's broker. A task configured with
//! `mq.internal = false` additionally opens its own connection to an
//! independently configured broker and consumes the task-named queue
//! there, decoupling that input source from the orchestrator's broker.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::errors::{ConductorError, ConductorResult};
use crate::messaging::{
    consumer_callback, ConsumeError, ConsumerCallback, Envelope, MessagingProvider, QueueGateway,
};
use crate::task::runtime::{Execution, TaskRuntime};
use crate::task::settings::ConsumerSettings;

/// Live consumer attachments for one task.
pub struct ConsumerBinding {
    gateway: Arc<QueueGateway>,
    external: Option<Arc<QueueGateway>>,
}

impl ConsumerBinding {
    /// Declare the task's queue(s) and start its consumers.
    ///
    /// The internal source always binds; the external source binds only
    /// when the settings disable `mq.internal`.
    pub async fn bind(
        runtime: Arc<TaskRuntime>,
        settings: &ConsumerSettings,
    ) -> ConductorResult<Self> {
        let gateway = Arc::clone(runtime.gateway());
        let concurrency = runtime.settings().concurrency;
        let callback = Self::launch_callback(Arc::clone(&runtime));

        gateway.create_queue(runtime.name()).await?;
        gateway
            .create_consumers(runtime.name(), concurrency, callback.clone())
            .await?;

        let external = if settings.internal {
            None
        } else {
            let broker = settings.broker_config().ok_or_else(|| {
                ConductorError::ConfigurationError(format!(
                    "task '{}' has no external broker settings",
                    runtime.name()
                ))
            })?;

            let provider = MessagingProvider::connect(&broker).await?;
            let external = Arc::new(QueueGateway::new(Arc::new(provider)));
            external.create_queue(runtime.name()).await?;
            external
                .create_consumers(runtime.name(), concurrency, callback)
                .await?;
            Some(external)
        };

        Ok(Self { gateway, external })
    }

    /// Decode an envelope and hand it to the runtime.
    ///
    /// A payload that does not deserialize as an envelope is a poison
    /// message: classified malformed so the gateway drops it.
    fn launch_callback(runtime: Arc<TaskRuntime>) -> ConsumerCallback {
        consumer_callback(move |value: Value| {
            let runtime = Arc::clone(&runtime);
            async move {
                let envelope: Envelope<Value> = serde_json::from_value(value)
                    .map_err(|e| ConsumeError::malformed(e.to_string()))?;
                runtime.launch(Execution::from_envelope(envelope)).await;
                Ok(())
            }
        })
    }

    /// Cancel all consumers; the external connection (if any) is closed.
    pub async fn unbind(&self) {
        self.gateway.cancel_consumers();

        if let Some(external) = &self.external {
            if let Err(e) = external.close().await {
                warn!(error = %e, "failed to close external broker connection");
            }
        }
    }
}
