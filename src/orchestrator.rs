//! Host process surface: owns the broker connection, the task factory
//! and the set of named tasks.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{error, info};

use crate::config::OrchestratorConfig;
use crate::errors::{ConductorError, ConductorResult};
use crate::messaging::{MessagingProvider, QueueGateway};
use crate::task::factory::{Task, TaskDefinition, TaskFactory, TaskTypeDefinition};
use crate::task::runtime::TaskInfo;

/// Loads named tasks and drives their lifecycle.
pub struct Orchestrator {
    factory: TaskFactory,
    gateway: Arc<QueueGateway>,
    tasks: DashMap<String, Arc<Task>>,
}

impl Orchestrator {
    /// Connect to the configured internal broker and prepare the control
    /// queue.
    pub async fn connect(config: OrchestratorConfig) -> ConductorResult<Self> {
        let provider = Arc::new(MessagingProvider::connect(&config.broker).await?);
        provider.ensure_queue(&config.control_queue).await?;
        info!(
            provider = provider.provider_name(),
            control_queue = config.control_queue,
            "orchestrator connected"
        );

        let gateway = Arc::new(
            QueueGateway::new(Arc::clone(&provider))
                .with_poll_interval(Duration::from_millis(config.consumer.poll_interval_ms))
                .with_visibility_timeout(Duration::from_millis(
                    config.consumer.visibility_timeout_ms,
                )),
        );

        Ok(Self {
            factory: TaskFactory::new(provider, config),
            gateway,
            tasks: DashMap::new(),
        })
    }

    pub fn factory(&self) -> &TaskFactory {
        &self.factory
    }

    /// Host-level gateway on the internal broker, for feeding task queues
    /// and inspecting the control queue.
    pub fn gateway(&self) -> &Arc<QueueGateway> {
        &self.gateway
    }

    /// Publish a payload to a queue on the internal broker, wrapped in a
    /// fresh envelope. Returns the generated execution id.
    pub async fn send(
        &self,
        sender: &str,
        queue: &str,
        payload: Value,
    ) -> ConductorResult<String> {
        Ok(self.gateway.send(sender, queue, payload, None).await?)
    }

    /// Register a task type under its identifier.
    pub fn register_task_type(&self, type_name: impl Into<String>, definition: TaskTypeDefinition) {
        self.factory.register(type_name, definition);
    }

    /// Build a task and track it by name. The task is not started.
    pub fn create_task(&self, definition: &TaskDefinition) -> ConductorResult<Arc<Task>> {
        if self.tasks.contains_key(&definition.name) {
            return Err(ConductorError::DuplicateTask(definition.name.clone()));
        }

        let task = Arc::new(self.factory.build(definition)?);
        self.tasks.insert(definition.name.clone(), Arc::clone(&task));
        Ok(task)
    }

    pub fn task(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.get(name).map(|t| Arc::clone(&t))
    }

    /// Start every tracked task. Failures are logged and do not prevent
    /// sibling tasks from starting.
    pub async fn start_all(&self) {
        for task in self.snapshot() {
            if let Err(e) = task.start().await {
                error!(task = task.name(), error = %e, "task failed to start");
            }
        }
    }

    /// Stop every tracked task, cancelling their outstanding work.
    pub async fn stop_all(&self) {
        for task in self.snapshot() {
            task.stop().await;
        }
    }

    /// Stop a task and forget it.
    pub async fn remove_task(&self, name: &str) -> ConductorResult<()> {
        let (_, task) = self
            .tasks
            .remove(name)
            .ok_or_else(|| ConductorError::TaskError(format!("no task named '{name}'")))?;
        task.stop().await;
        Ok(())
    }

    /// Point-in-time summaries for all tracked tasks.
    pub fn infos(&self) -> Vec<TaskInfo> {
        self.tasks.iter().map(|t| t.info()).collect()
    }

    fn snapshot(&self) -> Vec<Arc<Task>> {
        self.tasks.iter().map(|t| Arc::clone(&t)).collect()
    }
}
