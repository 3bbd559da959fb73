//! Task construction: a registry mapping type identifiers to handler
//! constructors, and the [`Task`] aggregate wiring a runtime to its
//! driver (consumer binding or scheduler).
//!
//! Construction is atomic: every configuration violation across the base
//! and kind-specific settings is collected, and a task with any violation
//! is never built.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::error;

use crate::config::OrchestratorConfig;
use crate::constants::TaskStatus;
use crate::errors::{ConductorError, ConductorResult};
use crate::messaging::{MessagingProvider, QueueGateway};
use crate::task::consumer::ConsumerBinding;
use crate::task::handler::TaskHandler;
use crate::task::runtime::{TaskInfo, TaskRuntime};
use crate::task::scheduler::{Schedule, Scheduler};
use crate::task::settings::{ConsumerSettings, CyclicalSettings, TaskParams, TaskSettings};

/// How a task type is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Fed by inbound queue messages.
    Consumer,
    /// Fired by a cron expression or fixed delay; no input queue.
    Cyclical,
}

/// Requested task instance: type selector, unique name, flat parameters.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub task_type: String,
    pub name: String,
    pub params: TaskParams,
}

impl TaskDefinition {
    pub fn new(task_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            name: name.into(),
            params: TaskParams::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Constructor producing a handler for a task instance.
pub type HandlerConstructor =
    Arc<dyn Fn(&TaskDefinition) -> ConductorResult<Arc<dyn TaskHandler>> + Send + Sync>;

/// A registered task type: its kind plus how to build its handler.
pub struct TaskTypeDefinition {
    kind: TaskKind,
    constructor: HandlerConstructor,
}

impl TaskTypeDefinition {
    pub fn new<F>(kind: TaskKind, constructor: F) -> Self
    where
        F: Fn(&TaskDefinition) -> ConductorResult<Arc<dyn TaskHandler>> + Send + Sync + 'static,
    {
        Self {
            kind,
            constructor: Arc::new(constructor),
        }
    }

    /// A queue-fed task type.
    pub fn consumer<F>(constructor: F) -> Self
    where
        F: Fn(&TaskDefinition) -> ConductorResult<Arc<dyn TaskHandler>> + Send + Sync + 'static,
    {
        Self::new(TaskKind::Consumer, constructor)
    }

    /// A scheduled task type.
    pub fn cyclical<F>(constructor: F) -> Self
    where
        F: Fn(&TaskDefinition) -> ConductorResult<Arc<dyn TaskHandler>> + Send + Sync + 'static,
    {
        Self::new(TaskKind::Cyclical, constructor)
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }
}

enum TaskDriver {
    Consumer {
        settings: ConsumerSettings,
        binding: tokio::sync::Mutex<Option<ConsumerBinding>>,
    },
    Cyclical(Scheduler),
}

/// A named, configured task: runtime plus its message or timer driver.
pub struct Task {
    task_type: String,
    runtime: Arc<TaskRuntime>,
    driver: TaskDriver,
}

impl Task {
    pub fn name(&self) -> &str {
        self.runtime.name()
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn runtime(&self) -> &Arc<TaskRuntime> {
        &self.runtime
    }

    pub fn status(&self) -> TaskStatus {
        self.runtime.status()
    }

    pub fn info(&self) -> TaskInfo {
        self.runtime.info()
    }

    /// Start the task: transition to IDLE, attach its driver, run the
    /// setup hook. Idempotent while started.
    ///
    /// A binding failure leaves the task IDLE but unbound; callers may
    /// retry via [`stop`](Self::stop) + `start`.
    pub async fn start(&self) -> ConductorResult<()> {
        if !self.runtime.start() {
            return Ok(());
        }

        match &self.driver {
            TaskDriver::Consumer { settings, binding } => {
                match ConsumerBinding::bind(Arc::clone(&self.runtime), settings).await {
                    Ok(bound) => {
                        *binding.lock().await = Some(bound);
                    }
                    Err(e) => {
                        error!(task = self.name(), error = %e, "failed to bind input queues");
                        return Err(e);
                    }
                }
            }
            TaskDriver::Cyclical(scheduler) => scheduler.start(),
        }

        self.runtime.run_setup_hook().await;
        Ok(())
    }

    /// Stop the task: detach its driver, cancel outstanding work, run the
    /// teardown hook. Idempotent while stopped.
    pub async fn stop(&self) {
        match &self.driver {
            TaskDriver::Consumer { binding, .. } => {
                if let Some(bound) = binding.lock().await.take() {
                    bound.unbind().await;
                }
            }
            TaskDriver::Cyclical(scheduler) => scheduler.stop().await,
        }

        self.runtime.stop().await;
    }
}

/// Builds [`Task`]s from registered type definitions.
pub struct TaskFactory {
    registry: DashMap<String, TaskTypeDefinition>,
    provider: Arc<MessagingProvider>,
    config: OrchestratorConfig,
}

impl TaskFactory {
    pub fn new(provider: Arc<MessagingProvider>, config: OrchestratorConfig) -> Self {
        Self {
            registry: DashMap::new(),
            provider,
            config,
        }
    }

    pub fn provider(&self) -> &Arc<MessagingProvider> {
        &self.provider
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Register a task type under its identifier.
    pub fn register(&self, type_name: impl Into<String>, definition: TaskTypeDefinition) {
        self.registry.insert(type_name.into(), definition);
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.registry.iter().map(|e| e.key().clone()).collect()
    }

    /// Build an unstarted task.
    ///
    /// Fails atomically: an unknown type or any settings violation means
    /// no task is constructed, and all violations are reported together.
    pub fn build(&self, definition: &TaskDefinition) -> ConductorResult<Task> {
        let type_def = self
            .registry
            .get(&definition.task_type)
            .ok_or_else(|| ConductorError::UnknownTaskType(definition.task_type.clone()))?;

        let mut violations = Vec::new();
        let settings = TaskSettings::parse(&definition.params, &mut violations);

        enum DriverSettings {
            Consumer(ConsumerSettings),
            Cyclical(CyclicalSettings),
        }

        let driver_settings = match type_def.kind {
            TaskKind::Consumer => DriverSettings::Consumer(ConsumerSettings::parse(
                &definition.params,
                &mut violations,
            )),
            TaskKind::Cyclical => DriverSettings::Cyclical(CyclicalSettings::parse(
                &definition.params,
                &mut violations,
            )),
        };

        if !violations.is_empty() {
            return Err(ConductorError::InvalidTaskConfiguration {
                task: definition.name.clone(),
                violations,
            });
        }

        let handler = (type_def.constructor)(definition)?;

        let gateway = Arc::new(
            QueueGateway::new(Arc::clone(&self.provider))
                .with_poll_interval(Duration::from_millis(self.config.consumer.poll_interval_ms))
                .with_visibility_timeout(Duration::from_millis(
                    self.config.consumer.visibility_timeout_ms,
                )),
        );

        let runtime = Arc::new(TaskRuntime::new(
            &definition.name,
            settings,
            handler,
            gateway,
            &self.config.control_queue,
        ));

        let driver = match driver_settings {
            DriverSettings::Consumer(settings) => TaskDriver::Consumer {
                settings,
                binding: tokio::sync::Mutex::new(None),
            },
            DriverSettings::Cyclical(settings) => {
                let schedule = Schedule::from_settings(&settings)?;
                TaskDriver::Cyclical(Scheduler::new(Arc::clone(&runtime), schedule))
            }
        };

        Ok(Task {
            task_type: definition.task_type.clone(),
            runtime,
            driver,
        })
    }
}
