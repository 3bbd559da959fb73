//! # Conductor Core
//!
//! Message-driven task orchestration runtime. A host process loads named,
//! independently configured tasks which either react to inbound queue
//! messages or fire on a cron/interval schedule, execute pluggable
//! business logic, classify the outcome, report status to a control
//! queue, and forward results to downstream consumers.
//!
//! ## Module Organization
//!
//! - [`messaging`] - backend-agnostic queue gateway, envelope model,
//!   acknowledgment policy, broker providers (in-memory, RabbitMQ)
//! - [`task`] - per-task state machine, launch protocol, scheduler,
//!   consumer binding and factory
//! - [`orchestrator`] - the host surface owning tasks and the broker
//!   connection
//! - [`config`] - process-wide configuration loading
//! - [`constants`] - task and execution status enums
//! - [`errors`] - structured error handling
//! - [`logging`] - tracing bootstrap
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use chrono::{DateTime, Utc};
//! use serde_json::Value;
//! use conductor_core::config::OrchestratorConfig;
//! use conductor_core::orchestrator::Orchestrator;
//! use conductor_core::task::{HandlerError, TaskDefinition, TaskHandler, TaskTypeDefinition};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl TaskHandler for Echo {
//!     async fn on_launch(
//!         &self,
//!         payload: Option<&Value>,
//!         _sender: &str,
//!         _dispatch_time: DateTime<Utc>,
//!     ) -> Result<Option<Value>, HandlerError> {
//!         Ok(payload.cloned())
//!     }
//!
//!     async fn on_exception(&self, _e: &HandlerError, _p: Option<&Value>, _s: &str, _t: DateTime<Utc>) {}
//!     async fn on_end(&self, _p: Option<&Value>, _s: &str, _t: DateTime<Utc>) {}
//!     async fn on_timeout(&self, _p: Option<&Value>, _s: &str, _t: DateTime<Utc>) {}
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::connect(OrchestratorConfig::default()).await?;
//! orchestrator.register_task_type(
//!     "echo",
//!     TaskTypeDefinition::consumer(|_def| Ok(Arc::new(Echo) as _)),
//! );
//!
//! let task = orchestrator.create_task(
//!     &TaskDefinition::new("echo", "echo-1")
//!         .with_param("task.concurrency", serde_json::json!(2)),
//! )?;
//! task.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod orchestrator;
pub mod task;

pub use config::{BrokerConfig, BrokerKind, OrchestratorConfig};
pub use constants::{ExecutionStatus, TaskStatus};
pub use errors::{ConductorError, ConductorResult};
pub use messaging::{
    ConsumeError, Envelope, MessagingError, MessagingProvider, MessagingResult, QueueGateway,
    StatusMessage,
};
pub use orchestrator::Orchestrator;
pub use task::{
    Execution, HandlerError, Task, TaskDefinition, TaskFactory, TaskHandler, TaskInfo, TaskRuntime,
    TaskTypeDefinition,
};
