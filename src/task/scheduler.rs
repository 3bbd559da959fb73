//! Cyclical execution: drive a task runtime from a timer instead of an
//! inbound message.
//!
//! Two modes with deliberately different overlap semantics:
//!
//! - **Fixed delay** runs strictly serially: one long-lived loop launches,
//!   waits the configured delay, and repeats, so consecutive executions
//!   can never overlap.
//! - **Cron** spawns one independent tick task per fire time and does not
//!   wait for it, so executions may overlap when a tick outlives the
//!   cadence. Tick handles live in a `JoinSet` that is drained of
//!   completed entries on every fire and fully cancelled on teardown.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::errors::{ConductorError, ConductorResult};
use crate::task::runtime::{Execution, TaskRuntime};
use crate::task::settings::CyclicalSettings;

/// When a cyclical task fires.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Calendar-based firing; overlapping executions permitted.
    Cron(cron::Schedule),
    /// Constant wait between the end of one execution and the start of
    /// the next; strictly serial.
    FixedDelay(Duration),
}

impl Schedule {
    /// Build from validated cyclical settings.
    ///
    /// A cron expression takes precedence over a fixed delay when both
    /// are present.
    pub fn from_settings(settings: &CyclicalSettings) -> ConductorResult<Self> {
        if let Some(expr) = &settings.cron {
            let schedule = cron::Schedule::from_str(expr).map_err(|e| {
                ConductorError::ConfigurationError(format!("invalid cron expression '{expr}': {e}"))
            })?;
            return Ok(Self::Cron(schedule));
        }

        match settings.fixed_delay {
            Some(ms) if ms > 0 => Ok(Self::FixedDelay(Duration::from_millis(ms as u64))),
            _ => Err(ConductorError::ConfigurationError(
                "cyclical task needs either a cron expression or a positive fixed delay"
                    .to_string(),
            )),
        }
    }
}

/// Drives a [`TaskRuntime`] on a [`Schedule`].
pub struct Scheduler {
    runtime: Arc<TaskRuntime>,
    schedule: Schedule,
    main: parking_lot::Mutex<Option<JoinHandle<()>>>,
    ticks: Arc<tokio::sync::Mutex<JoinSet<()>>>,
}

impl Scheduler {
    pub fn new(runtime: Arc<TaskRuntime>, schedule: Schedule) -> Self {
        Self {
            runtime,
            schedule,
            main: parking_lot::Mutex::new(None),
            ticks: Arc::new(tokio::sync::Mutex::new(JoinSet::new())),
        }
    }

    /// Start the scheduling loop. A second call while running is a no-op.
    pub fn start(&self) {
        let mut main = self.main.lock();
        if main.is_some() {
            return;
        }

        let runtime = Arc::clone(&self.runtime);
        let handle = match &self.schedule {
            Schedule::FixedDelay(delay) => {
                let delay = *delay;
                tokio::spawn(async move {
                    loop {
                        runtime.launch(Execution::scheduled(runtime.name())).await;
                        tokio::time::sleep(delay).await;
                    }
                })
            }
            Schedule::Cron(schedule) => {
                let schedule = schedule.clone();
                let ticks = Arc::clone(&self.ticks);
                tokio::spawn(async move {
                    loop {
                        let Some(next) = schedule.upcoming(Utc).next() else {
                            warn!(task = runtime.name(), "cron schedule has no upcoming fire times");
                            break;
                        };

                        let now = Utc::now();
                        if next > now {
                            let wait = (next - now).to_std().unwrap_or_default();
                            tokio::time::sleep(wait).await;
                        }

                        debug!(task = runtime.name(), "cron tick");
                        let tick_runtime = Arc::clone(&runtime);
                        let mut ticks = ticks.lock().await;
                        // Evict handles of ticks that already finished.
                        while ticks.try_join_next().is_some() {}
                        ticks.spawn(async move {
                            tick_runtime
                                .launch(Execution::scheduled(tick_runtime.name()))
                                .await;
                        });
                    }
                })
            }
        };

        *main = Some(handle);
    }

    /// Cancel the scheduling loop and every still-running tick.
    pub async fn stop(&self) {
        if let Some(main) = self.main.lock().take() {
            main.abort();
        }

        let mut ticks = self.ticks.lock().await;
        ticks.shutdown().await;
    }
}
