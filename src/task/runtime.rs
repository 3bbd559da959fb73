//! Per-task lifecycle and the launch protocol.
//!
//! A [`TaskRuntime`] owns one task's state machine
//! (`STOPPED -> IDLE <-> RUNNING -> STOPPED`), its monotonic counters, and
//! the execution protocol: spawn the transform as an independently
//! cancellable job, supervise its timeout, classify the outcome, report
//! status to the control queue and fan the result out to receivers.
//!
//! Concurrency notes: `concurrency > 1` means several executions can be in
//! flight at once, so the exposed status derives from an in-flight gauge
//! rather than a writable field, and every outstanding job's abort handle
//! is tracked so teardown can cancel all work owned by the task.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::task::AbortHandle;
use tracing::{debug, error};
use uuid::Uuid;

use crate::constants::{ExecutionStatus, TaskStatus};
use crate::messaging::{Envelope, QueueGateway};
use crate::task::handler::{HandlerError, TaskHandler};
use crate::task::settings::TaskSettings;

/// One invocation of a task's transform.
#[derive(Debug, Clone)]
pub struct Execution {
    pub execution_id: String,
    pub payload: Option<Value>,
    pub sender: String,
    pub dispatch_time: DateTime<Utc>,
}

impl Execution {
    pub fn new(
        execution_id: impl Into<String>,
        payload: Option<Value>,
        sender: impl Into<String>,
        dispatch_time: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            payload,
            sender: sender.into(),
            dispatch_time,
        }
    }

    /// Execution fired by a scheduler tick: fresh id, no payload, the
    /// task itself as sender.
    pub fn scheduled(task_name: &str) -> Self {
        Self::new(Uuid::new_v4().to_string(), None, task_name, Utc::now())
    }

    /// Execution decoded from an inbound envelope.
    pub fn from_envelope(envelope: Envelope<Value>) -> Self {
        Self {
            execution_id: envelope.execution_id,
            payload: envelope.message,
            sender: envelope.sender,
            dispatch_time: envelope.dispatch_time,
        }
    }
}

/// Monotonic per-task counters. Never reset.
#[derive(Debug, Default)]
pub struct TaskCounters {
    starts: AtomicU64,
    stops: AtomicU64,
    success_launches: AtomicU64,
    error_launches: AtomicU64,
    abort_launches: AtomicU64,
    timeout_launches: AtomicU64,
    interrupt_launches: AtomicU64,
}

impl TaskCounters {
    fn record_outcome(&self, status: ExecutionStatus) {
        let counter = match status {
            ExecutionStatus::Finished => &self.success_launches,
            ExecutionStatus::FinishedWithErrors => &self.error_launches,
            ExecutionStatus::ErrorAborted => &self.abort_launches,
            ExecutionStatus::Timeout => &self.timeout_launches,
            ExecutionStatus::Interrupted => &self.interrupt_launches,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn starts(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn success_launches(&self) -> u64 {
        self.success_launches.load(Ordering::SeqCst)
    }

    pub fn error_launches(&self) -> u64 {
        self.error_launches.load(Ordering::SeqCst)
    }

    pub fn abort_launches(&self) -> u64 {
        self.abort_launches.load(Ordering::SeqCst)
    }

    pub fn timeout_launches(&self) -> u64 {
        self.timeout_launches.load(Ordering::SeqCst)
    }

    pub fn interrupt_launches(&self) -> u64 {
        self.interrupt_launches.load(Ordering::SeqCst)
    }

    /// Completed launches, irrespective of success. Interrupted launches
    /// are tracked separately and excluded from this sum.
    pub fn total_launches(&self) -> u64 {
        self.success_launches()
            + self.error_launches()
            + self.abort_launches()
            + self.timeout_launches()
    }
}

/// Point-in-time summary of a task's state and counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub name: String,
    pub status: TaskStatus,
    pub starts: u64,
    pub stops: u64,
    pub success_launches: u64,
    pub error_launches: u64,
    pub abort_launches: u64,
    pub timeout_launches: u64,
    pub interrupt_launches: u64,
    pub total_launches: u64,
    pub created_at: DateTime<Utc>,
    pub last_launch_at: Option<DateTime<Utc>>,
}

struct JobReport {
    status: ExecutionStatus,
    result: Option<Value>,
}

/// The state machine and launch protocol for one task.
pub struct TaskRuntime {
    name: String,
    settings: TaskSettings,
    handler: Arc<dyn TaskHandler>,
    gateway: Arc<QueueGateway>,
    control_queue: String,
    counters: TaskCounters,
    /// Executions currently in flight; status reads RUNNING while > 0.
    in_flight: AtomicUsize,
    stopped: AtomicBool,
    created_at: DateTime<Utc>,
    last_launch_at: Mutex<Option<DateTime<Utc>>>,
    /// Abort handles for outstanding jobs, swept on each launch and
    /// cancelled wholesale on stop.
    jobs: Mutex<Vec<AbortHandle>>,
}

impl TaskRuntime {
    pub fn new(
        name: impl Into<String>,
        settings: TaskSettings,
        handler: Arc<dyn TaskHandler>,
        gateway: Arc<QueueGateway>,
        control_queue: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            handler,
            gateway,
            control_queue: control_queue.into(),
            counters: TaskCounters::default(),
            in_flight: AtomicUsize::new(0),
            stopped: AtomicBool::new(true),
            created_at: Utc::now(),
            last_launch_at: Mutex::new(None),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &TaskSettings {
        &self.settings
    }

    pub fn gateway(&self) -> &Arc<QueueGateway> {
        &self.gateway
    }

    pub fn counters(&self) -> &TaskCounters {
        &self.counters
    }

    pub fn last_launch_at(&self) -> Option<DateTime<Utc>> {
        *self.last_launch_at.lock()
    }

    /// Current status: RUNNING while at least one execution is in
    /// flight, never a last-writer-wins snapshot.
    pub fn status(&self) -> TaskStatus {
        if self.stopped.load(Ordering::SeqCst) {
            TaskStatus::Stopped
        } else if self.in_flight.load(Ordering::SeqCst) > 0 {
            TaskStatus::Running
        } else {
            TaskStatus::Idle
        }
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            name: self.name.clone(),
            status: self.status(),
            starts: self.counters.starts(),
            stops: self.counters.stops(),
            success_launches: self.counters.success_launches(),
            error_launches: self.counters.error_launches(),
            abort_launches: self.counters.abort_launches(),
            timeout_launches: self.counters.timeout_launches(),
            interrupt_launches: self.counters.interrupt_launches(),
            total_launches: self.counters.total_launches(),
            created_at: self.created_at,
            last_launch_at: self.last_launch_at(),
        }
    }

    /// Transition STOPPED -> IDLE. Returns false if already started.
    pub fn start(&self) -> bool {
        if self
            .stopped
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        debug!(task = %self.name, "status changed: IDLE");
        true
    }

    /// Run the task's setup hook. Failures are logged, never escalated.
    pub async fn run_setup_hook(&self) {
        if let Err(e) = self.handler.on_construct().await {
            error!(task = %self.name, error = %e, "setup hook failed");
        }
    }

    /// Transition to STOPPED: cancel every outstanding job, run the
    /// teardown hook, bump the stop counter. Returns false if already
    /// stopped.
    pub async fn stop(&self) -> bool {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        debug!(task = %self.name, "status changed: STOPPED");

        let outstanding: Vec<AbortHandle> = self.jobs.lock().drain(..).collect();
        for job in outstanding {
            job.abort();
        }

        if let Err(e) = self.handler.on_destroy().await {
            error!(task = %self.name, error = %e, "teardown hook failed");
        }

        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn track_job(&self, handle: AbortHandle) {
        let mut jobs = self.jobs.lock();
        jobs.retain(|h| !h.is_finished());
        jobs.push(handle);
    }

    /// Run one execution through the full launch protocol.
    ///
    /// Never returns an error and never panics the caller: a fault in a
    /// single execution is logged and absorbed here.
    pub async fn launch(&self, execution: Execution) {
        let Execution {
            execution_id,
            payload,
            sender,
            dispatch_time,
        } = execution;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        *self.last_launch_at.lock() = Some(Utc::now());
        debug!(task = %self.name, execution_id = %execution_id, "execution starting");

        let handler = Arc::clone(&self.handler);
        let job_payload = payload.clone();
        let job_sender = sender.clone();
        let mut job = tokio::spawn(async move {
            run_job(handler, job_payload, job_sender, dispatch_time).await
        });
        self.track_job(job.abort_handle());

        let report = match self.settings.timeout_duration() {
            Some(limit) => match tokio::time::timeout(limit, &mut job).await {
                Ok(joined) => self.classify_join(&execution_id, joined),
                Err(_elapsed) => {
                    // Job still active at expiry: cancel it and report the
                    // timeout through the task's hook.
                    job.abort();
                    debug!(task = %self.name, execution_id = %execution_id, "execution timed out");
                    self.handler
                        .on_timeout(payload.as_ref(), &sender, dispatch_time)
                        .await;
                    JobReport {
                        status: ExecutionStatus::Timeout,
                        result: None,
                    }
                }
            },
            None => {
                let joined = job.await;
                self.classify_join(&execution_id, joined)
            }
        };

        self.counters.record_outcome(report.status);
        debug!(
            task = %self.name,
            execution_id = %execution_id,
            status = %report.status,
            "execution finished"
        );

        if let Err(e) = self
            .gateway
            .send_status(&self.name, &self.control_queue, &execution_id, report.status)
            .await
        {
            error!(task = %self.name, execution_id = %execution_id, error = %e, "status publish failed");
        }

        self.handler
            .on_end(payload.as_ref(), &sender, dispatch_time)
            .await;

        match report.result {
            Some(result) => {
                for receiver in &self.settings.receivers {
                    // Fresh envelope and execution id per receiver; publish
                    // failures are not retried here.
                    if let Err(e) = self
                        .gateway
                        .send(&self.name, receiver, result.clone(), None)
                        .await
                    {
                        error!(task = %self.name, receiver = %receiver, error = %e, "result publish failed");
                    }
                }
            }
            None => {
                debug!(task = %self.name, execution_id = %execution_id, "no result to forward");
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn classify_join(
        &self,
        execution_id: &str,
        joined: Result<JobReport, tokio::task::JoinError>,
    ) -> JobReport {
        match joined {
            Ok(report) => report,
            // Aborted from outside the timeout supervisor, i.e. teardown.
            Err(e) if e.is_cancelled() => JobReport {
                status: ExecutionStatus::Interrupted,
                result: None,
            },
            Err(e) => {
                error!(task = %self.name, execution_id, error = %e, "transform panicked");
                JobReport {
                    status: ExecutionStatus::ErrorAborted,
                    result: None,
                }
            }
        }
    }
}

/// The job body: transform, then correctness predicate.
async fn run_job(
    handler: Arc<dyn TaskHandler>,
    payload: Option<Value>,
    sender: String,
    dispatch_time: DateTime<Utc>,
) -> JobReport {
    let started = std::time::Instant::now();

    match handler.on_launch(payload.as_ref(), &sender, dispatch_time).await {
        Ok(result) => {
            debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "transform finished"
            );

            let correct = match handler
                .result_is_correct(result.as_ref(), payload.as_ref(), &sender, dispatch_time)
                .await
            {
                Ok(correct) => correct,
                Err(HandlerError::Interrupted) => {
                    return JobReport {
                        status: ExecutionStatus::Interrupted,
                        result,
                    }
                }
                // A predicate that itself fails is a wrong result, not an
                // aborted execution.
                Err(_) => false,
            };

            if correct {
                JobReport {
                    status: ExecutionStatus::Finished,
                    result,
                }
            } else {
                JobReport {
                    status: ExecutionStatus::FinishedWithErrors,
                    result,
                }
            }
        }
        Err(HandlerError::Interrupted) => JobReport {
            status: ExecutionStatus::Interrupted,
            result: None,
        },
        Err(error) => {
            error!(error = %error, "error during execution");
            handler
                .on_exception(&error, payload.as_ref(), &sender, dispatch_time)
                .await;
            JobReport {
                status: ExecutionStatus::ErrorAborted,
                result: None,
            }
        }
    }
}
