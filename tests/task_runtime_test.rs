//! Integration tests for the launch protocol: outcome classification,
//! status reporting, counters and teardown cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use common::{drain_envelopes, drain_statuses, in_memory_gateway, wait_until, Behavior, Probe, RecordingHandler};
use conductor_core::constants::{ExecutionStatus, TaskStatus};
use conductor_core::messaging::QueueGateway;
use conductor_core::task::{Execution, TaskRuntime, TaskSettings};

const CONTROL: &str = "control";

async fn build_runtime(
    behavior: Behavior,
    timeout: i64,
    receivers: &[&str],
) -> (Arc<TaskRuntime>, Arc<Probe>, Arc<QueueGateway>) {
    let gateway = in_memory_gateway();
    gateway.create_queue(CONTROL).await.unwrap();
    for receiver in receivers {
        gateway.create_queue(receiver).await.unwrap();
    }

    let (handler, probe) = RecordingHandler::new(behavior);
    let settings = TaskSettings {
        timeout,
        receivers: receivers.iter().map(|r| r.to_string()).collect(),
        concurrency: 1,
    };

    let runtime = Arc::new(TaskRuntime::new(
        "worker",
        settings,
        handler,
        Arc::clone(&gateway),
        CONTROL,
    ));
    (runtime, probe, gateway)
}

fn execution(id: &str, payload: Option<serde_json::Value>) -> Execution {
    Execution::new(id, payload, "tester", Utc::now())
}

#[tokio::test]
async fn successful_execution_reports_finished() {
    let (runtime, probe, gateway) = build_runtime(Behavior::Echo, -1, &[]).await;

    runtime.launch(execution("e-1", Some(json!({"n": 1})))).await;

    let statuses = drain_statuses(&gateway, CONTROL).await;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].execution_id, "e-1");
    assert_eq!(statuses[0].sender, "worker");
    assert_eq!(statuses[0].execution_status, ExecutionStatus::Finished);

    assert_eq!(runtime.counters().success_launches(), 1);
    assert_eq!(runtime.counters().total_launches(), 1);
    assert_eq!(probe.ends(), 1);
    assert!(runtime.last_launch_at().is_some());
}

#[tokio::test]
async fn wrong_result_demotes_outcome() {
    let (runtime, probe, gateway) = build_runtime(Behavior::WrongResult, -1, &[]).await;

    runtime.launch(execution("e-1", None)).await;

    let statuses = drain_statuses(&gateway, CONTROL).await;
    assert_eq!(
        statuses[0].execution_status,
        ExecutionStatus::FinishedWithErrors
    );
    assert_eq!(runtime.counters().error_launches(), 1);
    assert_eq!(runtime.counters().success_launches(), 0);
    // the predicate path is not an abort: no exception hook
    assert_eq!(probe.exceptions(), 0);
}

#[tokio::test]
async fn failing_predicate_is_not_escalated() {
    let (runtime, probe, gateway) = build_runtime(Behavior::PredicateFails, -1, &[]).await;

    runtime.launch(execution("e-1", None)).await;

    let statuses = drain_statuses(&gateway, CONTROL).await;
    assert_eq!(
        statuses[0].execution_status,
        ExecutionStatus::FinishedWithErrors
    );
    assert_eq!(runtime.counters().error_launches(), 1);
    assert_eq!(probe.exceptions(), 0);
}

#[tokio::test]
async fn transform_error_aborts_execution() {
    let (runtime, probe, gateway) = build_runtime(Behavior::Fail("boom".into()), -1, &[]).await;

    runtime.launch(execution("e-1", Some(json!({"n": 1})))).await;

    let statuses = drain_statuses(&gateway, CONTROL).await;
    assert_eq!(statuses[0].execution_status, ExecutionStatus::ErrorAborted);
    assert_eq!(runtime.counters().abort_launches(), 1);
    assert_eq!(probe.exceptions(), 1);
    // the end hook still runs after an abort
    assert_eq!(probe.ends(), 1);
}

#[tokio::test]
async fn interruption_is_distinct_from_timeout() {
    let (runtime, probe, gateway) = build_runtime(Behavior::Interrupt, -1, &[]).await;

    runtime.launch(execution("e-1", None)).await;

    let statuses = drain_statuses(&gateway, CONTROL).await;
    assert_eq!(statuses[0].execution_status, ExecutionStatus::Interrupted);
    assert_eq!(runtime.counters().interrupt_launches(), 1);
    assert_eq!(runtime.counters().timeout_launches(), 0);
    // interrupted launches are excluded from the completed-launch sum
    assert_eq!(runtime.counters().total_launches(), 0);
    assert_eq!(probe.timeouts(), 0);
}

#[tokio::test]
async fn timeout_cancels_job_and_fires_hook() {
    let (runtime, probe, gateway) = build_runtime(
        Behavior::Sleep {
            ms: 5_000,
            result: Some(json!({"late": true})),
        },
        200,
        &[],
    )
    .await;

    let started = tokio::time::Instant::now();
    runtime.launch(execution("e-1", None)).await;
    assert!(started.elapsed() < Duration::from_secs(2));

    let statuses = drain_statuses(&gateway, CONTROL).await;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].execution_status, ExecutionStatus::Timeout);
    assert_eq!(runtime.counters().timeout_launches(), 1);
    assert_eq!(probe.timeouts(), 1);
    assert_eq!(probe.ends(), 1);
}

#[tokio::test]
async fn counter_sum_invariant_holds_across_outcomes() {
    let (runtime, _probe, gateway) = build_runtime(Behavior::PayloadDriven, 150, &[]).await;

    runtime.launch(execution("e-ok", Some(json!({"mode": "ok"})))).await;
    runtime.launch(execution("e-wrong", Some(json!({"mode": "wrong"})))).await;
    runtime.launch(execution("e-fail", Some(json!({"mode": "fail"})))).await;
    runtime.launch(execution("e-hang", Some(json!({"mode": "hang"})))).await;
    runtime.launch(execution("e-int", Some(json!({"mode": "interrupt"})))).await;

    let counters = runtime.counters();
    assert_eq!(counters.success_launches(), 1);
    assert_eq!(counters.error_launches(), 1);
    assert_eq!(counters.abort_launches(), 1);
    assert_eq!(counters.timeout_launches(), 1);
    assert_eq!(counters.interrupt_launches(), 1);
    assert_eq!(
        counters.total_launches(),
        counters.success_launches()
            + counters.error_launches()
            + counters.abort_launches()
            + counters.timeout_launches()
    );

    // one status per execution, no more, no less
    let statuses = drain_statuses(&gateway, CONTROL).await;
    assert_eq!(statuses.len(), 5);
}

#[tokio::test]
async fn exactly_one_status_per_execution() {
    let (runtime, _probe, gateway) = build_runtime(Behavior::Echo, -1, &[]).await;

    let ids: Vec<String> = (0..5).map(|i| format!("exec-{i}")).collect();
    for id in &ids {
        runtime.launch(execution(id, Some(json!({"id": id})))).await;
    }

    let statuses = drain_statuses(&gateway, CONTROL).await;
    assert_eq!(statuses.len(), ids.len());
    for id in &ids {
        let matching = statuses.iter().filter(|s| &s.execution_id == id).count();
        assert_eq!(matching, 1, "expected exactly one status for {id}");
    }
}

#[tokio::test]
async fn result_fans_out_to_receivers_with_fresh_ids() {
    let (runtime, _probe, gateway) =
        build_runtime(Behavior::Echo, -1, &["recv-a", "recv-b"]).await;

    runtime
        .launch(execution("origin-id", Some(json!({"rows": 7}))))
        .await;

    let a = drain_envelopes(&gateway, "recv-a").await;
    let b = drain_envelopes(&gateway, "recv-b").await;

    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
    assert_eq!(a[0].sender, "worker");
    assert_eq!(b[0].sender, "worker");
    assert_eq!(a[0].message.as_ref().unwrap()["rows"], 7);

    // each receiver gets a fresh envelope with its own execution id
    assert_ne!(a[0].execution_id, "origin-id");
    assert_ne!(b[0].execution_id, "origin-id");
    assert_ne!(a[0].execution_id, b[0].execution_id);
}

#[tokio::test]
async fn empty_result_is_not_forwarded() {
    let (runtime, _probe, gateway) = build_runtime(Behavior::ReturnNone, -1, &["recv-a"]).await;

    runtime.launch(execution("e-1", None)).await;

    let forwarded = drain_envelopes(&gateway, "recv-a").await;
    assert!(forwarded.is_empty());
    // the status still goes out
    assert_eq!(drain_statuses(&gateway, CONTROL).await.len(), 1);
}

#[tokio::test]
async fn status_reflects_in_flight_executions() {
    let (runtime, probe, _gateway) = build_runtime(
        Behavior::Sleep {
            ms: 300,
            result: None,
        },
        -1,
        &[],
    )
    .await;

    assert_eq!(runtime.status(), TaskStatus::Stopped);
    assert!(runtime.start());
    assert_eq!(runtime.status(), TaskStatus::Idle);

    let first = Arc::clone(&runtime);
    let h1 = tokio::spawn(async move { first.launch(execution("e-1", None)).await });
    let second = Arc::clone(&runtime);
    let h2 = tokio::spawn(async move { second.launch(execution("e-2", None)).await });

    assert!(
        wait_until(
            || runtime.status() == TaskStatus::Running,
            Duration::from_secs(2)
        )
        .await
    );

    h1.await.unwrap();
    h2.await.unwrap();

    // both executions ran concurrently and the gauge settled back to idle
    assert!(probe.max_active() >= 2);
    assert_eq!(runtime.status(), TaskStatus::Idle);
}

#[tokio::test]
async fn stop_interrupts_outstanding_jobs() {
    let (runtime, probe, gateway) = build_runtime(
        Behavior::Sleep {
            ms: 5_000,
            result: None,
        },
        -1,
        &[],
    )
    .await;

    runtime.start();

    let launcher = Arc::clone(&runtime);
    let in_flight = tokio::spawn(async move { launcher.launch(execution("e-1", None)).await });

    assert!(
        wait_until(
            || runtime.status() == TaskStatus::Running,
            Duration::from_secs(2)
        )
        .await
    );

    assert!(runtime.stop().await);
    in_flight.await.unwrap();

    assert_eq!(runtime.status(), TaskStatus::Stopped);
    assert_eq!(runtime.counters().interrupt_launches(), 1);
    assert_eq!(probe.destroys.load(std::sync::atomic::Ordering::SeqCst), 1);

    // the cancelled execution still reported its outcome
    let statuses = drain_statuses(&gateway, CONTROL).await;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].execution_status, ExecutionStatus::Interrupted);
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let (runtime, _probe, _gateway) = build_runtime(Behavior::Echo, -1, &[]).await;

    assert!(runtime.start());
    assert!(!runtime.start());
    assert_eq!(runtime.counters().starts(), 1);

    assert!(runtime.stop().await);
    assert!(!runtime.stop().await);
    assert_eq!(runtime.counters().stops(), 1);
}
