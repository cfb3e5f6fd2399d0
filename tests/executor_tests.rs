//! Executor integration tests over the in-memory repository and a manual
//! clock: linear completion, branching, fan-out, loops, delays, retries,
//! and event correlation.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use common::EngineHarness;
use conductor_core::builder::OrchestrationBuilder;
use conductor_core::models::{
    ExecutionResult, OrchestrationEventRecord, RetryPolicy, SyncStepBody,
};
use conductor_core::orchestration::ExecutionPassOutcome;
use conductor_core::persistence::OrchestrationRepository;
use conductor_core::utils::Clock;
use conductor_core::{OrchestrationStatus, PointerStatus};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Payload {
    flag: bool,
    count: i64,
    total: f64,
}

fn builder(id: &str) -> OrchestrationBuilder<Payload> {
    let mut builder = OrchestrationBuilder::new(id, 1);
    builder.await_lifecycle_events();
    builder
}

#[tokio::test]
async fn test_linear_orchestration_runs_to_completion() {
    let harness = EngineHarness::new();
    let mut b = builder("linear");
    b.start_with_inline("first", |_| Ok(ExecutionResult::next()))
        .then_inline("second", |_| Ok(ExecutionResult::next()))
        .end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;

    let outcome = instance.run_once().await;
    assert_eq!(outcome, ExecutionPassOutcome::Completed);

    let record = harness
        .repository
        .get_orchestration_instance(instance.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, OrchestrationStatus::Completed);
    assert!(record.complete_time.is_some());

    let pointers = harness
        .repository
        .get_execution_pointers(instance.id())
        .await
        .unwrap();
    assert_eq!(pointers.len(), 3);
    assert!(pointers.iter().all(|p| p.status == PointerStatus::Completed));
}

#[tokio::test]
async fn test_pass_on_settled_instance_is_a_noop() {
    let harness = EngineHarness::new();
    let mut b = builder("idempotent");
    b.start_with_inline("only", |_| Ok(ExecutionResult::next())).end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;

    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Completed);
    let pointers_before = harness
        .repository
        .get_execution_pointers(instance.id())
        .await
        .unwrap();

    // Re-running a completed instance changes nothing.
    assert_eq!(
        instance.run_once().await,
        ExecutionPassOutcome::NotRunnable(OrchestrationStatus::Completed)
    );
    let pointers_after = harness
        .repository
        .get_execution_pointers(instance.id())
        .await
        .unwrap();
    assert_eq!(pointers_before.len(), pointers_after.len());
}

#[tokio::test]
async fn test_false_condition_never_constructs_branch() {
    let ran = Arc::new(AtomicUsize::new(0));
    let harness = EngineHarness::new();
    let mut b = builder("if-false");
    let counter = ran.clone();
    b.start_with_inline("gate", |_| Ok(ExecutionResult::next()))
        .if_then(
            |data: &Payload| data.flag,
            move |branch| {
                let counter = counter.clone();
                branch.start_with_inline("inside", move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(ExecutionResult::next())
                });
            },
        )
        .end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;

    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Completed);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_true_condition_runs_branch_once_and_merges() {
    let ran = Arc::new(AtomicUsize::new(0));
    let harness = EngineHarness::new();
    let mut b = builder("if-true");
    let counter = ran.clone();
    b.start_with_inline("gate", |_| Ok(ExecutionResult::next()))
        .if_then(
            |data: &Payload| data.flag,
            move |branch| {
                let counter = counter.clone();
                branch.start_with_inline("inside", move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(ExecutionResult::next())
                });
            },
        )
        .end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": true, "count": 0, "total": 0.0}))
        .await;

    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Completed);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_parallel_spawns_one_nested_pointer_per_arm() {
    let harness = EngineHarness::new();
    let mut b = builder("fanout");
    b.start_with_inline("start", |_| Ok(ExecutionResult::next()))
        .parallel(|branches| {
            for arm in 0..3 {
                branches.branch(move |branch| {
                    branch.start_with_inline(&format!("arm-{arm}"), |_| {
                        Ok(ExecutionResult::next())
                    });
                });
            }
        })
        .end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;

    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Completed);

    let pointers = harness
        .repository
        .get_execution_pointers(instance.id())
        .await
        .unwrap();
    let parallel_pointer = pointers
        .iter()
        .find(|p| !p.nested_pointers.is_empty())
        .expect("parallel pointer has children");
    assert_eq!(parallel_pointer.nested_pointers.len(), 3);
    assert!(pointers.iter().all(|p| p.status == PointerStatus::Completed));
}

#[tokio::test]
async fn test_while_loop_runs_body_until_condition_turns_false() {
    let harness = EngineHarness::new();
    let mut b = builder("loop");
    b.start_with_inline("start", |_| Ok(ExecutionResult::next()))
        .while_do(
            |data: &Payload| data.count < 3,
            |branch| {
                branch.start_with_inline("increment", |ctx| {
                    ctx.mutate_data::<Payload, _>(|data| data.count += 1)?;
                    Ok(ExecutionResult::next())
                });
            },
        )
        .end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;

    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Completed);

    let record = harness
        .repository
        .get_orchestration_instance(instance.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.data["count"], json!(3));
}

#[tokio::test]
async fn test_switch_dispatches_on_value_and_falls_through_otherwise() {
    let chosen = Arc::new(AtomicUsize::new(0));
    let harness = EngineHarness::new();
    let mut b = builder("dispatch");
    let fast = chosen.clone();
    let slow = chosen.clone();
    b.start_with_inline("start", |_| Ok(ExecutionResult::next()))
        .switch(
            |data: &Payload| json!(data.count),
            move |cases| {
                let fast = fast.clone();
                let slow = slow.clone();
                cases
                    .case(json!(1), move |branch| {
                        let fast = fast.clone();
                        branch.start_with_inline("fast", move |_| {
                            fast.fetch_add(10, Ordering::SeqCst);
                            Ok(ExecutionResult::next())
                        });
                    })
                    .case(json!(2), move |branch| {
                        let slow = slow.clone();
                        branch.start_with_inline("slow", move |_| {
                            slow.fetch_add(100, Ordering::SeqCst);
                            Ok(ExecutionResult::next())
                        });
                    });
            },
        )
        .end();

    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 2, "total": 0.0}))
        .await;
    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Completed);
    assert_eq!(chosen.load(Ordering::SeqCst), 100);
}

#[tokio::test]
async fn test_delay_sleeps_until_the_clock_passes_the_interval() {
    let harness = EngineHarness::new();
    let mut b = builder("delayed");
    b.start_with_inline("prep", |_| Ok(ExecutionResult::next()))
        .delay(Duration::from_secs(5))
        .end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;

    // First pass parks the delay pointer in retrying state.
    assert!(matches!(
        instance.run_once().await,
        ExecutionPassOutcome::Advanced { .. }
    ));
    let pointers = harness
        .repository
        .get_execution_pointers(instance.id())
        .await
        .unwrap();
    assert!(pointers
        .iter()
        .any(|p| p.status == PointerStatus::Retrying));

    // No time has passed: nothing to do, no new pointers.
    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Idle);
    let stable = harness
        .repository
        .get_execution_pointers(instance.id())
        .await
        .unwrap();
    assert_eq!(stable.len(), pointers.len());

    // Once the clock passes the interval the sleeper is promoted and the
    // orchestration finishes.
    harness.clock.advance(Duration::from_secs(5));
    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Completed);
}

#[tokio::test]
async fn test_failing_step_retries_monotonically_then_suspends() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let harness = EngineHarness::new();
    let mut b = builder("flaky");
    let counter = attempts.clone();
    b.start_with_inline("always-fails", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("downstream unavailable"))
    })
    .retry_policy(RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        backoff_multiplier: 2.0,
    })
    .end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;

    // Attempt 1 fails and schedules the first retry.
    instance.run_once().await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    let mut last_retry_count = 0;
    for _ in 0..2 {
        harness.clock.advance(Duration::from_secs(30));
        instance.run_once().await;

        let pointers = harness
            .repository
            .get_execution_pointers(instance.id())
            .await
            .unwrap();
        let max_retry = pointers.iter().map(|p| p.retry_count).max().unwrap();
        assert!(max_retry >= last_retry_count, "retry count must not regress");
        last_retry_count = max_retry;
    }

    // Budget of 2 retries exhausted: three attempts total, then suspension.
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    let record = harness
        .repository
        .get_orchestration_instance(instance.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, OrchestrationStatus::Suspended);
    let pointers = harness
        .repository
        .get_execution_pointers(instance.id())
        .await
        .unwrap();
    assert!(pointers
        .iter()
        .any(|p| p.status == PointerStatus::Suspended));
}

#[tokio::test]
async fn test_event_wait_parks_until_matching_event_arrives() {
    let harness = EngineHarness::new();
    let mut b = builder("event-driven");
    b.start_with_inline("prep", |_| Ok(ExecutionResult::next()))
        .wait_for("payment.confirmed", "order-9", None)
        .end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;

    assert!(matches!(
        instance.run_once().await,
        ExecutionPassOutcome::Advanced { .. }
    ));
    let pointers = harness
        .repository
        .get_execution_pointers(instance.id())
        .await
        .unwrap();
    let waiting = pointers
        .iter()
        .find(|p| p.status == PointerStatus::WaitingForEvent)
        .expect("wait pointer parked");
    assert_eq!(waiting.event_name.as_deref(), Some("payment.confirmed"));

    // Non-matching event changes nothing.
    let unrelated =
        OrchestrationEventRecord::new("payment.confirmed", "order-10", json!({}), harness.clock.now_utc());
    harness.repository.add_event(&unrelated).await.unwrap();
    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Idle);

    // The matching event releases the wait and the run completes.
    let event = OrchestrationEventRecord::new(
        "payment.confirmed",
        "order-9",
        json!({"amount": 12}),
        harness.clock.now_utc(),
    );
    harness.repository.add_event(&event).await.unwrap();
    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Completed);
}

#[tokio::test]
async fn test_event_activates_at_most_one_waiting_pointer() {
    let harness = EngineHarness::new();

    let definition = {
        let mut b = builder("contended-wait");
        b.start_with_inline("prep", |_| Ok(ExecutionResult::next()))
            .wait_for("slot.free", "slot-1", None)
            .end();
        b.build().unwrap()
    };
    let second_definition = {
        let mut b = builder("contended-wait-b");
        b.start_with_inline("prep", |_| Ok(ExecutionResult::next()))
            .wait_for("slot.free", "slot-1", None)
            .end();
        b.build().unwrap()
    };

    let first = harness
        .start_instance(definition, "key-a", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;
    let second = harness
        .start_instance(second_definition, "key-b", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;
    first.run_once().await;
    second.run_once().await;

    let event =
        OrchestrationEventRecord::new("slot.free", "slot-1", json!({}), harness.clock.now_utc());
    harness.repository.add_event(&event).await.unwrap();

    // Only the first pass to claim the event advances; the other keeps
    // waiting.
    assert_eq!(first.run_once().await, ExecutionPassOutcome::Completed);
    assert_eq!(second.run_once().await, ExecutionPassOutcome::Idle);

    let still_waiting = harness
        .repository
        .get_execution_pointers(second.id())
        .await
        .unwrap();
    assert!(still_waiting
        .iter()
        .any(|p| p.status == PointerStatus::WaitingForEvent));
}

#[tokio::test]
async fn test_expired_event_wait_suspends_the_orchestration() {
    let harness = EngineHarness::new();
    let mut b = builder("expiring-wait");
    b.start_with_inline("prep", |_| Ok(ExecutionResult::next()))
        .wait_for("approval.granted", "req-1", Some(Duration::from_secs(10)))
        .end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;

    instance.run_once().await;
    harness.clock.advance(Duration::from_secs(11));
    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Suspended);

    let record = harness
        .repository
        .get_orchestration_instance(instance.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, OrchestrationStatus::Suspended);
}

#[tokio::test]
async fn test_lock_contention_aborts_pass_without_side_effects() {
    let harness = EngineHarness::new();
    let mut b = builder("locked-out");
    b.start_with_inline("only", |_| Ok(ExecutionResult::next())).end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 0, "total": 0.0}))
        .await;

    // Another host holds the lock for this orchestration.
    use conductor_core::locking::DistributedLockProvider;
    harness
        .locks
        .acquire_lock(
            &instance.lock_key(),
            "other-host",
            harness.clock.now_utc() + chrono::Duration::seconds(60),
        )
        .await
        .unwrap();

    assert_eq!(
        instance.run_once().await,
        ExecutionPassOutcome::LockUnavailable
    );
    let pointers = harness
        .repository
        .get_execution_pointers(instance.id())
        .await
        .unwrap();
    assert_eq!(pointers.len(), 1);
    assert_eq!(pointers[0].status, PointerStatus::Pending);

    // Once the other host releases, the next pass proceeds normally.
    harness
        .locks
        .release_lock(&instance.lock_key(), "other-host")
        .await
        .unwrap();
    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Completed);
}

#[derive(Debug, Default)]
struct ComputeTax {
    net: f64,
    computed: f64,
}

impl SyncStepBody for ComputeTax {
    fn run(
        &mut self,
        _ctx: &conductor_core::StepExecutionContext,
    ) -> anyhow::Result<ExecutionResult> {
        self.computed = self.net * 1.2;
        Ok(ExecutionResult::next())
    }
}

#[tokio::test]
async fn test_input_and_output_bindings_flow_through_instance_data() {
    let harness = EngineHarness::new();
    let mut b = builder("bindings");
    b.start_with::<ComputeTax>()
        .input(|body, data: &Payload| body.net = data.total)
        .output(|body, data: &mut Payload| data.total = body.computed)
        .end();
    let instance = harness
        .start_instance(b.build().unwrap(), "key-1", json!({"flag": false, "count": 0, "total": 100.0}))
        .await;

    assert_eq!(instance.run_once().await, ExecutionPassOutcome::Completed);

    let record = harness
        .repository
        .get_orchestration_instance(instance.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.data["total"], json!(120.0));
}
