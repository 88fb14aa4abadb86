//! FILENAME: tests/test_calculator.rs
//! Integration tests for the per-chain calculation lifecycle: restarts,
//! cooperative cancellation and join-graph verification.

mod common;

use common::{over, TestHarness};
use engine::Column;
use flow::{materialize, DrainBudget, FlowError, Job};
use step_engine::{
    Calculator, ExampleBudget, JoinConfig, JoinKind, SequenceConfig, StepKind,
};

// ============================================================================
// RESTARTS
// ============================================================================

#[tokio::test]
async fn test_a_restart_cancels_the_in_flight_evaluation() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();

    let calculator = Calculator::new();
    let stale = calculator.begin(chain);
    calculator.begin(chain);

    // The superseded job is cancelled, so its evaluation dies at the
    // first checkpoint.
    let result = harness
        .workspace
        .example_data(chain, &stale, ExampleBudget::default())
        .await;
    match result {
        Err(error) => assert!(error.is_cancellation()),
        Ok(_) => panic!("a superseded job must not produce data"),
    }
}

#[tokio::test]
async fn test_the_replacement_job_still_computes() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Filter {
            predicate: over("amount", 100.0),
        },
    );

    let calculator = Calculator::new();
    calculator.begin(chain);
    let raster = calculator
        .example_raster(&harness.workspace, chain, ExampleBudget::default())
        .await
        .unwrap();
    assert_eq!(raster.row_count(), 4);
    assert!(!raster.is_partial());
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[tokio::test]
async fn test_cancellation_interrupts_a_long_drain() {
    let mut harness = TestHarness::new();
    let chain = harness.workspace.add_chain();
    harness.push(
        chain,
        StepKind::Sequence(SequenceConfig::enumerate("[0-9]{6}")),
    );

    // Cancel as soon as the drain reports any progress; the next
    // checkpoint must stop the work instead of walking the whole
    // million-value pattern.
    let job = Job::interactive();
    let handle = job.clone();
    job.on_progress(move |_| handle.cancel());

    let data = harness.workspace.full_data(chain, &job).await.unwrap();
    let result = materialize(data, &job, &DrainBudget::unbounded()).await;
    match result {
        Err(error) => assert!(error.is_cancellation()),
        Ok(raster) => panic!("expected cancellation, landed {} rows", raster.row_count()),
    }
}

#[tokio::test]
async fn test_cancelled_jobs_fail_before_touching_steps() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();

    let job = Job::interactive();
    job.cancel();
    let result = harness.workspace.full_data(chain, &job).await;
    match result {
        Err(error) => assert!(error.is_cancellation()),
        Ok(_) => panic!("a cancelled job must not produce data"),
    }
}

// ============================================================================
// JOIN GRAPH VERIFICATION
// ============================================================================

#[tokio::test]
async fn test_mutual_joins_are_rejected_with_the_path() {
    let mut harness = TestHarness::new();
    let first = harness.add_orders_chain();
    let second = harness.add_cities_chain();

    harness.push(
        first,
        StepKind::Join(JoinConfig {
            chain: second,
            left_key: Column::new("city"),
            right_key: Column::new("city"),
            kind: JoinKind::Inner,
        }),
    );
    harness.push(
        second,
        StepKind::Join(JoinConfig {
            chain: first,
            left_key: Column::new("city"),
            right_key: Column::new("city"),
            kind: JoinKind::Inner,
        }),
    );

    let job = Job::interactive();
    match harness.workspace.full_data(first, &job).await {
        Err(FlowError::DependencyCycle(path)) => {
            let expected = format!("chain {first} -> chain {second} -> chain {first}");
            assert_eq!(path, expected);
        }
        other => panic!("expected a dependency cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn test_a_self_join_is_a_cycle() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Join(JoinConfig {
            chain,
            left_key: Column::new("city"),
            right_key: Column::new("city"),
            kind: JoinKind::Inner,
        }),
    );

    let job = Job::interactive();
    match harness.workspace.full_data(chain, &job).await {
        Err(FlowError::DependencyCycle(path)) => {
            assert_eq!(path, format!("chain {chain} -> chain {chain}"));
        }
        other => panic!("expected a dependency cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn test_joining_a_removed_chain_fails() {
    let mut harness = TestHarness::new();
    let cities = harness.add_cities_chain();
    let orders = harness.add_orders_chain();
    harness.push(
        orders,
        StepKind::Join(JoinConfig {
            chain: cities,
            left_key: Column::new("city"),
            right_key: Column::new("city"),
            kind: JoinKind::Inner,
        }),
    );
    harness.workspace.remove_chain(cities);

    let job = Job::interactive();
    match harness.workspace.full_data(orders, &job).await {
        Err(FlowError::UnknownChain(id)) => assert_eq!(id, cities),
        other => panic!("expected an unknown-chain error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_a_diamond_of_joins_is_not_a_cycle() {
    let mut harness = TestHarness::new();
    let shared = harness.add_cities_chain();
    let left = harness.add_orders_chain();
    let right = harness.add_orders_chain();
    for branch in [left, right] {
        harness.push(
            branch,
            StepKind::Join(JoinConfig {
                chain: shared,
                left_key: Column::new("city"),
                right_key: Column::new("city"),
                kind: JoinKind::Left,
            }),
        );
    }
    let top = harness.add_orders_chain();
    for branch in [left, right] {
        harness.push(
            top,
            StepKind::Join(JoinConfig {
                chain: branch,
                left_key: Column::new("city"),
                right_key: Column::new("city"),
                kind: JoinKind::Left,
            }),
        );
    }

    let raster = harness.full(top).await;
    assert!(raster.row_count() >= 8, "every orders row survives a left join");
}
