//! FILENAME: tests/test_evaluation.rs
//! Integration tests for chain evaluation: row-wise steps, whole-table
//! steps, pipelines and the example budgets.

mod common;

use common::{
    assert_cell_empty, assert_cell_number, assert_cell_text, assert_columns, numbers_table, over,
    OrdersFixture, TestHarness,
};
use engine::{
    AggregateField, Aggregation, BinaryOperator, Column, Expression, FlattenOptions, Value,
};
use flow::{FlowError, Job};
use step_engine::{
    ExampleBudget, FlattenConfig, MemoryTable, PivotConfig, PivotValue, SortKey, StepKind,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// A small city/q1/q2 table for the reshaping tests.
fn quarters_table() -> MemoryTable {
    MemoryTable::new(
        vec![Column::new("city"), Column::new("q1"), Column::new("q2")],
        vec![
            vec![Value::text("Oslo"), Value::Integer(1), Value::Integer(2)],
            vec![Value::text("Bergen"), Value::Integer(3), Value::Integer(4)],
        ],
    )
}

fn sum_of(column: &str) -> AggregateField {
    AggregateField {
        expr: Expression::column(column),
        aggregation: Aggregation::Sum,
    }
}

// ============================================================================
// ROW-WISE STEPS
// ============================================================================

#[tokio::test]
async fn test_filter_keeps_matching_rows() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Filter {
            predicate: over("amount", 100.0),
        },
    );

    let raster = harness.full(chain).await;
    assert_eq!(raster.row_count(), 4);
    assert_cell_number(&raster, 0, "order", 1.0);
    assert_cell_number(&raster, 3, "order", 7.0);
}

#[tokio::test]
async fn test_calculate_appends_a_named_column() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Calculate {
            name: Some("twice".to_string()),
            expr: Expression::binary(
                BinaryOperator::Multiply,
                Expression::column("amount"),
                Expression::literal(Value::Integer(2)),
            ),
        },
    );

    let raster = harness.full(chain).await;
    assert_columns(&raster, &["order", "city", "product", "amount", "twice"]);
    assert_cell_number(&raster, 0, "twice", 240.0);
}

#[tokio::test]
async fn test_calculate_without_a_name_uses_the_expression() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Calculate {
            name: None,
            expr: Expression::binary(
                BinaryOperator::Multiply,
                Expression::column("amount"),
                Expression::literal(Value::Integer(2)),
            ),
        },
    );

    let raster = harness.full(chain).await;
    assert_cell_number(&raster, 1, "amount * 2", 160.0);
}

#[tokio::test]
async fn test_limit_keeps_the_first_rows() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(chain, StepKind::Limit { count: 3 });

    let raster = harness.full(chain).await;
    assert_eq!(raster.row_count(), 3);
    assert_cell_number(&raster, 2, "order", 3.0);
}

// ============================================================================
// WHOLE-TABLE STEPS
// ============================================================================

#[tokio::test]
async fn test_sort_orders_rows_by_key() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Sort {
            keys: vec![SortKey::descending("amount")],
        },
    );

    let raster = harness.full(chain).await;
    assert_cell_number(&raster, 0, "amount", 300.0);
    assert_cell_number(&raster, 7, "amount", 50.0);
}

#[tokio::test]
async fn test_sort_applies_keys_in_order() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Sort {
            keys: vec![SortKey::ascending("city"), SortKey::descending("amount")],
        },
    );

    let raster = harness.full(chain).await;
    assert_cell_text(&raster, 0, "city", "Bergen");
    assert_cell_number(&raster, 0, "amount", 200.0);
    assert_cell_number(&raster, 1, "amount", 150.0);
    assert_cell_number(&raster, 2, "amount", 50.0);
    assert_cell_text(&raster, 3, "city", "Oslo");
    assert_cell_number(&raster, 3, "amount", 300.0);
    assert_cell_text(&raster, 7, "city", "Tromso");
}

#[tokio::test]
async fn test_sort_by_a_missing_column_fails() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Sort {
            keys: vec![SortKey::ascending("missing")],
        },
    );

    let job = Job::interactive();
    match harness.workspace.full_data(chain, &job).await {
        Err(FlowError::MissingInput(message)) => {
            assert!(message.contains("sort key"), "unexpected message: {message}");
            assert!(message.contains("missing"), "unexpected message: {message}");
        }
        other => panic!("expected a missing-input error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transpose_turns_rows_into_columns() {
    let mut harness = TestHarness::new();
    let chain = harness.add_literal_chain(quarters_table());
    harness.push(chain, StepKind::Transpose);

    let raster = harness.full(chain).await;
    assert_columns(&raster, &["city", "Oslo", "Bergen"]);
    assert_eq!(raster.row_count(), 2);
    assert_cell_text(&raster, 0, "city", "q1");
    assert_cell_number(&raster, 0, "Oslo", 1.0);
    assert_cell_number(&raster, 1, "Bergen", 4.0);
}

#[tokio::test]
async fn test_aggregate_totals_per_group() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Aggregate {
            groups: vec![Expression::column("city")],
            fields: vec![sum_of("amount")],
        },
    );

    let raster = harness.full(chain).await;
    assert_columns(&raster, &["city", "Sum of amount"]);
    assert_eq!(raster.row_count(), 3);
    assert_cell_text(&raster, 0, "city", "Oslo");
    assert_cell_number(&raster, 0, "Sum of amount", 560.0);
    assert_cell_text(&raster, 1, "city", "Bergen");
    assert_cell_number(&raster, 1, "Sum of amount", 400.0);
    assert_cell_text(&raster, 2, "city", "Tromso");
    assert_cell_number(&raster, 2, "Sum of amount", 90.0);
}

#[tokio::test]
async fn test_aggregate_without_groups_is_a_grand_total() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Aggregate {
            groups: vec![],
            fields: vec![AggregateField {
                expr: Expression::column("amount"),
                aggregation: Aggregation::Count,
            }],
        },
    );

    let raster = harness.full(chain).await;
    assert_eq!(raster.row_count(), 1);
    assert_cell_number(&raster, 0, "Count of amount", 8.0);
}

#[tokio::test]
async fn test_pivot_cross_tabulates() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Pivot(PivotConfig {
            row_fields: vec![Column::new("city")],
            column_fields: vec![Column::new("product")],
            values: vec![PivotValue {
                column: Column::new("amount"),
                aggregation: Aggregation::Sum,
            }],
        }),
    );

    let raster = harness.full(chain).await;
    assert_columns(&raster, &["city", "Widget", "Gadget"]);
    assert_eq!(raster.row_count(), 3);
    assert_cell_number(&raster, 0, "Widget", 420.0);
    assert_cell_number(&raster, 0, "Gadget", 140.0);
    assert_cell_number(&raster, 1, "Widget", 250.0);
    assert_cell_empty(&raster, 2, "Widget");
    assert_cell_number(&raster, 2, "Gadget", 90.0);
}

#[tokio::test]
async fn test_flatten_unpivots_value_columns() {
    let mut harness = TestHarness::new();
    let chain = harness.add_literal_chain(quarters_table());
    harness.push(
        chain,
        StepKind::Flatten(FlattenConfig {
            keys: vec![Column::new("city")],
            values: vec![Column::new("q1"), Column::new("q2")],
            options: FlattenOptions::default(),
        }),
    );

    let raster = harness.full(chain).await;
    assert_columns(&raster, &["city", "Name", "Value"]);
    assert_eq!(raster.row_count(), 4);
    assert_cell_text(&raster, 0, "city", "Oslo");
    assert_cell_text(&raster, 0, "Name", "q1");
    assert_cell_number(&raster, 0, "Value", 1.0);
    assert_cell_text(&raster, 3, "Name", "q2");
    assert_cell_number(&raster, 3, "Value", 4.0);
}

// ============================================================================
// PIPELINES
// ============================================================================

#[tokio::test]
async fn test_steps_compose_along_the_line() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Filter {
            predicate: over("amount", 70.0),
        },
    );
    harness.push(
        chain,
        StepKind::Calculate {
            name: Some("fee".to_string()),
            expr: Expression::binary(
                BinaryOperator::Multiply,
                Expression::column("amount"),
                Expression::literal(Value::Double(0.1)),
            ),
        },
    );
    harness.push(
        chain,
        StepKind::Sort {
            keys: vec![SortKey::descending("fee")],
        },
    );
    harness.push(chain, StepKind::Limit { count: 2 });

    let raster = harness.full(chain).await;
    assert_eq!(raster.row_count(), 2);
    assert_cell_number(&raster, 0, "order", 5.0);
    assert_cell_number(&raster, 0, "fee", 30.0);
    assert_cell_number(&raster, 1, "order", 3.0);
    assert_cell_number(&raster, 1, "fee", 20.0);
}

#[tokio::test]
async fn test_previews_are_available_mid_line() {
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    let filter = harness.push(
        chain,
        StepKind::Filter {
            predicate: over("amount", 100.0),
        },
    );
    harness.push(chain, StepKind::Limit { count: 1 });

    let job = Job::interactive();
    let data = harness
        .workspace
        .example_data_at(chain, filter, &job, ExampleBudget::default())
        .await
        .unwrap();
    let raster = common::land(data, &job).await;
    assert_eq!(raster.row_count(), 4);
}

// ============================================================================
// EXAMPLE BUDGETS
// ============================================================================

#[tokio::test]
async fn test_example_mode_caps_a_wide_source() {
    let mut harness = TestHarness::new();
    let chain = harness.add_literal_chain(numbers_table(500));

    let budget = ExampleBudget {
        max_input_rows: 1000,
        max_output_rows: 40,
    };
    let raster = harness.example_under(chain, budget).await;
    assert_eq!(raster.row_count(), 40);
    assert!(raster.is_partial());
}

#[tokio::test]
async fn test_example_mode_bounds_whole_table_reads() {
    let mut harness = TestHarness::new();
    let chain = harness.add_literal_chain(numbers_table(500));
    harness.push(
        chain,
        StepKind::Sort {
            keys: vec![SortKey::ascending("n")],
        },
    );

    let budget = ExampleBudget {
        max_input_rows: 30,
        max_output_rows: 100,
    };
    let raster = harness.example_under(chain, budget).await;
    assert_eq!(raster.row_count(), 30);
    assert!(raster.is_partial());
    assert_cell_number(&raster, 29, "n", 30.0);
}

#[tokio::test]
async fn test_full_mode_reads_everything() {
    let mut harness = TestHarness::new();
    let chain = harness.add_literal_chain(numbers_table(500));
    harness.push(
        chain,
        StepKind::Sort {
            keys: vec![SortKey::descending("n")],
        },
    );

    let raster = harness.full(chain).await;
    assert_eq!(raster.row_count(), 500);
    assert!(!raster.is_partial());
    assert_cell_number(&raster, 0, "n", 500.0);
}

#[tokio::test]
async fn test_example_mode_tightens_a_loose_limit() {
    let mut harness = TestHarness::new();
    let chain = harness.add_literal_chain(numbers_table(500));
    harness.push(chain, StepKind::Limit { count: 400 });

    let budget = ExampleBudget {
        max_input_rows: 1000,
        max_output_rows: 20,
    };
    let raster = harness.example_under(chain, budget).await;
    assert_eq!(raster.row_count(), 20);
}

// ============================================================================
// INPUT ERRORS
// ============================================================================

#[tokio::test]
async fn test_a_transform_without_input_fails() {
    let mut harness = TestHarness::new();
    let chain = harness.workspace.add_chain();
    harness.push(
        chain,
        StepKind::Filter {
            predicate: over("amount", 1.0),
        },
    );

    let job = Job::interactive();
    match harness.workspace.full_data(chain, &job).await {
        Err(FlowError::MissingInput(message)) => {
            assert!(
                message.contains("previous step"),
                "unexpected message: {message}"
            );
        }
        other => panic!("expected a missing-input error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_filtering_on_an_unknown_column_is_not_an_error() {
    // Unknown columns evaluate to Invalid, and Invalid never matches a
    // predicate. The rows vanish instead of the evaluation failing, the
    // same way a bad cell formula poisons a value rather than a job.
    let mut harness = TestHarness::new();
    let chain = harness.add_orders_chain();
    harness.push(
        chain,
        StepKind::Filter {
            predicate: over("no_such_column", 1.0),
        },
    );

    let raster = harness.full(chain).await;
    assert_eq!(raster.row_count(), 0);
    assert_columns(&raster, &OrdersFixture::headers());
}
