//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for step-engine integration tests.

use std::sync::Arc;

use engine::{BinaryOperator, Column, Expression, Raster, Value};
use flow::{materialize, Data, DrainBudget, Job};
use step_engine::{ChainId, ExampleBudget, MemoryTable, StepId, StepKind, Workspace};

/// Test harness around a workspace, with shortcuts for building chains
/// and landing their results.
pub struct TestHarness {
    pub workspace: Workspace,
}

impl TestHarness {
    /// Create a new test harness with an empty workspace.
    pub fn new() -> Self {
        TestHarness {
            workspace: Workspace::new(),
        }
    }

    /// Add a chain whose source is the given in-memory table, returning
    /// the chain id.
    pub fn add_literal_chain(&mut self, table: MemoryTable) -> ChainId {
        let id = self.workspace.add_chain();
        self.push(id, StepKind::Literal(table));
        id
    }

    /// Add a chain sourced from the orders fixture.
    pub fn add_orders_chain(&mut self) -> ChainId {
        self.add_literal_chain(OrdersFixture::table())
    }

    /// Add a chain sourced from the cities fixture.
    pub fn add_cities_chain(&mut self) -> ChainId {
        self.add_literal_chain(CitiesFixture::table())
    }

    /// Push a step onto the head of a chain.
    pub fn push(&mut self, chain: ChainId, kind: StepKind) -> StepId {
        self.workspace
            .chain_mut(chain)
            .expect("the harness only hands out ids it created")
            .push_head(kind)
    }

    /// Evaluate a chain in full mode and land the complete result.
    pub async fn full(&self, chain: ChainId) -> Arc<Raster> {
        let job = Job::interactive();
        let data = self
            .workspace
            .full_data(chain, &job)
            .await
            .expect("full evaluation of a test chain should succeed");
        land(data, &job).await
    }

    /// Evaluate a chain in example mode under the default budget and land
    /// the preview.
    pub async fn example(&self, chain: ChainId) -> Arc<Raster> {
        self.example_under(chain, ExampleBudget::default()).await
    }

    /// Evaluate a chain in example mode under a specific budget.
    pub async fn example_under(&self, chain: ChainId, budget: ExampleBudget) -> Arc<Raster> {
        let job = Job::interactive();
        let data = self
            .workspace
            .example_data(chain, &job, budget)
            .await
            .expect("example evaluation of a test chain should succeed");
        let cap = DrainBudget::rows(budget.max_output_rows);
        materialize(data, &job, &cap)
            .await
            .expect("landing a test preview should succeed")
    }
}

/// Land data without any budget, unwrapping errors.
pub async fn land(data: Data, job: &Job) -> Arc<Raster> {
    materialize(data, job, &DrainBudget::unbounded())
        .await
        .expect("landing test data should succeed")
}

// ============================================================================
// TEST DATA FIXTURES
// ============================================================================

/// Sample order data for filtering, sorting and aggregation tests.
pub struct OrdersFixture;

impl OrdersFixture {
    pub fn headers() -> Vec<&'static str> {
        vec!["order", "city", "product", "amount"]
    }

    pub fn data() -> Vec<(i64, &'static str, &'static str, f64)> {
        vec![
            (1, "Oslo", "Widget", 120.0),
            (2, "Oslo", "Gadget", 80.0),
            (3, "Bergen", "Widget", 200.0),
            (4, "Bergen", "Widget", 50.0),
            (5, "Oslo", "Widget", 300.0),
            (6, "Tromso", "Gadget", 90.0),
            (7, "Bergen", "Gadget", 150.0),
            (8, "Oslo", "Gadget", 60.0),
        ]
    }

    pub fn table() -> MemoryTable {
        let columns = Self::headers().into_iter().map(Column::new).collect();
        let rows = Self::data()
            .into_iter()
            .map(|(order, city, product, amount)| {
                vec![
                    Value::Integer(order),
                    Value::text(city),
                    Value::text(product),
                    Value::Double(amount),
                ]
            })
            .collect();
        MemoryTable::new(columns, rows)
    }
}

/// Sample city data for join tests. "Paris" appears only here, never in
/// the orders, so left joins have a row to pad.
pub struct CitiesFixture;

impl CitiesFixture {
    pub fn headers() -> Vec<&'static str> {
        vec!["city", "country"]
    }

    pub fn data() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Oslo", "Norway"),
            ("Bergen", "Norway"),
            ("Paris", "France"),
        ]
    }

    pub fn table() -> MemoryTable {
        let columns = Self::headers().into_iter().map(Column::new).collect();
        let rows = Self::data()
            .into_iter()
            .map(|(city, country)| vec![Value::text(city), Value::text(country)])
            .collect();
        MemoryTable::new(columns, rows)
    }
}

/// A single-column table of the integers 1..=n, for budget and sampling
/// tests that need a predictable row count.
pub fn numbers_table(n: i64) -> MemoryTable {
    MemoryTable::new(
        vec![Column::new("n")],
        (1..=n).map(|v| vec![Value::Integer(v)]).collect(),
    )
}

// ============================================================================
// EXPRESSION SHORTHANDS
// ============================================================================

/// Predicate `column > bound`.
pub fn over(column: &str, bound: f64) -> Expression {
    Expression::binary(
        BinaryOperator::GreaterThan,
        Expression::column(column),
        Expression::literal(Value::Double(bound)),
    )
}

/// Predicate `column = text`.
pub fn is_text(column: &str, text: &str) -> Expression {
    Expression::binary(
        BinaryOperator::Equal,
        Expression::column(column),
        Expression::literal(Value::text(text)),
    )
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

/// Assert that a raster has exactly the expected column names, in order.
pub fn assert_columns(raster: &Raster, expected: &[&str]) {
    let actual: Vec<&str> = raster
        .column_names()
        .iter()
        .map(|column| column.name())
        .collect();
    assert_eq!(
        actual, expected,
        "Expected columns {:?} but got {:?}",
        expected, actual
    );
}

/// Assert that a cell holds the expected text.
pub fn assert_cell_text(raster: &Raster, row: usize, column: &str, expected: &str) {
    let value = cell(raster, row, column);
    match value {
        Value::Text(s) => assert_eq!(
            s, expected,
            "Cell ({}, {}) expected {:?} but got {:?}",
            row, column, expected, s
        ),
        other => panic!(
            "Cell ({}, {}) expected Text({:?}) but got {:?}",
            row, column, expected, other
        ),
    }
}

/// Assert that a cell coerces to the expected number.
pub fn assert_cell_number(raster: &Raster, row: usize, column: &str, expected: f64) {
    let value = cell(raster, row, column);
    match value.as_double() {
        Some(n) => assert!(
            (n - expected).abs() < 0.001,
            "Cell ({}, {}) expected {} but got {}",
            row,
            column,
            expected,
            n
        ),
        None => panic!(
            "Cell ({}, {}) expected a number {} but got {:?}",
            row, column, expected, value
        ),
    }
}

/// Assert that a cell is empty.
pub fn assert_cell_empty(raster: &Raster, row: usize, column: &str) {
    let value = cell(raster, row, column);
    assert!(
        value.is_empty(),
        "Cell ({}, {}) expected Empty but got {:?}",
        row,
        column,
        value
    );
}

fn cell(raster: &Raster, row: usize, column: &str) -> Value {
    let position = raster
        .column_index(column)
        .unwrap_or_else(|| panic!("No column named {:?} in {:?}", column, raster.column_names()));
    raster
        .value_at(row, position)
        .unwrap_or_else(|| panic!("No row {} in a raster of {} rows", row, raster.row_count()))
        .clone()
}
