//! FILENAME: step-engine/src/streams.rs
//! PURPOSE: The stream adapters behind row-wise steps: filter, calculate,
//! limit and join, each wrapping its input stream without landing it.
//! CONTEXT: These keep chains lazy. Pulling a batch from an adapter pulls
//! from its inner stream, applies the step's row transform, and hands the
//! batch on, so a limit near the head of a long chain stops upstream work
//! early. Adapters that can swallow whole batches (filter, inner join)
//! keep pulling until they have rows or the input ends, sparing callers a
//! parade of empty fetches. Only the join holds state of any size: the
//! secondary table, already materialized and indexed by key.

use std::sync::Arc;

use async_trait::async_trait;

use engine::{column_index, disambiguate, Column, Evaluator, Expression, GroupKey, Raster, Row, Value};
use flow::{Fallible, Fetch, FlowError, Job, RowStream};
use rustc_hash::FxHashMap;

use crate::step::JoinKind;

// ============================================================================
// FilterStream
// ============================================================================

/// Passes through the rows its predicate matches.
pub struct FilterStream {
    inner: Box<dyn RowStream>,
    predicate: Expression,
    columns: Option<Vec<Column>>,
}

impl FilterStream {
    pub fn new(inner: Box<dyn RowStream>, predicate: Expression) -> FilterStream {
        FilterStream {
            inner,
            predicate,
            columns: None,
        }
    }

    async fn schema(&mut self, job: &Job) -> Fallible<Vec<Column>> {
        if let Some(columns) = &self.columns {
            return Ok(columns.clone());
        }
        let columns = self.inner.column_names(job).await?;
        self.columns = Some(columns.clone());
        Ok(columns)
    }
}

#[async_trait]
impl RowStream for FilterStream {
    async fn column_names(&mut self, job: &Job) -> Fallible<Vec<Column>> {
        self.schema(job).await
    }

    async fn fetch(&mut self, job: &Job) -> Fallible<Fetch> {
        let columns = self.schema(job).await?;
        let evaluator = Evaluator::new(&columns);
        loop {
            job.check()?;
            let fetch = self.inner.fetch(job).await?;
            let has_more = fetch.has_more;
            let rows: Vec<Row> = fetch
                .rows
                .into_iter()
                .filter(|row| evaluator.matches(&self.predicate, row))
                .collect();
            if !rows.is_empty() || !has_more {
                return Ok(Fetch::new(rows, has_more));
            }
        }
    }

    fn clone_stream(&self) -> Box<dyn RowStream> {
        Box::new(FilterStream {
            inner: self.inner.clone_stream(),
            predicate: self.predicate.clone(),
            columns: self.columns.clone(),
        })
    }
}

// ============================================================================
// CalculateStream
// ============================================================================

/// Appends one derived column, evaluated per row against the input
/// schema. The output column takes the given name, or the expression's
/// display form, disambiguated against the input columns either way.
pub struct CalculateStream {
    inner: Box<dyn RowStream>,
    name: Option<String>,
    expr: Expression,
    input_columns: Option<Vec<Column>>,
}

impl CalculateStream {
    pub fn new(inner: Box<dyn RowStream>, name: Option<String>, expr: Expression) -> CalculateStream {
        CalculateStream {
            inner,
            name,
            expr,
            input_columns: None,
        }
    }

    async fn input_schema(&mut self, job: &Job) -> Fallible<Vec<Column>> {
        if let Some(columns) = &self.input_columns {
            return Ok(columns.clone());
        }
        let columns = self.inner.column_names(job).await?;
        self.input_columns = Some(columns.clone());
        Ok(columns)
    }

    fn derived_column(&self, input: &[Column]) -> Column {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => self.expr.to_string(),
        };
        disambiguate(input, &name)
    }
}

#[async_trait]
impl RowStream for CalculateStream {
    async fn column_names(&mut self, job: &Job) -> Fallible<Vec<Column>> {
        let mut columns = self.input_schema(job).await?;
        let derived = self.derived_column(&columns);
        columns.push(derived);
        Ok(columns)
    }

    async fn fetch(&mut self, job: &Job) -> Fallible<Fetch> {
        let columns = self.input_schema(job).await?;
        let evaluator = Evaluator::new(&columns);
        job.check()?;
        let fetch = self.inner.fetch(job).await?;
        let has_more = fetch.has_more;
        let rows: Vec<Row> = fetch
            .rows
            .into_iter()
            .map(|mut row| {
                let value = evaluator.evaluate(&self.expr, &row);
                row.push(value);
                row
            })
            .collect();
        Ok(Fetch::new(rows, has_more))
    }

    fn clone_stream(&self) -> Box<dyn RowStream> {
        Box::new(CalculateStream {
            inner: self.inner.clone_stream(),
            name: self.name.clone(),
            expr: self.expr.clone(),
            input_columns: self.input_columns.clone(),
        })
    }
}

// ============================================================================
// LimitStream
// ============================================================================

/// Passes rows through until a count is exhausted, then reports the end
/// without pulling upstream again.
pub struct LimitStream {
    inner: Box<dyn RowStream>,
    limit: usize,
    remaining: usize,
}

impl LimitStream {
    pub fn new(inner: Box<dyn RowStream>, limit: usize) -> LimitStream {
        LimitStream {
            inner,
            limit,
            remaining: limit,
        }
    }
}

#[async_trait]
impl RowStream for LimitStream {
    async fn column_names(&mut self, job: &Job) -> Fallible<Vec<Column>> {
        self.inner.column_names(job).await
    }

    async fn fetch(&mut self, job: &Job) -> Fallible<Fetch> {
        if self.remaining == 0 {
            return Ok(Fetch::done());
        }
        job.check()?;
        let mut fetch = self.inner.fetch(job).await?;
        if fetch.rows.len() > self.remaining {
            fetch.rows.truncate(self.remaining);
        }
        self.remaining -= fetch.rows.len();
        let has_more = fetch.has_more && self.remaining > 0;
        Ok(Fetch::new(fetch.rows, has_more))
    }

    fn clone_stream(&self) -> Box<dyn RowStream> {
        // A clone starts over, so it gets the full allowance back.
        Box::new(LimitStream::new(self.inner.clone_stream(), self.limit))
    }
}

// ============================================================================
// JoinStream
// ============================================================================

/// Streams the primary side of a join against an already materialized
/// secondary table. The secondary is indexed by key once; each primary
/// row then emits one output row per match, or one `Empty`-padded row for
/// a left join without matches. Key equality follows `GroupKey`, so
/// numerically equal integers and doubles pair up.
pub struct JoinStream {
    left: Box<dyn RowStream>,
    right: Arc<Raster>,
    index: Arc<FxHashMap<GroupKey, Vec<usize>>>,
    left_key: Column,
    kind: JoinKind,
    columns: Option<Vec<Column>>,
    key_position: usize,
    left_width: usize,
}

impl JoinStream {
    /// Builds the key index over the secondary table. Fails when the
    /// secondary has no column named `right_key`.
    pub fn new(
        left: Box<dyn RowStream>,
        right: Arc<Raster>,
        left_key: Column,
        right_key: &Column,
        kind: JoinKind,
    ) -> Fallible<JoinStream> {
        let key_column = right.column_index(right_key.name()).ok_or_else(|| {
            FlowError::missing_input(format!(
                "join key \"{right_key}\" is not a column of the secondary chain"
            ))
        })?;
        let mut index: FxHashMap<GroupKey, Vec<usize>> = FxHashMap::default();
        for (position, row) in right.rows().iter().enumerate() {
            let key = GroupKey::new([row.get(key_column).cloned().unwrap_or(Value::Empty)]);
            index.entry(key).or_default().push(position);
        }
        Ok(JoinStream {
            left,
            right,
            index: Arc::new(index),
            left_key,
            kind,
            columns: None,
            key_position: 0,
            left_width: 0,
        })
    }

    /// Resolves the output schema and the primary key position, once.
    async fn prepare(&mut self, job: &Job) -> Fallible<()> {
        if self.columns.is_some() {
            return Ok(());
        }
        let left_columns = self.left.column_names(job).await?;
        let key_position =
            column_index(&left_columns, self.left_key.name()).ok_or_else(|| {
                FlowError::missing_input(format!(
                    "join key \"{}\" is not a column of the input",
                    self.left_key
                ))
            })?;
        self.key_position = key_position;
        self.left_width = left_columns.len();
        let mut columns = left_columns;
        for column in self.right.column_names() {
            let unique = disambiguate(&columns, column.name());
            columns.push(unique);
        }
        self.columns = Some(columns);
        Ok(())
    }
}

#[async_trait]
impl RowStream for JoinStream {
    async fn column_names(&mut self, job: &Job) -> Fallible<Vec<Column>> {
        self.prepare(job).await?;
        Ok(self.columns.clone().unwrap_or_default())
    }

    async fn fetch(&mut self, job: &Job) -> Fallible<Fetch> {
        self.prepare(job).await?;
        loop {
            job.check()?;
            let fetch = self.left.fetch(job).await?;
            let has_more = fetch.has_more;
            let mut rows: Vec<Row> = Vec::new();
            for mut row in fetch.rows {
                row.resize(self.left_width, Value::Empty);
                let key = GroupKey::new([row
                    .get(self.key_position)
                    .cloned()
                    .unwrap_or(Value::Empty)]);
                match self.index.get(&key) {
                    Some(matches) => {
                        for &position in matches {
                            let mut joined = row.clone();
                            if let Some(right_row) = self.right.rows().get(position) {
                                joined.extend_from_slice(right_row);
                            }
                            rows.push(joined);
                        }
                    }
                    None => {
                        if self.kind == JoinKind::Left {
                            let mut joined = row;
                            joined.resize(
                                self.left_width + self.right.column_count(),
                                Value::Empty,
                            );
                            rows.push(joined);
                        }
                    }
                }
            }
            if !rows.is_empty() || !has_more {
                return Ok(Fetch::new(rows, has_more));
            }
        }
    }

    fn clone_stream(&self) -> Box<dyn RowStream> {
        Box::new(JoinStream {
            left: self.left.clone_stream(),
            right: Arc::clone(&self.right),
            index: Arc::clone(&self.index),
            left_key: self.left_key.clone(),
            kind: self.kind,
            columns: self.columns.clone(),
            key_position: self.key_position,
            left_width: self.left_width,
        })
    }
}
