//! FILENAME: step-engine/src/mutation.rs
//! PURPOSE: Writing back through a chain: the mutation protocol and the
//! in-memory table that implements it.
//! CONTEXT: A chain is mostly a one-way pipe, but a source that owns its
//! rows can accept edits. Callers describe the whole edit as a `Mutation`
//! value; the store validates every part of it against its current
//! contents and only then commits, so a rejected mutation leaves the store
//! exactly as it was. Edits carry the value they expect to replace, which
//! lets a store refuse writes raced by someone else.

use async_trait::async_trait;
use engine::{column_index, Column, Raster, Row, Value};
use flow::{Fallible, FlowError, Job};
use log::debug;
use serde::{Deserialize, Serialize};

// ============================================================================
// Mutations
// ============================================================================

/// One edit request against a mutable store.
///
/// `Edit` addresses a cell by row position and suits stores with stable
/// row order; `Update` addresses it by a key match and works wherever the
/// store declares an identifier. Both carry the old value so the store can
/// detect that the cell changed underneath the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Append a full row.
    Insert(Row),
    /// Replace one cell, addressed by row position.
    Edit {
        row: usize,
        column: Column,
        old: Value,
        new: Value,
    },
    /// Replace one cell in the single row matching the key columns.
    Update {
        key: Vec<(Column, Value)>,
        column: Column,
        old: Value,
        new: Value,
    },
    /// Rename columns, given as (from, to) pairs applied together.
    Rename(Vec<(Column, Column)>),
    /// Replace the schema. Columns present in both keep their data; new
    /// columns fill with `Empty`.
    Alter(Vec<Column>),
    /// Delete every row, keeping the schema.
    Truncate,
    /// Delete the store outright, schema included.
    Drop,
}

impl Mutation {
    /// Short lowercase name for log lines and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::Insert(_) => "insert",
            Mutation::Edit { .. } => "edit",
            Mutation::Update { .. } => "update",
            Mutation::Rename(_) => "rename",
            Mutation::Alter(_) => "alter",
            Mutation::Truncate => "truncate",
            Mutation::Drop => "drop",
        }
    }
}

// ============================================================================
// The MutableData trait
// ============================================================================

/// A data store that accepts mutations.
///
/// `can_perform` is a cheap structural check, fit for enabling or greying
/// out editing affordances. `perform` revalidates against live contents
/// and commits atomically: on any error the store is unchanged.
#[async_trait]
pub trait MutableData: Send {
    /// Whether the store could attempt this mutation at all. Says nothing
    /// about stale old values; only `perform` sees those.
    fn can_perform(&self, mutation: &Mutation) -> bool;

    /// Validates the mutation against current contents, then commits it
    /// whole. Nothing has changed when an error comes back.
    async fn perform(&mut self, mutation: Mutation, job: &Job) -> Fallible<()>;

    /// The columns that uniquely identify a row, when the store declares
    /// any. `Update` mutations address rows through these.
    async fn identifier(&self, job: &Job) -> Fallible<Option<Vec<Column>>>;
}

// ============================================================================
// MemoryTable
// ============================================================================

/// An editable table held in memory, the store behind the literal source
/// step. Supports the full mutation protocol, including an optional
/// declared key that inserts and edits must keep unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryTable {
    columns: Vec<Column>,
    rows: Vec<Row>,
    key: Option<Vec<Column>>,
}

impl MemoryTable {
    /// Builds a table, padding or trimming every row to the column count.
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> MemoryTable {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Empty);
                row
            })
            .collect();
        MemoryTable {
            columns,
            rows,
            key: None,
        }
    }

    /// Declares the columns that uniquely identify a row. Existing rows
    /// are taken on trust; inserts and edits enforce the key from here on.
    pub fn with_key(mut self, key: Vec<Column>) -> MemoryTable {
        self.key = Some(key);
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// A snapshot of the current contents.
    pub fn to_raster(&self) -> Raster {
        Raster::new(self.columns.clone(), self.rows.clone())
    }

    fn position(&self, column: &Column) -> Fallible<usize> {
        column_index(&self.columns, column.name())
            .ok_or_else(|| FlowError::mutation(format!("no column named \"{column}\"")))
    }

    /// Positions of the declared key columns, when a key exists and all
    /// of its columns are still present.
    fn key_positions(&self) -> Option<Vec<usize>> {
        let key = self.key.as_ref()?;
        key.iter()
            .map(|column| column_index(&self.columns, column.name()))
            .collect()
    }

    fn key_of(row: &Row, positions: &[usize]) -> Vec<Value> {
        positions
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or(Value::Empty))
            .collect()
    }

    /// Rejects a prospective row whose key tuple some other row already
    /// carries. `skip` exempts the row being edited in place.
    fn check_key_unique(&self, prospective: &Row, skip: Option<usize>) -> Fallible<()> {
        let Some(positions) = self.key_positions() else {
            return Ok(());
        };
        let tuple = Self::key_of(prospective, &positions);
        for (i, row) in self.rows.iter().enumerate() {
            if skip == Some(i) {
                continue;
            }
            if Self::key_of(row, &positions) == tuple {
                return Err(FlowError::mutation(
                    "a row with the same key already exists",
                ));
            }
        }
        Ok(())
    }

    /// Validates and applies a single-cell write at a known position.
    fn write_cell(&mut self, row: usize, position: usize, old: Value, new: Value) -> Fallible<()> {
        let current = self
            .rows
            .get(row)
            .ok_or_else(|| FlowError::mutation(format!("row {row} is out of range")))?;
        let held = current.get(position).cloned().unwrap_or(Value::Empty);
        if held != old {
            return Err(FlowError::mutation(format!(
                "the cell now holds {} rather than {}; reload and retry",
                held.display(),
                old.display()
            )));
        }
        let mut prospective = current.clone();
        if prospective.len() <= position {
            prospective.resize(position + 1, Value::Empty);
        }
        prospective[position] = new;
        self.check_key_unique(&prospective, Some(row))?;
        self.rows[row] = prospective;
        Ok(())
    }

    fn insert(&mut self, row: Row) -> Fallible<()> {
        if row.len() != self.columns.len() {
            return Err(FlowError::mutation(format!(
                "the row has {} cells but the table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.check_key_unique(&row, None)?;
        self.rows.push(row);
        Ok(())
    }

    fn update(&mut self, key: Vec<(Column, Value)>, column: Column, old: Value, new: Value) -> Fallible<()> {
        let mut lookup = Vec::with_capacity(key.len());
        for (column, value) in &key {
            lookup.push((self.position(column)?, value));
        }
        let mut matches = self.rows.iter().enumerate().filter_map(|(i, row)| {
            let hit = lookup
                .iter()
                .all(|&(position, value)| row.get(position) == Some(value));
            hit.then_some(i)
        });
        let row = match (matches.next(), matches.next()) {
            (None, _) => return Err(FlowError::mutation("no row matches the key")),
            (Some(row), None) => row,
            (Some(_), Some(_)) => {
                return Err(FlowError::mutation(
                    "more than one row matches the key; refusing an ambiguous update",
                ))
            }
        };
        let position = self.position(&column)?;
        self.write_cell(row, position, old, new)
    }

    fn rename(&mut self, pairs: Vec<(Column, Column)>) -> Fallible<()> {
        let mut renamed = self.columns.clone();
        let mut touched = Vec::with_capacity(pairs.len());
        for (from, to) in &pairs {
            let position = self.position(from)?;
            if touched.contains(&position) {
                return Err(FlowError::mutation(format!(
                    "column \"{from}\" is renamed twice in one request"
                )));
            }
            touched.push(position);
            renamed[position] = to.clone();
        }
        for i in 0..renamed.len() {
            for j in i + 1..renamed.len() {
                if renamed[i] == renamed[j] {
                    return Err(FlowError::mutation(format!(
                        "the rename would leave two columns named \"{}\"",
                        renamed[i]
                    )));
                }
            }
        }
        // Keep the declared key pointing at the renamed columns.
        if let Some(key) = &mut self.key {
            for key_column in key.iter_mut() {
                if let Some((_, to)) = pairs.iter().find(|(from, _)| from == &*key_column) {
                    *key_column = to.clone();
                }
            }
        }
        self.columns = renamed;
        Ok(())
    }

    fn alter(&mut self, schema: Vec<Column>) -> Fallible<()> {
        for i in 0..schema.len() {
            for j in i + 1..schema.len() {
                if schema[i] == schema[j] {
                    return Err(FlowError::mutation(format!(
                        "the new schema names \"{}\" twice",
                        schema[i]
                    )));
                }
            }
        }
        let carried: Vec<Option<usize>> = schema
            .iter()
            .map(|column| column_index(&self.columns, column.name()))
            .collect();
        self.rows = self
            .rows
            .iter()
            .map(|row| {
                carried
                    .iter()
                    .map(|source| match source {
                        Some(i) => row.get(*i).cloned().unwrap_or(Value::Empty),
                        None => Value::Empty,
                    })
                    .collect()
            })
            .collect();
        // A key missing any of its columns no longer identifies anything.
        if let Some(key) = &self.key {
            let intact = key
                .iter()
                .all(|column| column_index(&schema, column.name()).is_some());
            if !intact {
                self.key = None;
            }
        }
        self.columns = schema;
        Ok(())
    }
}

#[async_trait]
impl MutableData for MemoryTable {
    fn can_perform(&self, mutation: &Mutation) -> bool {
        let known = |column: &Column| column_index(&self.columns, column.name()).is_some();
        match mutation {
            Mutation::Insert(row) => row.len() == self.columns.len(),
            Mutation::Edit { row, column, .. } => *row < self.rows.len() && known(column),
            Mutation::Update { key, column, .. } => {
                known(column) && key.iter().all(|(column, _)| known(column))
            }
            Mutation::Rename(pairs) => pairs.iter().all(|(from, _)| known(from)),
            Mutation::Alter(_) | Mutation::Truncate | Mutation::Drop => true,
        }
    }

    async fn perform(&mut self, mutation: Mutation, job: &Job) -> Fallible<()> {
        job.check()?;
        debug!("applying {} to the in-memory table", mutation.label());
        match mutation {
            Mutation::Insert(row) => self.insert(row),
            Mutation::Edit {
                row,
                column,
                old,
                new,
            } => {
                let position = self.position(&column)?;
                self.write_cell(row, position, old, new)
            }
            Mutation::Update {
                key,
                column,
                old,
                new,
            } => self.update(key, column, old, new),
            Mutation::Rename(pairs) => self.rename(pairs),
            Mutation::Alter(schema) => self.alter(schema),
            Mutation::Truncate => {
                self.rows.clear();
                Ok(())
            }
            Mutation::Drop => {
                self.columns.clear();
                self.rows.clear();
                self.key = None;
                Ok(())
            }
        }
    }

    async fn identifier(&self, job: &Job) -> Fallible<Option<Vec<Column>>> {
        job.check()?;
        Ok(self.key.clone())
    }
}
