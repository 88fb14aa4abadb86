//! FILENAME: engine/src/raster.rs
//! PURPOSE: The fully materialized table: a schema plus rows held in memory.
//! CONTEXT: Rasters are what streams drain into and what the whole-table
//! operations (sort, transpose, aggregate, pivot, flatten) work on. A raster
//! remembers whether it was cut short while being produced; that `partial`
//! flag travels through every derived raster so a preview is never mistaken
//! for complete data.

use serde::{Deserialize, Serialize};

use crate::column::{unique_schema, Column};
use crate::value::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A materialized table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    columns: Vec<Column>,
    rows: Vec<Row>,
    partial: bool,
}

impl Raster {
    /// Builds a raster, normalizing every row to the schema width. Short
    /// rows are padded with `Empty`, long rows truncated.
    pub fn new(columns: Vec<Column>, mut rows: Vec<Row>) -> Self {
        let width = columns.len();
        for row in &mut rows {
            row.resize(width, Value::Empty);
        }
        Raster { columns, rows, partial: false }
    }

    pub fn empty() -> Self {
        Raster { columns: Vec::new(), rows: Vec::new(), partial: false }
    }

    pub fn column_names(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether this raster was truncated by a budget or deadline before its
    /// source was exhausted.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn mark_partial(&mut self) {
        self.partial = true;
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        crate::column::column_index(&self.columns, name)
    }

    pub fn value_at(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// The first `count` rows. Counts larger than the raster return all of
    /// it unchanged.
    pub fn limit(&self, count: usize) -> Raster {
        Raster {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(count).cloned().collect(),
            partial: self.partial,
        }
    }

    /// Stable multi-key sort. Keys are column positions paired with a
    /// direction; earlier keys dominate. Values compare by the engine's
    /// total order, so mixed-type columns sort deterministically and
    /// invalids sink to the end of an ascending sort.
    pub fn sorted_by(&self, keys: &[(usize, SortDirection)]) -> Raster {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            for &(index, direction) in keys {
                let left = a.get(index).unwrap_or(&Value::Empty);
                let right = b.get(index).unwrap_or(&Value::Empty);
                let ordering = match direction {
                    SortDirection::Ascending => left.total_cmp(right),
                    SortDirection::Descending => right.total_cmp(left),
                };
                if !ordering.is_eq() {
                    return ordering;
                }
            }
            std::cmp::Ordering::Equal
        });
        Raster { columns: self.columns.clone(), rows, partial: self.partial }
    }

    /// Header-aware transpose. The first column's values become the new
    /// column names (after the corner cell, which keeps the old first
    /// column's name), and the remaining column names become the new first
    /// column's values. Applied twice it returns the original raster,
    /// provided the first column holds unique text values.
    pub fn transpose(&self) -> Raster {
        if self.columns.is_empty() {
            return self.clone();
        }
        let mut names = Vec::with_capacity(self.rows.len() + 1);
        names.push(self.columns[0].name().to_string());
        for row in &self.rows {
            names.push(row.first().map(Value::display).unwrap_or_default());
        }
        let columns = unique_schema(names);

        let mut rows = Vec::with_capacity(self.columns.len().saturating_sub(1));
        for (j, column) in self.columns.iter().enumerate().skip(1) {
            let mut out: Row = Vec::with_capacity(self.rows.len() + 1);
            out.push(Value::text(column.name()));
            for row in &self.rows {
                out.push(row.get(j).cloned().unwrap_or(Value::Empty));
            }
            rows.push(out);
        }
        Raster { columns, rows, partial: self.partial }
    }
}
