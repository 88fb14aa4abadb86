//! FILENAME: flow/src/stream.rs
//! PURPOSE: The lazy, pull-based row stream abstraction.
//! CONTEXT: Streams deliver a schema on demand and rows in batches; nothing
//! upstream runs until a consumer pulls. Schema delivery and row delivery
//! are separate so a consumer can render headers (or validate a
//! configuration) without paying for any rows.

use std::sync::Arc;

use async_trait::async_trait;

use engine::{Column, Raster, Row};

use crate::error::Fallible;
use crate::job::Job;

/// Rows are delivered in batches of this size. Small enough that
/// cancellation checks between batches stay responsive, large enough that
/// per-batch overhead disappears.
pub const BATCH_SIZE: usize = 256;

/// One batch of rows plus whether the source has more to give.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetch {
    pub rows: Vec<Row>,
    pub has_more: bool,
}

impl Fetch {
    /// The terminal fetch: no rows, nothing further.
    pub fn done() -> Self {
        Fetch { rows: Vec::new(), has_more: false }
    }

    pub fn new(rows: Vec<Row>, has_more: bool) -> Self {
        Fetch { rows, has_more }
    }
}

/// A lazy producer of rows.
///
/// Contract: `column_names` may be called any number of times before,
/// between or after fetches and always answers without consuming rows.
/// `fetch` returns successive batches until one reports `has_more: false`;
/// calling it again after that returns empty terminal fetches. Both methods
/// honor the job at every internal suspension point, so a cancelled job
/// surfaces as `FlowError::Cancelled` no later than the next batch
/// boundary.
#[async_trait]
pub trait RowStream: Send {
    /// The schema of the rows this stream will produce.
    async fn column_names(&mut self, job: &Job) -> Fallible<Vec<Column>>;

    /// Pulls the next batch.
    async fn fetch(&mut self, job: &Job) -> Fallible<Fetch>;

    /// An independent stream over the same data, rewound to the start.
    fn clone_stream(&self) -> Box<dyn RowStream>;
}

impl Clone for Box<dyn RowStream> {
    fn clone(&self) -> Self {
        self.clone_stream()
    }
}

/// A stream over an in-memory raster. This is the leaf every materialized
/// table turns back into when something wants to keep streaming.
pub struct RasterStream {
    raster: Arc<Raster>,
    cursor: usize,
}

impl RasterStream {
    pub fn new(raster: Arc<Raster>) -> Self {
        RasterStream { raster, cursor: 0 }
    }
}

#[async_trait]
impl RowStream for RasterStream {
    async fn column_names(&mut self, job: &Job) -> Fallible<Vec<Column>> {
        job.check()?;
        Ok(self.raster.column_names().to_vec())
    }

    async fn fetch(&mut self, job: &Job) -> Fallible<Fetch> {
        job.check()?;
        let rows = self.raster.rows();
        if self.cursor >= rows.len() {
            return Ok(Fetch::done());
        }
        let end = (self.cursor + BATCH_SIZE).min(rows.len());
        let batch = rows[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(Fetch::new(batch, self.cursor < rows.len()))
    }

    fn clone_stream(&self) -> Box<dyn RowStream> {
        Box::new(RasterStream::new(Arc::clone(&self.raster)))
    }
}
