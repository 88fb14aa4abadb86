//! FILENAME: flow/src/data.rs
//! PURPOSE: The dual carrier for tabular data: still streaming, or landed.
//! CONTEXT: Steps that can work row-by-row pass the stream along untouched;
//! steps that need the whole table first (sort, pivot, transpose) land it
//! as a raster. `Data` lets both shapes travel through the same pipeline
//! and converts freely in either direction.

use std::sync::Arc;

use engine::{Column, Raster};

use crate::error::Fallible;
use crate::job::Job;
use crate::stream::{RasterStream, RowStream};

/// Tabular data in one of its two states.
pub enum Data {
    /// Rows not yet produced; pulling drives upstream work.
    Stream(Box<dyn RowStream>),
    /// Rows fully in memory, shared without copying.
    Raster(Arc<Raster>),
}

impl Data {
    pub fn from_raster(raster: Raster) -> Self {
        Data::Raster(Arc::new(raster))
    }

    pub fn from_stream(stream: Box<dyn RowStream>) -> Self {
        Data::Stream(stream)
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self, Data::Raster(_))
    }

    /// The schema, without producing any rows.
    pub async fn column_names(&mut self, job: &Job) -> Fallible<Vec<Column>> {
        match self {
            Data::Stream(stream) => stream.column_names(job).await,
            Data::Raster(raster) => {
                job.check()?;
                Ok(raster.column_names().to_vec())
            }
        }
    }

    /// Turns either state into a stream. A raster becomes a stream over its
    /// rows; an existing stream passes through untouched.
    pub fn into_stream(self) -> Box<dyn RowStream> {
        match self {
            Data::Stream(stream) => stream,
            Data::Raster(raster) => Box::new(RasterStream::new(raster)),
        }
    }

    /// The raster, if already landed.
    pub fn as_raster(&self) -> Option<&Arc<Raster>> {
        match self {
            Data::Raster(raster) => Some(raster),
            Data::Stream(_) => None,
        }
    }
}

impl Clone for Data {
    fn clone(&self) -> Self {
        match self {
            Data::Stream(stream) => Data::Stream(stream.clone_stream()),
            Data::Raster(raster) => Data::Raster(Arc::clone(raster)),
        }
    }
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Data::Stream(_) => f.write_str("Data::Stream"),
            Data::Raster(raster) => f
                .debug_struct("Data::Raster")
                .field("rows", &raster.row_count())
                .field("columns", &raster.column_count())
                .finish(),
        }
    }
}
