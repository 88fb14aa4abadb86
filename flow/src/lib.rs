//! FILENAME: flow/src/lib.rs
//! PURPOSE: Main library entry point for the streaming and concurrency layer.
//! CONTEXT: Re-exports the job model, the pull-based row streams, the dual
//! stream/raster data carrier, budgeted materialization and table export.

pub mod data;
pub mod error;
pub mod job;
pub mod materialize;
pub mod stream;
pub mod writer;

// Re-export commonly used types at the crate root
pub use data::Data;
pub use error::{Fallible, FlowError};
pub use job::{Job, Urgency};
pub use materialize::{drain, materialize, DrainBudget};
pub use stream::{Fetch, RasterStream, RowStream, BATCH_SIZE};
pub use writer::{DelimitedWriter, Locale, TableWriter, WriterRegistry};
