//! FILENAME: flow/src/error.rs

use thiserror::Error;

/// Operational failures: the reasons row production can stop early.
///
/// These never describe a bad cell value. A value-level problem (type
/// mismatch, bad argument, division by zero) stays inside the rows as
/// `engine::Value::Invalid`; this channel is for the machinery around the
/// rows failing.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("the job was cancelled")]
    Cancelled,

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("step references form a cycle: {0}")]
    DependencyCycle(String),

    #[error("data source failed: {0}")]
    Source(String),

    #[error("invalid pattern: {0}")]
    Pattern(String),

    #[error("mutation rejected: {0}")]
    Mutation(String),

    #[error("no chain with id {0}")]
    UnknownChain(u32),

    #[error("no step with id {0}")]
    UnknownStep(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    pub fn missing_input(message: impl Into<String>) -> Self {
        FlowError::MissingInput(message.into())
    }

    pub fn source(message: impl Into<String>) -> Self {
        FlowError::Source(message.into())
    }

    pub fn pattern(message: impl Into<String>) -> Self {
        FlowError::Pattern(message.into())
    }

    pub fn mutation(message: impl Into<String>) -> Self {
        FlowError::Mutation(message.into())
    }

    /// True when the failure only means somebody asked the work to stop.
    /// A consumer that sees this lost no data it could have kept;
    /// everything else means the pipeline itself is broken.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, FlowError::Cancelled)
    }
}

/// Result alias used throughout the streaming layers.
pub type Fallible<T> = Result<T, FlowError>;
