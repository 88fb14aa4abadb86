//! FILENAME: tabula-format/src/lib.rs
//! PURPOSE: Main library entry point for the native record format.
//! CONTEXT: Chains and workspaces persist as versioned key-value records
//! that serialize to plain JSON. The record layer is deliberately loose,
//! a tree of fields any reader can walk, so old builds can skip material
//! they do not understand while the codec refuses records newer than the
//! layout it knows.

pub mod codec;
pub mod error;
pub mod record;

// Re-export commonly used types at the crate root
pub use codec::{
    decode_chain, decode_expression, decode_step_kind, decode_workspace, encode_chain,
    encode_expression, encode_step_kind, encode_workspace, FORMAT_VERSION,
};
pub use error::FormatError;
pub use record::{Field, Record};
