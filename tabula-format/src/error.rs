//! FILENAME: tabula-format/src/error.rs

use thiserror::Error;

/// Decode-side failures of the record format.
///
/// Encoding from live objects only fails through the JSON layer; every
/// other variant describes a record that a reader refuses to interpret.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("record field \"{0}\" is missing")]
    MissingField(String),

    #[error("record field \"{field}\" should hold {expected}, not {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown step kind \"{0}\"")]
    UnknownKind(String),

    #[error("record version {0} is newer than this reader understands")]
    Version(u32),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("JSON interchange failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl FormatError {
    pub fn missing_field(name: impl Into<String>) -> Self {
        FormatError::MissingField(name.into())
    }

    pub fn wrong_type(field: impl Into<String>, expected: &'static str, found: &'static str) -> Self {
        FormatError::WrongType {
            field: field.into(),
            expected,
            found,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        FormatError::Malformed(message.into())
    }
}
