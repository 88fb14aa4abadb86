//! FILENAME: engine/src/column.rs
//! PURPOSE: Named column handles and the duplicate-name disambiguation rule.
//! CONTEXT: Every stream and raster carries a `Vec<Column>` schema. Rows are
//! positional; columns give the positions names. Operations that introduce
//! columns must keep names unique, which they do by suffix numbering
//! ("name", "name 2", "name 3", ...).

use serde::{Deserialize, Serialize};

/// A column name. Equality and ordering are plain string semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Column {
    name: String,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Column { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::new(name)
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Column::new(name)
    }
}

/// Finds the position of `name` in a schema.
pub fn column_index(columns: &[Column], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.name() == name)
}

/// Returns `wanted` if no column in `existing` already carries that name,
/// otherwise the first free suffixed variant ("wanted 2", "wanted 3", ...).
pub fn disambiguate(existing: &[Column], wanted: &str) -> Column {
    if column_index(existing, wanted).is_none() {
        return Column::new(wanted);
    }
    let mut counter = 2u32;
    loop {
        let candidate = format!("{} {}", wanted, counter);
        if column_index(existing, &candidate).is_none() {
            return Column::new(candidate);
        }
        counter += 1;
    }
}

/// Builds a schema from raw names, disambiguating duplicates left to right.
/// The first occurrence keeps its plain name; later occurrences are suffixed.
pub fn unique_schema(names: impl IntoIterator<Item = String>) -> Vec<Column> {
    let mut schema: Vec<Column> = Vec::new();
    for name in names {
        let column = disambiguate(&schema, &name);
        schema.push(column);
    }
    schema
}
