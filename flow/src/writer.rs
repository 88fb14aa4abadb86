//! FILENAME: flow/src/writer.rs
//! PURPOSE: Pluggable table export: writers, locales and the registry.
//! CONTEXT: A writer takes Data, a destination locator and a locale, drains
//! the rows and reports one terminal result. Formatting is locale-sensitive
//! in exactly two places (the decimal separator and the list separator), so
//! `Locale` carries exactly those. The registry maps file extensions to
//! writers so callers never hardcode a format.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use engine::{Raster, Value};

use crate::data::Data;
use crate::error::Fallible;
use crate::job::Job;

// ============================================================================
// Locale
// ============================================================================

/// Languages whose convention is a decimal comma. Primary subtags only.
const COMMA_DECIMAL_LANGUAGES: &[&str] = &[
    "bg", "cs", "da", "de", "el", "es", "fi", "fr", "hr", "hu", "id", "it", "lt",
    "lv", "nb", "nl", "nn", "no", "pl", "pt", "ro", "ru", "sk", "sl", "sr", "sv",
    "tr", "uk", "vi",
];

/// The two separators that vary between writing conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub decimal_separator: char,
    pub list_separator: char,
}

impl Locale {
    /// Decimal point, comma-separated lists.
    pub fn standard() -> Self {
        Locale { decimal_separator: '.', list_separator: ',' }
    }

    /// Decimal comma, semicolon-separated lists.
    pub fn continental() -> Self {
        Locale { decimal_separator: ',', list_separator: ';' }
    }

    /// Picks a convention from the operating system locale, falling back to
    /// `standard` when none is reported.
    pub fn system() -> Self {
        match sys_locale::get_locale() {
            Some(tag) => Locale::from_language_tag(&tag),
            None => Locale::standard(),
        }
    }

    fn from_language_tag(tag: &str) -> Self {
        let language = tag
            .split(|c| c == '-' || c == '_')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if COMMA_DECIMAL_LANGUAGES.contains(&language.as_str()) {
            Locale::continental()
        } else {
            Locale::standard()
        }
    }

    /// Formats one value under this locale. Only doubles are affected; all
    /// other values use their plain display text.
    pub fn format(&self, value: &Value) -> String {
        let text = value.display();
        match value {
            Value::Double(_) if self.decimal_separator != '.' => {
                text.replace('.', &self.decimal_separator.to_string())
            }
            _ => text,
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::standard()
    }
}

// ============================================================================
// Writers
// ============================================================================

/// Serializes tabular data to a destination. The writer drains the data
/// itself, batch by batch, so exports stay streaming and cancellable; a
/// cancelled job surfaces as an error before the next batch is written.
#[async_trait]
pub trait TableWriter: Send + Sync {
    /// Human-readable format name, e.g. "delimited text".
    fn format_name(&self) -> &'static str;

    /// The file extension this writer serves, without the dot.
    fn file_extension(&self) -> &'static str;

    /// Drains `data` and writes it to `destination` (a path for the file
    /// writers). One terminal result: either everything was written and
    /// flushed, or the destination should be considered garbage.
    async fn write(
        &self,
        data: Data,
        destination: &str,
        locale: &Locale,
        job: &Job,
    ) -> Fallible<()>;
}

/// Plain delimited text with a header row. The delimiter is the locale's
/// list separator, which keeps decimal commas and field commas from
/// colliding in continental output.
pub struct DelimitedWriter;

impl DelimitedWriter {
    fn quote(field: &str, delimiter: char) -> String {
        if field.contains(delimiter)
            || field.contains('"')
            || field.contains('\n')
            || field.contains('\r')
        {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn write_line(
        out: &mut dyn Write,
        fields: impl Iterator<Item = String>,
        delimiter: char,
    ) -> std::io::Result<()> {
        let mut line = String::new();
        for (i, field) in fields.enumerate() {
            if i > 0 {
                line.push(delimiter);
            }
            line.push_str(&Self::quote(&field, delimiter));
        }
        line.push('\n');
        out.write_all(line.as_bytes())
    }

    /// Renders an already-landed raster to any byte sink. The async `write`
    /// path streams instead; this entry point serves previews and tests.
    pub fn render(
        &self,
        raster: &Raster,
        locale: &Locale,
        job: &Job,
        out: &mut dyn Write,
    ) -> Fallible<()> {
        let delimiter = locale.list_separator;
        Self::write_line(
            out,
            raster.column_names().iter().map(|c| c.name().to_string()),
            delimiter,
        )?;
        for (index, row) in raster.rows().iter().enumerate() {
            if index % crate::stream::BATCH_SIZE == 0 {
                job.check()?;
            }
            Self::write_line(out, row.iter().map(|v| locale.format(v)), delimiter)?;
        }
        out.flush()?;
        Ok(())
    }
}

#[async_trait]
impl TableWriter for DelimitedWriter {
    fn format_name(&self) -> &'static str {
        "delimited text"
    }

    fn file_extension(&self) -> &'static str {
        "csv"
    }

    async fn write(
        &self,
        data: Data,
        destination: &str,
        locale: &Locale,
        job: &Job,
    ) -> Fallible<()> {
        let delimiter = locale.list_separator;
        let mut stream = data.into_stream();
        let columns = stream.column_names(job).await?;

        let file = std::fs::File::create(destination)?;
        let mut out = std::io::BufWriter::new(file);
        Self::write_line(
            &mut out,
            columns.iter().map(|c| c.name().to_string()),
            delimiter,
        )?;

        loop {
            job.check()?;
            let fetch = stream.fetch(job).await?;
            for row in &fetch.rows {
                Self::write_line(&mut out, row.iter().map(|v| locale.format(v)), delimiter)?;
            }
            if !fetch.has_more {
                break;
            }
        }
        out.flush()?;
        Ok(())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Holds the known writers and finds them by file extension. Built once at
/// startup and passed into export call sites.
#[derive(Clone, Default)]
pub struct WriterRegistry {
    writers: Vec<Arc<dyn TableWriter>>,
}

impl WriterRegistry {
    pub fn new() -> Self {
        WriterRegistry::default()
    }

    /// A registry preloaded with the built-in writers.
    pub fn with_defaults() -> Self {
        let mut registry = WriterRegistry::new();
        registry.register(Arc::new(DelimitedWriter));
        registry
    }

    /// Registers a writer. A later registration for the same extension
    /// shadows the earlier one.
    pub fn register(&mut self, writer: Arc<dyn TableWriter>) {
        self.writers.push(writer);
    }

    pub fn by_extension(&self, extension: &str) -> Option<Arc<dyn TableWriter>> {
        let wanted = extension.trim_start_matches('.');
        self.writers
            .iter()
            .rev()
            .find(|w| w.file_extension().eq_ignore_ascii_case(wanted))
            .cloned()
    }

    pub fn format_names(&self) -> Vec<&'static str> {
        self.writers.iter().map(|w| w.format_name()).collect()
    }
}
