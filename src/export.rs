//! CSV and JSON rendering of record collections for download.
//!
//! Output is deterministic for identical input: rows keep input order and
//! nothing but the records' own attributes is embedded.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::FieldRecord;

pub const CSV_HEADER: &str = "ID,Field,Value,Location,Timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(Error::Validation(format!(
                "unknown export format '{other}' (expected csv or json)"
            ))),
        }
    }
}

/// Render `records` in the requested format.
pub fn serialize(records: &[FieldRecord], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Csv => Ok(to_csv(records)),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(records)?),
    }
}

/// Parse a JSON export back into records.
pub fn deserialize_json(text: &str) -> Result<Vec<FieldRecord>> {
    Ok(serde_json::from_str(text)?)
}

/// `field_data_YYYY-MM-DD.<ext>`
pub fn export_file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!("field_data_{}.{}", date.format("%Y-%m-%d"), format.extension())
}

/// Write an already-rendered export into `dir` under its dated file name.
pub fn write_export(
    dir: &Path,
    format: ExportFormat,
    date: NaiveDate,
    body: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(format, date));
    std::fs::write(&path, body)?;
    Ok(path)
}

fn to_csv(records: &[FieldRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for r in records {
        let id = r.id.to_string();
        let timestamp = r.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let cells: [&str; 5] = [&id, &r.field, &r.value, &r.location, &timestamp];
        let row = cells.into_iter().map(csv_field).collect::<Vec<_>>().join(",");
        lines.push(row);
    }
    lines.join("\n")
}

/// RFC 4180 quoting: wrap in quotes when the field holds a delimiter,
/// a quote, or a line break; double any embedded quotes.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
