//! Source Loader: reads the item CSV into an [`ItemTable`].

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::types::ItemTable;

/// Text encoding of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceEncoding {
    /// Strict UTF-8; invalid bytes are a format error.
    #[default]
    Utf8,
    /// ISO-8859-1, every byte maps to one code point. Never fails.
    #[serde(alias = "latin-1", alias = "iso-8859-1")]
    Latin1,
    /// UTF-8 with invalid sequences replaced by U+FFFD.
    Utf8Lossy,
}

impl std::str::FromStr for SourceEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(SourceEncoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(SourceEncoding::Latin1),
            "utf8-lossy" | "lossy" => Ok(SourceEncoding::Utf8Lossy),
            other => Err(Error::InvalidConfig(format!("unknown encoding '{other}'"))),
        }
    }
}

pub fn load(path: &Path, encoding: SourceEncoding) -> Result<ItemTable> {
    if !path.exists() {
        return Err(Error::SourceNotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|e| format_err(path, e.to_string()))?;
    let text = decode(&bytes, encoding).map_err(|reason| format_err(path, reason))?;
    let table = parse_csv(&text).map_err(|reason| format_err(path, reason))?;
    info!(path = %path.display(), rows = table.len(), columns = table.columns().len(), "loaded source table");
    Ok(table)
}

fn format_err(path: &Path, reason: String) -> Error {
    Error::SourceFormat { path: path.to_path_buf(), reason }
}

fn decode(bytes: &[u8], encoding: SourceEncoding) -> std::result::Result<String, String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding {
        SourceEncoding::Utf8 => String::from_utf8(bytes.to_vec())
            .map_err(|e| format!("invalid UTF-8 at byte {}", e.utf8_error().valid_up_to())),
        SourceEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        SourceEncoding::Utf8Lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn parse_csv(text: &str) -> std::result::Result<ItemTable, String> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(text.as_bytes());
    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    if headers.is_empty() {
        return Err("missing header row".to_string());
    }
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(headers.len());
    for name in headers.iter() {
        let name = name.trim();
        if name.is_empty() {
            return Err("empty column name in header".to_string());
        }
        if !seen.insert(name.to_string()) {
            return Err(format!("duplicate column '{name}'"));
        }
        columns.push(name.to_string());
    }
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(ItemTable::from_parts_unchecked(columns, rows))
}
