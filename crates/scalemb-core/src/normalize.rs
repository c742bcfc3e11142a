//! Schema Normalizer: language column selection, scale filtering and column drops.
//!
//! `item_<lang>` becomes the canonical `item` column and the sibling
//! language columns (`item_<code>` for the source's languages) are dropped.
//! Other `item_*` columns such as `item_id` are ordinary passthrough columns.
//! A table that is already normalized (one `item`, no language columns)
//! passes through, so written artifacts can be reloaded.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{ItemTable, ITEM_COLUMN, SCALE_ID_COLUMN};

const ITEM_PREFIX: &str = "item_";

/// Language codes of the item columns in the scale source.
pub const DEFAULT_LANGUAGES: &[&str] = &["de", "en"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub language: String,
    /// Codes whose `item_<code>` columns are translations of the item text.
    pub languages: BTreeSet<String>,
    /// `None` or an empty set keeps every row.
    pub keep_scale_ids: Option<BTreeSet<String>>,
    pub drop_columns: Vec<String>,
}

impl NormalizeOptions {
    pub fn new(language: impl Into<String>) -> Self {
        let languages = DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect();
        Self { language: language.into(), languages, ..Self::default() }
    }

    /// Replaces the source language codes; an empty list keeps the defaults.
    pub fn languages<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: BTreeSet<String> = codes.into_iter().map(Into::into).collect();
        if !codes.is_empty() {
            self.languages = codes;
        }
        self
    }

    pub fn keep_scales<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keep_scale_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn drop_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drop_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// True for `item_<code>` where `code` is the selected or a source language.
    pub fn is_language_column(&self, name: &str) -> bool {
        name.strip_prefix(ITEM_PREFIX)
            .is_some_and(|code| code == self.language.trim() || self.languages.contains(code))
    }
}

pub fn normalize(table: &ItemTable, options: &NormalizeOptions) -> Result<ItemTable> {
    let language = options.language.trim();
    if language.is_empty() {
        return Err(Error::Schema("language must not be empty".to_string()));
    }
    let scale_idx = table
        .column_index(SCALE_ID_COLUMN)
        .ok_or_else(|| Error::Schema(format!("missing '{SCALE_ID_COLUMN}' column")))?;
    for protected in [ITEM_COLUMN, SCALE_ID_COLUMN] {
        if options.drop_columns.iter().any(|c| c == protected) {
            return Err(Error::Schema(format!("column '{protected}' cannot be dropped")));
        }
    }

    let selected = format!("{ITEM_PREFIX}{language}");
    let has_selected = table.has_column(&selected);
    let has_item = table.has_column(ITEM_COLUMN);
    let language_columns: Vec<&str> =
        table.columns().iter().map(String::as_str).filter(|c| options.is_language_column(c)).collect();
    match (has_selected, has_item) {
        (true, true) => {
            return Err(Error::Schema(format!("both '{ITEM_COLUMN}' and '{selected}' are present")));
        }
        (false, true) if !language_columns.is_empty() => {
            return Err(Error::Schema(format!("no '{selected}' column next to {language_columns:?}")));
        }
        (false, false) => {
            return Err(Error::Schema(format!("no item column for language '{language}'")));
        }
        _ => {}
    }

    // (source index, output name) for every column that survives.
    let mut plan: Vec<(usize, String)> = Vec::new();
    for (idx, name) in table.columns().iter().enumerate() {
        if name == &selected {
            plan.push((idx, ITEM_COLUMN.to_string()));
        } else if options.is_language_column(name) || options.drop_columns.iter().any(|d| d == name) {
            continue;
        } else {
            plan.push((idx, name.clone()));
        }
    }

    let keep = options.keep_scale_ids.as_ref().filter(|set| !set.is_empty());
    let rows: Vec<Vec<String>> = table
        .rows()
        .iter()
        .filter(|row| keep.map_or(true, |set| set.contains(&row[scale_idx])))
        .map(|row| plan.iter().map(|(idx, _)| row[*idx].clone()).collect())
        .collect();
    let columns = plan.into_iter().map(|(_, name)| name).collect();

    debug!(language, kept = rows.len(), dropped = table.len() - rows.len(), "normalized table");
    Ok(ItemTable::from_parts_unchecked(columns, rows))
}
