//! Domain types shared by the loader, normalizer, providers and sink.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One embedding vector; position matches the input text it was computed from.
pub type Embedding = Vec<f32>;

pub const ITEM_COLUMN: &str = "item";
pub const SCALE_ID_COLUMN: &str = "scaleID";
pub const EMBEDDING_COLUMN: &str = "embedding";

/// In-memory item table: an ordered header plus string rows aligned with it.
///
/// Every row has exactly `columns.len()` cells. Operations that reshape the
/// table return a new value so several runs can share one normalized input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ItemTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(Error::Schema(format!(
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] { &self.columns }

    pub fn rows(&self) -> &[Vec<String>] { &self.rows }

    pub fn len(&self) -> usize { self.rows.len() }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool { self.column_index(name).is_some() }

    /// Cell value by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Returns a copy with `vectors` appended as the `embedding` column.
    ///
    /// Fails with `VectorCountMismatch` if there is not exactly one vector per
    /// row, and with `Schema` if the table already carries embeddings.
    pub fn attach_embeddings(&self, vectors: &[Embedding]) -> Result<Self> {
        if vectors.len() != self.rows.len() {
            return Err(Error::VectorCountMismatch { expected: self.rows.len(), actual: vectors.len() });
        }
        if self.has_column(EMBEDDING_COLUMN) {
            return Err(Error::Schema("table already has an embedding column".to_string()));
        }
        let mut columns = self.columns.clone();
        columns.push(EMBEDDING_COLUMN.to_string());
        let rows = self
            .rows
            .iter()
            .zip(vectors)
            .map(|(row, v)| {
                let mut row = row.clone();
                row.push(crate::codec::format_vector(v));
                row
            })
            .collect();
        Ok(Self { columns, rows })
    }

    pub(crate) fn from_parts_unchecked(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }
}

/// Embedding provider family. Selects the adapter that serves a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    #[serde(rename = "openai", alias = "openAI")]
    OpenAi,
    Mistral,
    Cohere,
    AlephAlpha,
    #[serde(rename = "huggingface", alias = "hf")]
    HuggingFace,
    Gecko,
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Cohere => "cohere",
            ProviderKind::AlephAlpha => "aleph-alpha",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Gecko => "gecko",
            ProviderKind::Local => "local",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "mistral" => Ok(ProviderKind::Mistral),
            "cohere" => Ok(ProviderKind::Cohere),
            "aleph-alpha" | "alephalpha" => Ok(ProviderKind::AlephAlpha),
            "huggingface" | "hf" => Ok(ProviderKind::HuggingFace),
            "gecko" | "vertex" => Ok(ProviderKind::Gecko),
            "local" => Ok(ProviderKind::Local),
            other => Err(Error::InvalidConfig(format!("unknown provider '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    Mean,
    Cls,
}

impl std::str::FromStr for Pooling {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Pooling::Mean),
            "cls" => Ok(Pooling::Cls),
            other => Err(Error::InvalidConfig(format!("unknown pooling '{other}'"))),
        }
    }
}

/// Describes one embedding request.
///
/// - `dimensions`: target size (OpenAI `dimensions`, Aleph Alpha `compress_to_size`)
/// - `pooling`/`layer`: local models only
/// - `task`: Cohere `input_type` or Gecko `task_type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub dimensions: Option<usize>,
    #[serde(default)]
    pub pooling: Option<Pooling>,
    #[serde(default)]
    pub layer: Option<i32>,
    #[serde(default)]
    pub task: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: ProviderKind, model: impl Into<String>) -> Self {
        Self { provider, model: model.into(), dimensions: None, pooling: None, layer: None, task: None }
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_pooling(mut self, pooling: Pooling) -> Self {
        self.pooling = Some(pooling);
        self
    }
}

/// What the sink does when the destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    #[default]
    FailIfExists,
    Overwrite,
}

impl OverwritePolicy {
    pub fn from_flag(overwrite: bool) -> Self {
        if overwrite { OverwritePolicy::Overwrite } else { OverwritePolicy::FailIfExists }
    }
}
