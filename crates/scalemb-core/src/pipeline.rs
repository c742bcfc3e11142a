//! Embedding import pipeline: normalized table -> provider -> sink.
//!
//! A run checks the destination before calling the provider so an existing
//! artifact costs no provider calls, embeds the `item` column in one
//! provider call, verifies one vector came back per row and hands the
//! extended table to the sink. Nothing is written unless every vector was
//! obtained.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use crate::error::{Error, Result};
use crate::traits::EmbedProvider;
use crate::sink;
use crate::types::{Embedding, ItemTable, OverwritePolicy, ProviderConfig, ITEM_COLUMN};

/// One provider configuration and the artifact it produces.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub config: ProviderConfig,
    pub destination: PathBuf,
    pub policy: OverwritePolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub destination: PathBuf,
    pub rows: usize,
    /// Length of the first vector, 0 for an empty table.
    pub dimension: usize,
}

/// Embeds the `item` column of a normalized table, one vector per row.
pub fn embed_items(table: &ItemTable, provider: &dyn EmbedProvider, config: &ProviderConfig) -> Result<Vec<Embedding>> {
    let texts: Vec<String> = table
        .column_values(ITEM_COLUMN)
        .ok_or_else(|| Error::Schema(format!("missing '{ITEM_COLUMN}' column; normalize the table first")))?
        .into_iter()
        .map(str::to_string)
        .collect();
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let vectors = provider.embed(&texts, config)?;
    if vectors.len() != texts.len() {
        return Err(Error::VectorCountMismatch { expected: texts.len(), actual: vectors.len() });
    }
    Ok(vectors)
}

/// [`embed_items`] followed by appending the `embedding` column.
pub fn embed_table(table: &ItemTable, provider: &dyn EmbedProvider, config: &ProviderConfig) -> Result<ItemTable> {
    let vectors = embed_items(table, provider, config)?;
    table.attach_embeddings(&vectors)
}

pub struct ImportPipeline<'a> {
    provider: &'a dyn EmbedProvider,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(provider: &'a dyn EmbedProvider) -> Self { Self { provider } }

    pub fn run(&self, table: &ItemTable, request: &RunRequest) -> Result<RunReport> {
        let dest: &Path = &request.destination;
        sink::check_destination(dest, request.policy)?;

        let start = Instant::now();
        info!(
            provider = self.provider.name(),
            model = %request.config.model,
            rows = table.len(),
            dest = %dest.display(),
            "embedding items"
        );
        let vectors = embed_items(table, self.provider, &request.config)?;
        let dimension = vectors.first().map_or(0, Vec::len);
        let embedded = table.attach_embeddings(&vectors)?;
        sink::write(&embedded, dest, request.policy)?;
        info!(elapsed_ms = start.elapsed().as_millis() as u64, dimension, "run complete");

        Ok(RunReport { destination: dest.to_path_buf(), rows: embedded.len(), dimension })
    }

    /// Runs every request against the same normalized table, stopping at the first error.
    pub fn run_all(&self, table: &ItemTable, requests: &[RunRequest]) -> Result<Vec<RunReport>> {
        requests.iter().map(|r| self.run(table, r)).collect()
    }
}
