//! OpenAI embeddings adapter.
//!
//! One request per item; line breaks are folded into spaces before sending.
//! Requests fan out over the worker pool, so `workers` bounds concurrency.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use scalemb_core::{EmbedProvider, Embedding, Error, ProviderConfig, Result};

use super::reject_local_options;
use crate::http::{key_from_env, HttpClient};
use crate::workers::embed_each;

pub const NAME: &str = "openai";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Clone)]
pub struct OpenAiProvider {
    http: HttpClient,
    workers: usize,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self { http: HttpClient::new(NAME, api_key, base_url, timeout)?, workers: 1 })
    }

    /// Reads `OPENAI_API_KEY`; `base_url` overrides the public endpoint.
    pub fn from_env(base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let key = key_from_env(NAME, API_KEY_VAR)?;
        Self::new(&key, base_url.unwrap_or(DEFAULT_BASE_URL), timeout)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    fn embed_one(&self, text: &str, config: &ProviderConfig) -> Result<Embedding> {
        let input = [single_line(text)];
        let request = EmbeddingRequest { model: &config.model, input: &input, dimensions: config.dimensions };
        let mut vectors = parse_data(self.http.post_json("/embeddings", &request)?);
        if vectors.len() != 1 {
            return Err(Error::VectorCountMismatch { expected: 1, actual: vectors.len() });
        }
        Ok(vectors.remove(0))
    }
}

impl EmbedProvider for OpenAiProvider {
    fn name(&self) -> &str { NAME }

    fn embed(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Embedding>> {
        reject_local_options(NAME, config)?;
        embed_each(NAME, texts, self.workers, |text| self.embed_one(text, config))
    }
}

pub(crate) fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Request body shared by OpenAI-compatible embedding endpoints.
#[derive(Serialize)]
pub(crate) struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Orders the `data` entries by `index` and drops the envelope.
pub(crate) fn parse_data(mut resp: EmbeddingResponse) -> Vec<Embedding> {
    resp.data.sort_by_key(|d| d.index);
    resp.data.into_iter().map(|d| d.embedding).collect()
}
