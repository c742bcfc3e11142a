//! Aleph Alpha `/semantic_embed` adapter.
//!
//! The API only compresses to 128 dimensions, so any other requested size is
//! refused before a request is made. The run's task selects the
//! representation (`symmetric`, `document` or `query`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use scalemb_core::{EmbedProvider, Embedding, Error, ProviderConfig, Result};

use super::reject_local_options;
use crate::http::{key_from_env, HttpClient};
use crate::workers::embed_each;

pub const NAME: &str = "aleph-alpha";
pub const DEFAULT_BASE_URL: &str = "https://api.aleph-alpha.com";
pub const API_KEY_VAR: &str = "ALEPHALPHA_API_TOKEN";
pub const COMPRESSED_SIZE: usize = 128;

const REPRESENTATIONS: &[&str] = &["symmetric", "document", "query"];

#[derive(Clone)]
pub struct AlephAlphaProvider {
    http: HttpClient,
    workers: usize,
}

impl AlephAlphaProvider {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self { http: HttpClient::new(NAME, api_key, base_url, timeout)?, workers: 1 })
    }

    pub fn from_env(base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let key = key_from_env(NAME, API_KEY_VAR)?;
        Self::new(&key, base_url.unwrap_or(DEFAULT_BASE_URL), timeout)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Validates the run against what the endpoint accepts.
fn request_shape(config: &ProviderConfig) -> Result<(&str, Option<usize>)> {
    let compress_to_size = match config.dimensions {
        None => None,
        Some(COMPRESSED_SIZE) => Some(COMPRESSED_SIZE),
        Some(d) => {
            return Err(Error::unsupported(NAME, format!("dimensions must be {COMPRESSED_SIZE} or unset, got {d}")));
        }
    };
    let representation = config.task.as_deref().unwrap_or("symmetric");
    if !REPRESENTATIONS.contains(&representation) {
        return Err(Error::unsupported(NAME, format!("unknown representation '{representation}'")));
    }
    Ok((representation, compress_to_size))
}

impl EmbedProvider for AlephAlphaProvider {
    fn name(&self) -> &str { NAME }

    fn embed(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Embedding>> {
        reject_local_options(NAME, config)?;
        let (representation, compress_to_size) = request_shape(config)?;
        embed_each(NAME, texts, self.workers, |text| {
            let request = SemanticEmbedRequest { model: &config.model, prompt: text, representation, compress_to_size };
            let resp: SemanticEmbedResponse = self.http.post_json("/semantic_embed", &request)?;
            Ok(resp.embedding)
        })
    }
}

#[derive(Serialize)]
struct SemanticEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    representation: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    compress_to_size: Option<usize>,
}

#[derive(Deserialize)]
struct SemanticEmbedResponse {
    embedding: Vec<f32>,
}
