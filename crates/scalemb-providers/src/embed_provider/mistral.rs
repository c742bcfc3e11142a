//! Mistral embeddings adapter. Same wire shape as OpenAI, sent in batches.

use std::time::Duration;

use scalemb_core::{EmbedProvider, Embedding, Error, ProviderConfig, Result};

use super::openai::{parse_data, EmbeddingRequest, EmbeddingResponse};
use super::reject_local_options;
use crate::http::{key_from_env, HttpClient};
use crate::workers::embed_chunks;

pub const NAME: &str = "mistral";
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const API_KEY_VAR: &str = "MISTRAL_API_KEY";
pub const BATCH_SIZE: usize = 64;

#[derive(Clone)]
pub struct MistralProvider {
    http: HttpClient,
}

impl MistralProvider {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self { http: HttpClient::new(NAME, api_key, base_url, timeout)? })
    }

    pub fn from_env(base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let key = key_from_env(NAME, API_KEY_VAR)?;
        Self::new(&key, base_url.unwrap_or(DEFAULT_BASE_URL), timeout)
    }
}

impl EmbedProvider for MistralProvider {
    fn name(&self) -> &str { NAME }

    fn embed(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Embedding>> {
        reject_local_options(NAME, config)?;
        if config.dimensions.is_some() {
            return Err(Error::unsupported(NAME, "output dimensions are fixed by the model"));
        }
        embed_chunks(NAME, texts, BATCH_SIZE, |chunk| {
            let request = EmbeddingRequest { model: &config.model, input: chunk, dimensions: None };
            let resp: EmbeddingResponse = self.http.post_json("/embeddings", &request)?;
            Ok(parse_data(resp))
        })
    }
}
