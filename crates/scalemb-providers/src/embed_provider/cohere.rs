//! Cohere `/v1/embed` adapter.
//!
//! `input_type` comes from the run's task and defaults to `classification`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use scalemb_core::{EmbedProvider, Embedding, Error, ProviderConfig, Result};

use super::reject_local_options;
use crate::http::{key_from_env, HttpClient};
use crate::workers::embed_chunks;

pub const NAME: &str = "cohere";
pub const DEFAULT_BASE_URL: &str = "https://api.cohere.com";
pub const API_KEY_VAR: &str = "COHERE_API_KEY";
pub const BATCH_SIZE: usize = 96;
pub const DEFAULT_INPUT_TYPE: &str = "classification";

const INPUT_TYPES: &[&str] = &["search_document", "search_query", "classification", "clustering"];

#[derive(Clone)]
pub struct CohereProvider {
    http: HttpClient,
}

impl CohereProvider {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self { http: HttpClient::new(NAME, api_key, base_url, timeout)? })
    }

    pub fn from_env(base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let key = key_from_env(NAME, API_KEY_VAR)?;
        Self::new(&key, base_url.unwrap_or(DEFAULT_BASE_URL), timeout)
    }
}

impl EmbedProvider for CohereProvider {
    fn name(&self) -> &str { NAME }

    fn embed(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Embedding>> {
        reject_local_options(NAME, config)?;
        if config.dimensions.is_some() {
            return Err(Error::unsupported(NAME, "output dimensions are fixed by the model"));
        }
        let input_type = config.task.as_deref().unwrap_or(DEFAULT_INPUT_TYPE);
        if !INPUT_TYPES.contains(&input_type) {
            return Err(Error::unsupported(NAME, format!("unknown input_type '{input_type}'")));
        }
        embed_chunks(NAME, texts, BATCH_SIZE, |chunk| {
            let request = EmbedRequest { model: &config.model, texts: chunk, input_type };
            let resp: EmbedResponse = self.http.post_json("/v1/embed", &request)?;
            Ok(resp.embeddings)
        })
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}
