//! Hugging Face Inference API adapter (feature-extraction pipeline).
//!
//! Sentence-transformer models answer with a pooled `[f32]`; some deployments
//! wrap it as `[[f32]]`. Token-level output is rejected.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use scalemb_core::{EmbedProvider, Embedding, Error, ProviderConfig, Result};

use super::reject_local_options;
use crate::http::{key_from_env, HttpClient};
use crate::workers::embed_each;

pub const NAME: &str = "huggingface";
pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const API_KEY_VAR: &str = "HF_API_KEY";

#[derive(Clone)]
pub struct HuggingFaceProvider {
    http: HttpClient,
    workers: usize,
}

impl HuggingFaceProvider {
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

impl EmbedProvider for HuggingFaceProvider {
    fn name(&self) -> &str { NAME }

    fn embed(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Embedding>> {
        reject_local_options(NAME, config)?;
        if config.dimensions.is_some() {
            return Err(Error::unsupported(NAME, "output dimensions are fixed by the model"));
        }
        let path = format!("/models/{}", config.model.trim_matches('/'));
        embed_each(NAME, texts, self.workers, |text| {
            let resp: FeatureResponse = self.http.post_json(&path, &FeatureRequest { inputs: text })?;
            resp.into_embedding()
        })
    }
}

#[derive(Serialize)]
struct FeatureRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureResponse {
    Flat(Vec<f32>),
    Nested(Vec<Vec<f32>>),
}

impl FeatureResponse {
    fn into_embedding(self) -> Result<Embedding> {
        match self {
            FeatureResponse::Flat(v) => Ok(v),
            FeatureResponse::Nested(mut rows) if rows.len() == 1 => Ok(rows.remove(0)),
            FeatureResponse::Nested(rows) => Err(Error::unsupported(
                NAME,
                format!("model returned {} token vectors instead of one sentence vector", rows.len()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_flat_and_single_nested() {
        let flat: FeatureResponse = serde_json::from_str("[0.5, 0.25]").unwrap();
        assert_eq!(flat.into_embedding().unwrap(), vec![0.5, 0.25]);
        let nested: FeatureResponse = serde_json::from_str("[[0.5, 0.25]]").unwrap();
        assert_eq!(nested.into_embedding().unwrap(), vec![0.5, 0.25]);
        let tokens: FeatureResponse = serde_json::from_str("[[0.5], [0.25]]").unwrap();
        assert!(tokens.into_embedding().is_err());
    }
}
