//! Vertex AI text-embedding (Gecko) adapter.
//!
//! Authenticates with a pre-issued OAuth access token; minting tokens from
//! service-account keys is left to `gcloud auth print-access-token`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use scalemb_core::{EmbedProvider, Embedding, Error, ProviderConfig, Result};

use super::reject_local_options;
use crate::http::{key_from_env, HttpClient};
use crate::workers::embed_chunks;

pub const NAME: &str = "gecko";
pub const TOKEN_VAR: &str = "GOOGLE_ACCESS_TOKEN";
pub const PROJECT_VAR: &str = "GOOGLE_CLOUD_PROJECT";
pub const LOCATION_VAR: &str = "GOOGLE_CLOUD_LOCATION";
pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_TASK: &str = "SEMANTIC_SIMILARITY";
pub const BATCH_SIZE: usize = 5;

#[derive(Clone)]
pub struct GeckoProvider {
    http: HttpClient,
    project: String,
    location: String,
}

impl GeckoProvider {
    pub fn new(token: &str, project: &str, location: &str, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        if project.trim().is_empty() {
            return Err(Error::InvalidConfig(format!("{NAME}: project id is empty")));
        }
        let default_url = format!("https://{location}-aiplatform.googleapis.com");
        let http = HttpClient::new(NAME, token, base_url.unwrap_or(&default_url), timeout)?;
        Ok(Self { http, project: project.trim().to_string(), location: location.to_string() })
    }

    /// Reads the token, project and location (default `us-central1`) from the environment.
    pub fn from_env(base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let token = key_from_env(NAME, TOKEN_VAR)?;
        let project = std::env::var(PROJECT_VAR)
            .map_err(|_| Error::InvalidConfig(format!("{NAME}: {PROJECT_VAR} is not set")))?;
        let location = std::env::var(LOCATION_VAR)
            .ok()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        Self::new(&token, &project, &location, base_url, timeout)
    }

    fn predict_path(&self, model: &str) -> String {
        format!(
            "/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            self.project, self.location, model
        )
    }
}

impl EmbedProvider for GeckoProvider {
    fn name(&self) -> &str { NAME }

    fn embed(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Embedding>> {
        reject_local_options(NAME, config)?;
        let path = self.predict_path(&config.model);
        let task_type = config.task.as_deref().unwrap_or(DEFAULT_TASK);
        let parameters = config.dimensions.map(|d| Parameters { output_dimensionality: d });
        embed_chunks(NAME, texts, BATCH_SIZE, |chunk| {
            let instances = chunk.iter().map(|t| Instance { content: t, task_type }).collect();
            let request = PredictRequest { instances, parameters: parameters.as_ref() };
            let resp: PredictResponse = self.http.post_json(&path, &request)?;
            Ok(resp.predictions.into_iter().map(|p| p.embeddings.values).collect())
        })
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: Vec<Instance<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a Parameters>,
}

#[derive(Serialize)]
struct Instance<'a> {
    content: &'a str,
    task_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters {
    output_dimensionality: usize,
}

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
struct Prediction {
    embeddings: PredictionEmbeddings,
}

#[derive(Deserialize)]
struct PredictionEmbeddings {
    values: Vec<f32>,
}
