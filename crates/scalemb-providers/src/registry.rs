//! Builds adapters on demand and keeps them for the rest of the import.
//!
//! Remote adapters are cached per provider family; local encoders per model,
//! since loading weights is the expensive part.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use scalemb_core::config::{Endpoints, ImportConfig};
use scalemb_core::{EmbedProvider, ProviderConfig, ProviderKind, Result};

use crate::embed_provider::{
    AlephAlphaProvider, CohereProvider, GeckoProvider, HuggingFaceProvider, LocalProvider, MistralProvider,
    OpenAiProvider,
};
use crate::http::DEFAULT_TIMEOUT;

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub timeout: Duration,
    /// Concurrent requests for per-item providers.
    pub workers: usize,
    pub endpoints: Endpoints,
    pub model_dir: Option<PathBuf>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, workers: 1, endpoints: Endpoints::default(), model_dir: None }
    }
}

impl From<&ImportConfig> for ProviderSettings {
    fn from(cfg: &ImportConfig) -> Self {
        Self {
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
            workers: cfg.workers.max(1),
            endpoints: cfg.endpoints.clone(),
            model_dir: cfg.model_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AdapterKey {
    kind: ProviderKind,
    model: Option<String>,
}

impl AdapterKey {
    fn for_config(config: &ProviderConfig) -> Self {
        let model = (config.provider == ProviderKind::Local).then(|| config.model.clone());
        Self { kind: config.provider, model }
    }
}

pub struct ProviderRegistry {
    settings: ProviderSettings,
    adapters: HashMap<AdapterKey, Box<dyn EmbedProvider>>,
}

impl ProviderRegistry {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings, adapters: HashMap::new() }
    }

    /// Returns the adapter serving `config`, building it on first use.
    /// Missing credentials surface here, before any item is sent.
    pub fn get(&mut self, config: &ProviderConfig) -> Result<&dyn EmbedProvider> {
        match self.adapters.entry(AdapterKey::for_config(config)) {
            Entry::Occupied(e) => Ok(&**e.into_mut()),
            Entry::Vacant(v) => {
                let adapter = build(&self.settings, config)?;
                info!(provider = %config.provider, model = %config.model, "provider ready");
                Ok(&**v.insert(adapter))
            }
        }
    }
}

/// Builds a fresh adapter from environment credentials and `settings`.
pub fn build(settings: &ProviderSettings, config: &ProviderConfig) -> Result<Box<dyn EmbedProvider>> {
    let base_url = settings.endpoints.for_provider(config.provider);
    let timeout = settings.timeout;
    let workers = settings.workers;
    Ok(match config.provider {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::from_env(base_url, timeout)?.with_workers(workers)),
        ProviderKind::Mistral => Box::new(MistralProvider::from_env(base_url, timeout)?),
        ProviderKind::Cohere => Box::new(CohereProvider::from_env(base_url, timeout)?),
        ProviderKind::AlephAlpha => Box::new(AlephAlphaProvider::from_env(base_url, timeout)?.with_workers(workers)),
        ProviderKind::HuggingFace => Box::new(HuggingFaceProvider::from_env(base_url, timeout)?.with_workers(workers)),
        ProviderKind::Gecko => Box::new(GeckoProvider::from_env(base_url, timeout)?),
        ProviderKind::Local => Box::new(LocalProvider::load(&config.model, settings.model_dir.as_deref())?),
    })
}
