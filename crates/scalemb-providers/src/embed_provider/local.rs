//! In-process provider backed by `scalemb-embed`.
//!
//! Respects `APP_USE_FAKE_EMBEDDINGS=1` to switch to the hashed fake encoder
//! for fast and deterministic outputs in tests and development.

use std::path::Path;

use tracing::info;

use scalemb_core::{EmbedProvider, Embedding, Error, Pooling, ProviderConfig, Result};
use scalemb_embed::{load_encoder, TextEncoder};

pub const NAME: &str = "local";

pub struct LocalProvider {
    inner: Box<dyn TextEncoder>,
    id: String,
}

impl LocalProvider {
    /// Loads `model` from a directory, or by name under `model_root`.
    pub fn load(model: &str, model_root: Option<&Path>) -> Result<Self> {
        let inner = load_encoder(model, model_root).map_err(|e| Error::ModelLoad(format!("{model}: {e:#}")))?;
        let provider = Self::from_encoder(inner);
        info!(model, id = provider.embedder_id(), "local encoder ready");
        Ok(provider)
    }

    pub fn from_encoder(inner: Box<dyn TextEncoder>) -> Self {
        let id = format!("local:{}:d{}", inner.id(), inner.dim());
        Self { inner, id }
    }

    /// Stable identifier of the loaded encoder, e.g. `local:fake:d1024`.
    pub fn embedder_id(&self) -> &str { &self.id }

    pub fn dim(&self) -> usize { self.inner.dim() }

    fn check(&self, config: &ProviderConfig) -> Result<()> {
        if let Some(layer) = config.layer {
            if layer != -1 {
                return Err(Error::unsupported(NAME, format!("only the last hidden layer (-1) is available, got {layer}")));
            }
        }
        if let Some(d) = config.dimensions {
            if d != self.inner.dim() {
                return Err(Error::unsupported(
                    NAME,
                    format!("model produces {} dimensions, {d} requested", self.inner.dim()),
                ));
            }
        }
        Ok(())
    }
}

impl EmbedProvider for LocalProvider {
    fn name(&self) -> &str { NAME }

    fn embed(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Embedding>> {
        self.check(config)?;
        let pooling = config.pooling.unwrap_or(Pooling::Mean);
        self.inner
            .embed_batch(texts, pooling)
            .map_err(|e| Error::unavailable(NAME, format!("{e:#}")))
    }
}
