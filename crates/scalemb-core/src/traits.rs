use crate::error::Result;
use crate::types::{Embedding, ProviderConfig};

/// Maps texts to embeddings through one provider.
///
/// Implementations return exactly one vector per input text, in input order,
/// and translate their provider's response shape at this boundary. Any
/// chunking a provider's request limits require happens inside `embed`.
pub trait EmbedProvider: Send + Sync {
    /// Stable name used in logs and error messages (e.g. `openai`).
    fn name(&self) -> &str;
    fn embed(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Embedding>>;
}

impl<P: EmbedProvider + ?Sized> EmbedProvider for Box<P> {
    fn name(&self) -> &str { (**self).name() }
    fn embed(&self, texts: &[String], config: &ProviderConfig) -> Result<Vec<Embedding>> {
        (**self).embed(texts, config)
    }
}
