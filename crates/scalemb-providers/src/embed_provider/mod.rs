//! Provider adapters. Each one turns item texts into vectors for a single
//! provider family and maps that provider's failures onto the shared error
//! taxonomy. All adapters return exactly one vector per input, in order.

pub mod aleph_alpha;
pub mod cohere;
pub mod gecko;
pub mod huggingface;
pub mod local;
pub mod mistral;
pub mod openai;

pub use aleph_alpha::AlephAlphaProvider;
pub use cohere::CohereProvider;
pub use gecko::GeckoProvider;
pub use huggingface::HuggingFaceProvider;
pub use local::LocalProvider;
pub use mistral::MistralProvider;
pub use openai::OpenAiProvider;
pub use scalemb_core::EmbedProvider;

use scalemb_core::{Error, ProviderConfig, Result};

/// `layer` and `pooling` select hidden states of a local model; a remote
/// provider cannot honor them.
pub(crate) fn reject_local_options(provider: &str, config: &ProviderConfig) -> Result<()> {
    if let Some(layer) = config.layer {
        return Err(Error::unsupported(provider, format!("layer {layer} applies to local models only")));
    }
    if config.pooling.is_some() {
        return Err(Error::unsupported(provider, "pooling applies to local models only"));
    }
    Ok(())
}
