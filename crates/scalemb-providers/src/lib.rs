#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod embed_provider;
mod http;
pub mod registry;
pub mod workers;

pub use embed_provider::{
    AlephAlphaProvider, CohereProvider, GeckoProvider, HuggingFaceProvider, LocalProvider, MistralProvider,
    OpenAiProvider,
};
pub use http::DEFAULT_TIMEOUT;
pub use registry::{build, ProviderRegistry, ProviderSettings};
