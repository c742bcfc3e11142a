#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod codec;
pub mod config;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod sink;
pub mod traits;
pub mod types;

pub use error::{Error, Result, Stage};
pub use traits::EmbedProvider;
pub use types::{Embedding, ItemTable, OverwritePolicy, Pooling, ProviderConfig, ProviderKind};
