use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Load,
    Normalize,
    Embed,
    Write,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Config => "config",
            Stage::Load => "load",
            Stage::Normalize => "normalize",
            Stage::Embed => "embed",
            Stage::Write => "write",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Cannot parse {}: {reason}", path.display())]
    SourceFormat { path: PathBuf, reason: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("{provider}: authentication failed: {reason}")]
    Authentication { provider: String, reason: String },

    #[error("{provider}: provider unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("{provider}: unsupported configuration: {reason}")]
    UnsupportedConfig { provider: String, reason: String },

    #[error("{provider}: rate limited: {reason}")]
    RateLimited { provider: String, reason: String },

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Provider returned {actual} vectors for {expected} texts")]
    VectorCountMismatch { expected: usize, actual: usize },

    #[error("Cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Error::InvalidConfig(_) => Stage::Config,
            Error::SourceNotFound(_) | Error::SourceFormat { .. } => Stage::Load,
            Error::Schema(_) => Stage::Normalize,
            Error::Authentication { .. }
            | Error::ProviderUnavailable { .. }
            | Error::UnsupportedConfig { .. }
            | Error::RateLimited { .. }
            | Error::ModelLoad(_)
            | Error::VectorCountMismatch { .. } => Stage::Embed,
            Error::DestinationExists(_) | Error::Io { .. } => Stage::Write,
        }
    }

    pub fn unsupported(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnsupportedConfig { provider: provider.into(), reason: reason.into() }
    }

    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ProviderUnavailable { provider: provider.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
