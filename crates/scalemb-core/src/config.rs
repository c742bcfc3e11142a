//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::loader::SourceEncoding;
use crate::normalize::NormalizeOptions;
use crate::types::{OverwritePolicy, Pooling, ProviderConfig, ProviderKind};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Loads `config.toml` from the working directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Loads `path`, then `config.<env>.toml` from the same directory, then `APP_*`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let base_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut figment = Figment::new().merge(Toml::file(path));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir })
    }

    pub fn from_figment(figment: Figment, base_dir: impl Into<PathBuf>) -> Self {
        Self { figment, base_dir: base_dir.into() }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extracts and validates the import registry, resolving paths against
    /// the directory of the config file.
    pub fn import(&self) -> Result<ImportConfig> {
        let mut cfg: ImportConfig = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        cfg.source.path = resolve_with_base(&self.base_dir, cfg.source.path.to_string_lossy());
        cfg.output_dir = resolve_with_base(&self.base_dir, cfg.output_dir.to_string_lossy());
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub encoding: SourceEncoding,
    /// Language codes of the `item_<code>` columns; empty means `de` and `en`.
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Base URL overrides, mainly for proxies and tests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Endpoints {
    pub openai: Option<String>,
    pub mistral: Option<String>,
    pub cohere: Option<String>,
    pub aleph_alpha: Option<String>,
    pub huggingface: Option<String>,
    pub gecko: Option<String>,
}

impl Endpoints {
    pub fn for_provider(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::OpenAi => self.openai.as_deref(),
            ProviderKind::Mistral => self.mistral.as_deref(),
            ProviderKind::Cohere => self.cohere.as_deref(),
            ProviderKind::AlephAlpha => self.aleph_alpha.as_deref(),
            ProviderKind::HuggingFace => self.huggingface.as_deref(),
            ProviderKind::Gecko => self.gecko.as_deref(),
            ProviderKind::Local => None,
        }
    }
}

fn default_output_dir() -> PathBuf { PathBuf::from(".") }
fn default_workers() -> usize { 1 }
fn default_timeout_secs() -> u64 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    pub source: SourceConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directory holding a local model (`config.json`, `tokenizer.json`, weights).
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub runs: Vec<RunSpec>,
}

/// One registry entry: which provider/model to call on which language and
/// where to write the result.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSpec {
    pub provider: ProviderKind,
    pub model: String,
    pub language: String,
    #[serde(default)]
    pub scales: Vec<String>,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    pub output: String,
    #[serde(default)]
    pub dimensions: Option<usize>,
    #[serde(default)]
    pub pooling: Option<Pooling>,
    #[serde(default)]
    pub layer: Option<i32>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

impl RunSpec {
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.provider,
            model: self.model.clone(),
            dimensions: self.dimensions,
            pooling: self.pooling,
            layer: self.layer,
            task: self.task.clone(),
        }
    }

    pub fn normalize_options(&self, source: &SourceConfig) -> NormalizeOptions {
        NormalizeOptions::new(self.language.clone())
            .languages(source.languages.iter().cloned())
            .keep_scales(self.scales.iter().cloned())
            .drop_columns(self.drop_columns.iter().cloned())
    }

    pub fn policy(&self) -> OverwritePolicy { OverwritePolicy::from_flag(self.overwrite) }
}

impl ImportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.runs.is_empty() {
            return Err(Error::InvalidConfig("no [[runs]] configured".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".to_string()));
        }
        let mut outputs = HashSet::new();
        for (i, run) in self.runs.iter().enumerate() {
            if run.model.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("runs[{i}]: model is empty")));
            }
            if run.language.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("runs[{i}]: language is empty")));
            }
            if run.output.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("runs[{i}]: output is empty")));
            }
            if !outputs.insert(run.output.as_str()) {
                return Err(Error::InvalidConfig(format!("runs[{i}]: output '{}' is used twice", run.output)));
            }
        }
        Ok(())
    }

    pub fn output_path(&self, run: &RunSpec) -> PathBuf {
        resolve_with_base(&self.output_dir, &run.output)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
