//! Locally loaded sentence encoders.
//!
//! [`SentenceEncoder`] loads a BERT or XLM-RoBERTa checkpoint from a model
//! directory once and then runs batched inference. `APP_USE_FAKE_EMBEDDINGS=1`
//! swaps in [`FakeEncoder`], a hashed bag-of-words encoder that is fast and
//! deterministic for tests and dry runs.

use anyhow::{Result, anyhow, bail};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::xlm_roberta::{XLMRobertaModel, Config as XLMRobertaConfig};
use scalemb_core::Pooling;
use tokenizers::Tokenizer;
use tracing::{debug, info};

mod device;
mod pool;
mod tokenize;

pub use device::select_device;
pub use pool::{cls_l2, masked_mean_l2, pool};
pub use tokenize::tokenize_batch;

pub const FAKE_DIM: usize = 1024;
const INFER_BATCH: usize = 32;

pub trait TextEncoder: Send + Sync {
    /// Identifier used in logs, usually the model directory name.
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String], pooling: Pooling) -> Result<Vec<Vec<f32>>>;
}

enum Backbone {
    Bert(BertModel),
    XlmRoberta(XLMRobertaModel),
}

pub struct SentenceEncoder {
    id: String,
    backbone: Backbone,
    tokenizer: Tokenizer,
    device: Device,
    hidden_size: usize,
    max_len: usize,
    pad_id: u32,
}

impl SentenceEncoder {
    /// Loads `config.json`, `tokenizer.json` and `model.safetensors` (or
    /// `pytorch_model.bin`) from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let start = Instant::now();
        let device = select_device();
        let id = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| model_dir.display().to_string());
        info!(model = %id, dir = %model_dir.display(), "loading sentence encoder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow!("Failed to read {}: {}", config_path.display(), e))?;
        let meta: serde_json::Value = serde_json::from_str(&raw_config)?;
        let model_type = meta.get("model_type").and_then(|v| v.as_str()).unwrap_or("bert").to_string();
        let hidden_size = meta.get("hidden_size").and_then(serde_json::Value::as_u64).ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;
        let max_positions = meta.get("max_position_embeddings").and_then(serde_json::Value::as_u64).unwrap_or(512) as usize;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);

        let (backbone, pad_default, position_offset) = match model_type.as_str() {
            "bert" => {
                let config: BertConfig = serde_json::from_str(&raw_config)?;
                (Backbone::Bert(BertModel::load(vb, &config)?), 0u32, 0usize)
            }
            "xlm-roberta" | "roberta" => {
                let config: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
                (Backbone::XlmRoberta(XLMRobertaModel::new(&config, vb)?), 1u32, 2usize)
            }
            other => bail!("Unsupported model_type '{}' in {}", other, config_path.display()),
        };
        let pad_id = meta.get("pad_token_id").and_then(serde_json::Value::as_u64).map_or(pad_default, |v| v as u32);
        let max_len = max_positions.saturating_sub(position_offset).clamp(1, 512);

        info!(model = %id, arch = %model_type, hidden_size, max_len, elapsed_ms = start.elapsed().as_millis() as u64, "sentence encoder loaded");
        Ok(Self { id, backbone, tokenizer, device, hidden_size, max_len, pad_id })
    }

    fn embed_chunk(&self, texts: &[String], pooling: Pooling) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = match &self.backbone {
            Backbone::Bert(model) => model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?,
            Backbone::XlmRoberta(model) => model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?,
        };
        let pooled = pool(&hidden, &attention_mask, pooling)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_vec2::<f32>()?)
    }
}

impl TextEncoder for SentenceEncoder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.hidden_size }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String], pooling: Pooling) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(INFER_BATCH) {
            out.extend(self.embed_chunk(chunk, pooling)?);
        }
        debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "local inference");
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        return Ok(weights.into_iter().collect());
    }
    bail!("No model.safetensors or pytorch_model.bin in {}", model_dir.display())
}

/// Hashed bag-of-words encoder. Same text, same vector; unit length.
pub struct FakeEncoder { dim: usize }

impl FakeEncoder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() { let mut hasher = XxHash64::with_seed(0); token.hash(&mut hasher); let h = hasher.finish(); let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32); v[idx] += val + (i as f32 % 3.0) * 0.01; }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; } v
    }
}

impl TextEncoder for FakeEncoder {
    fn id(&self) -> &str { "fake" }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String], _pooling: Pooling) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Loads the encoder for `model`, or the fake encoder when
/// `APP_USE_FAKE_EMBEDDINGS` is set.
pub fn load_encoder(model: &str, model_root: Option<&Path>) -> Result<Box<dyn TextEncoder>> {
    if use_fake_embeddings() { info!("using FakeEncoder"); return Ok(Box::new(FakeEncoder::new(FAKE_DIM))); }
    let dir = resolve_model_dir(model, model_root)?;
    Ok(Box::new(SentenceEncoder::load(&dir)?))
}

/// `model` may itself be a directory; otherwise it is looked up under the
/// configured root, `APP_MODEL_DIR`, `MODEL_DIR` and `./models`, in that order.
pub fn resolve_model_dir(model: &str, model_root: Option<&Path>) -> Result<PathBuf> {
    let direct = PathBuf::from(model);
    if direct.is_dir() { debug!(dir = %direct.display(), "using model path"); return Ok(direct); }
    let mut roots: Vec<PathBuf> = Vec::new();
    if let Some(root) = model_root { roots.push(root.to_path_buf()); }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { roots.push(PathBuf::from(dir)); }
    if let Ok(dir) = std::env::var("MODEL_DIR") { roots.push(PathBuf::from(dir)); }
    roots.push(PathBuf::from("models"));
    let name = model.rsplit('/').next().unwrap_or(model);
    for root in &roots {
        let p = root.join(name);
        if p.is_dir() { debug!(dir = %p.display(), "using model dir"); return Ok(p); }
    }
    Err(anyhow!("Could not locate model directory for '{}' (searched {:?})", model, roots))
}
