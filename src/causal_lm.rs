//! Pretrained causal language model used as the default scoring oracle.
//!
//! The model identifier is either a local directory holding
//! `config.json`, `tokenizer.json` and `model.safetensors`, or a Hugging Face
//! hub repository id (e.g. `gpt2`, `distilgpt2`), fetched into the local hub
//! cache on first use.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::gpt2::{Gpt2, Gpt2Config};
use crate::scorer::LanguageModel;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Resolved on-disk locations of a model's files.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights: dir.join(WEIGHTS_FILE),
        }
    }

    /// Local directory if `model_id` names one, otherwise the hub.
    pub fn resolve(model_id: &str) -> Result<Self> {
        let dir = Path::new(model_id);
        if dir.is_dir() {
            return Ok(Self::in_dir(dir));
        }

        info!(model = model_id, "fetching model files from the hub");
        let api = Api::new()?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));
        Ok(Self {
            config: repo.get(CONFIG_FILE)?,
            tokenizer: repo.get(TOKENIZER_FILE)?,
            weights: repo.get(WEIGHTS_FILE)?,
        })
    }
}

pub struct CausalLm {
    id: String,
    tokenizer: Tokenizer,
    model: Gpt2,
}

impl CausalLm {
    /// Load tokenizer and weights for `model_id` onto the CPU.
    pub fn load(model_id: &str) -> Result<Self> {
        let files = ModelFiles::resolve(model_id)?;
        Self::from_files(model_id, &files)
    }

    pub fn from_files(model_id: &str, files: &ModelFiles) -> Result<Self> {
        let start_time = std::time::Instant::now();
        let device = Device::Cpu;

        let config_text =
            std::fs::read_to_string(&files.config).map_err(|e| Error::io(&files.config, e))?;
        let config: Gpt2Config =
            serde_json::from_str(&config_text).map_err(|e| Error::json(&files.config, e))?;

        let tokenizer =
            Tokenizer::from_file(&files.tokenizer).map_err(|e| Error::Tokenizer(e.to_string()))?;

        let weights = std::fs::read(&files.weights).map_err(|e| Error::io(&files.weights, e))?;
        let vb = VarBuilder::from_buffered_safetensors(weights, DType::F32, &device)?;
        // Checkpoints saved from `GPT2LMHeadModel` nest everything under
        // `transformer.`; bare `GPT2Model` checkpoints do not.
        let vb = if vb.contains_tensor("transformer.wte.weight") {
            vb.pp("transformer")
        } else {
            vb
        };
        let model = Gpt2::load(config, vb)?;

        debug!(summary = %model.config_summary(), "model ready");
        info!(
            model = model_id,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "loaded language model"
        );

        Ok(Self {
            id: model_id.to_string(),
            tokenizer,
            model,
        })
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }
}

impl LanguageModel for CausalLm {
    fn id(&self) -> &str {
        &self.id
    }

    fn mean_nll(&self, text: &str) -> Result<f64> {
        let tokens = self.encode(text)?;
        Ok(self.model.mean_nll(&tokens)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_in_dir() {
        let files = ModelFiles::in_dir(Path::new("/models/gpt2"));
        assert_eq!(files.config, PathBuf::from("/models/gpt2/config.json"));
        assert_eq!(files.tokenizer, PathBuf::from("/models/gpt2/tokenizer.json"));
        assert_eq!(files.weights, PathBuf::from("/models/gpt2/model.safetensors"));
    }

    #[test]
    fn test_resolve_prefers_local_dir() {
        let dir = tempfile::tempdir().unwrap();
        let id = dir.path().to_str().unwrap();
        let files = ModelFiles::resolve(id).unwrap();
        assert_eq!(files.weights, dir.path().join(WEIGHTS_FILE));
    }

    #[test]
    fn test_missing_config_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = ModelFiles::in_dir(dir.path());
        match CausalLm::from_files("local", &files) {
            Err(Error::Io { path, .. }) => assert_eq!(path, files.config),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("loading from an empty directory succeeded"),
        }
    }
}
