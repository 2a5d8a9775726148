//! GPT-2 forward pass over Hugging Face safetensors weights.
//!
//! Architecture: learned position embeddings, pre-norm transformer blocks
//! with a fused QKV projection, tanh-approximated GELU, final LayerNorm and
//! an LM head tied to the token embeddings.
//!
//! HF GPT-2 stores its linear layers as `Conv1D`, i.e. weights shaped
//! `[in, out]`, so projections are `x @ W + b` without a transpose.

use candle_core::{DType, Device, IndexOp, Module, Result, Tensor, D};
use candle_nn::{embedding, layer_norm, Embedding, LayerNorm, VarBuilder};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Gpt2Config {
    #[serde(default = "default_n_embd")]
    pub n_embd: usize,
    #[serde(default = "default_n_head")]
    pub n_head: usize,
    #[serde(default = "default_n_layer")]
    pub n_layer: usize,
    #[serde(default = "default_n_positions")]
    pub n_positions: usize,
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
}

fn default_n_embd() -> usize {
    768
}
fn default_n_head() -> usize {
    12
}
fn default_n_layer() -> usize {
    12
}
fn default_n_positions() -> usize {
    1024
}
fn default_vocab_size() -> usize {
    50257
}
fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

impl Gpt2Config {
    fn head_dim(&self) -> usize {
        self.n_embd / self.n_head
    }
}

// ---- Conv1D ----

struct Conv1D {
    weight: Tensor,
    bias: Tensor,
}

impl Conv1D {
    fn load(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            weight: vb.get((in_dim, out_dim), "weight")?,
            bias: vb.get(out_dim, "bias")?,
        })
    }
}

impl Module for Conv1D {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        x.broadcast_matmul(&self.weight)?.broadcast_add(&self.bias)
    }
}

// ---- Attention ----

struct Attention {
    c_attn: Conv1D,
    c_proj: Conv1D,
    n_head: usize,
    head_dim: usize,
}

impl Attention {
    fn load(cfg: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            c_attn: Conv1D::load(cfg.n_embd, 3 * cfg.n_embd, vb.pp("c_attn"))?,
            c_proj: Conv1D::load(cfg.n_embd, cfg.n_embd, vb.pp("c_proj"))?,
            n_head: cfg.n_head,
            head_dim: cfg.head_dim(),
        })
    }

    fn forward(&self, x: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, n_embd) = x.dims3()?;

        let qkv = self.c_attn.forward(x)?;
        let qkv = qkv.reshape((batch, seq_len, 3, self.n_head, self.head_dim))?;

        // [batch, n_head, seq, head_dim]
        let q = qkv.i((.., .., 0))?.transpose(1, 2)?.contiguous()?;
        let k = qkv.i((.., .., 1))?.transpose(1, 2)?.contiguous()?;
        let v = qkv.i((.., .., 2))?.transpose(1, 2)?.contiguous()?;

        let scale = (self.head_dim as f64).sqrt();
        let weights = (q.matmul(&k.t()?)? / scale)?;
        let weights = weights.broadcast_add(mask)?;
        let weights = candle_nn::ops::softmax_last_dim(&weights)?;

        let out = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((batch, seq_len, n_embd))?;
        self.c_proj.forward(&out)
    }
}

/// Additive causal mask of shape `[1, 1, seq_len, seq_len]`.
fn causal_mask(seq_len: usize, device: &Device) -> Result<Tensor> {
    let mask: Vec<f32> = (0..seq_len)
        .flat_map(|i| {
            (0..seq_len).map(move |j| if j <= i { 0.0 } else { f32::NEG_INFINITY })
        })
        .collect();
    Tensor::from_vec(mask, (1, 1, seq_len, seq_len), device)
}

// ---- MLP ----

struct Mlp {
    c_fc: Conv1D,
    c_proj: Conv1D,
}

impl Mlp {
    fn load(cfg: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            c_fc: Conv1D::load(cfg.n_embd, 4 * cfg.n_embd, vb.pp("c_fc"))?,
            c_proj: Conv1D::load(4 * cfg.n_embd, cfg.n_embd, vb.pp("c_proj"))?,
        })
    }
}

impl Module for Mlp {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let h = self.c_fc.forward(x)?.gelu()?;
        self.c_proj.forward(&h)
    }
}

// ---- Block ----

struct Block {
    ln_1: LayerNorm,
    attn: Attention,
    ln_2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    fn load(cfg: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let eps = cfg.layer_norm_epsilon;
        Ok(Self {
            ln_1: layer_norm(cfg.n_embd, eps, vb.pp("ln_1"))?,
            attn: Attention::load(cfg, vb.pp("attn"))?,
            ln_2: layer_norm(cfg.n_embd, eps, vb.pp("ln_2"))?,
            mlp: Mlp::load(cfg, vb.pp("mlp"))?,
        })
    }

    fn forward(&self, x: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let h = self.attn.forward(&self.ln_1.forward(x)?, mask)?;
        let x = (x + h)?;
        let h = self.mlp.forward(&self.ln_2.forward(&x)?)?;
        x + h
    }
}

// ---- Model ----

pub struct Gpt2 {
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
    config: Gpt2Config,
}

impl Gpt2 {
    /// Build the model from a `VarBuilder` rooted at the transformer
    /// (the level holding `wte`, `wpe`, `h.*`, `ln_f`).
    pub fn load(config: Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let wte = embedding(config.vocab_size, config.n_embd, vb.pp("wte"))?;
        let wpe = embedding(config.n_positions, config.n_embd, vb.pp("wpe"))?;
        let blocks = (0..config.n_layer)
            .map(|i| Block::load(&config, vb.pp("h").pp(i)))
            .collect::<Result<Vec<_>>>()?;
        let ln_f = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_f"))?;
        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            config,
        })
    }

    /// Logits for every position, shape `[seq_len, vocab_size]`.
    pub fn forward(&self, tokens: &[u32]) -> Result<Tensor> {
        let seq_len = tokens.len();
        if seq_len == 0 {
            candle_core::bail!("cannot run GPT-2 on an empty sequence");
        }
        if seq_len > self.config.n_positions {
            candle_core::bail!(
                "sequence of {seq_len} tokens exceeds the {} token context window",
                self.config.n_positions
            );
        }
        let device = self.wte.embeddings().device();

        let token_ids = Tensor::new(tokens, device)?;
        let pos_ids = Tensor::arange(0u32, seq_len as u32, device)?;
        let h = (self.wte.forward(&token_ids)? + self.wpe.forward(&pos_ids)?)?;

        // [1, seq_len, n_embd]
        let mut h = h.unsqueeze(0)?;
        let mask = causal_mask(seq_len, device)?;
        for block in &self.blocks {
            h = block.forward(&h, &mask)?;
        }
        let h = self.ln_f.forward(&h)?.squeeze(0)?;

        // Tied LM head.
        h.matmul(&self.wte.embeddings().t()?)
    }

    /// Mean negative log-likelihood of `tokens[1..]` given their prefixes.
    ///
    /// A single token has nothing to predict; the mean over zero targets is
    /// NaN, matching the usual shifted-label loss.
    pub fn mean_nll(&self, tokens: &[u32]) -> Result<f64> {
        if tokens.len() < 2 {
            return Ok(f64::NAN);
        }
        let device = self.wte.embeddings().device();
        let logits = self.forward(tokens)?;
        let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;

        let predicted = log_probs.narrow(0, 0, tokens.len() - 1)?.contiguous()?;
        let targets = Tensor::new(&tokens[1..], device)?.unsqueeze(1)?;
        let picked = predicted.gather(&targets, 1)?;

        let nll = picked
            .to_dtype(DType::F64)?
            .mean_all()?
            .neg()?
            .to_scalar::<f64>()?;
        Ok(nll)
    }

    pub fn config_summary(&self) -> String {
        format!(
            "GPT-2: {}L/{}H/{}E, vocab={}, ctx={}",
            self.config.n_layer,
            self.config.n_head,
            self.config.n_embd,
            self.config.vocab_size,
            self.config.n_positions,
        )
    }
}
