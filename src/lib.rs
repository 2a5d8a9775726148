//! Language-model perplexity for explanation records.
//!
//! Each record names a byte range of a reference text. The annotator slices
//! that range, scores it with a causal language model and stores the
//! perplexity back on the record.

pub mod annotate;
pub mod bigram;
pub mod causal_lm;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gpt2;
pub mod heuristic;
pub mod logging;
pub mod record;
pub mod scorer;
pub mod span;
pub mod stats;

pub use annotate::{annotate_file, Annotator, BatchReport, RunOutcome};
pub use bigram::BigramPerplexityModel;
pub use causal_lm::CausalLm;
pub use config::AnnotateConfig;
pub use error::{Error, Result};
pub use scorer::{perplexity, LanguageModel};
