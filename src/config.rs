use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_INPUT: &str = "data/explanations.json";
pub const DEFAULT_REFERENCE: &str = "romeo-and-juliet.txt";
pub const DEFAULT_MODEL: &str = "gpt2";

/// Score the source text behind each explanation record with a language
/// model and store the perplexity on the record.
#[derive(Parser, Debug, Clone)]
#[command(name = "ppl-annotate", version)]
pub struct AnnotateConfig {
    /// Input JSON array of explanation records
    #[arg(long = "in", value_name = "PATH", default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Output path (defaults to the input path)
    #[arg(long = "out", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Re-score records that already have a perplexity
    #[arg(long)]
    pub force: bool,

    /// Hugging Face model id or local model directory
    #[arg(long, env = "PPL_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Reference text the record offsets point into
    #[arg(long = "text", value_name = "PATH", default_value = DEFAULT_REFERENCE)]
    pub reference: PathBuf,

    /// Unigram table; scores with the bigram model instead of `--model`
    #[arg(long, value_name = "PATH", requires = "bigrams")]
    pub unigrams: Option<PathBuf>,

    /// Bigram table for the bigram model
    #[arg(long, value_name = "PATH", requires = "unigrams")]
    pub bigrams: Option<PathBuf>,
}

impl AnnotateConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            force: false,
            model: DEFAULT_MODEL.to_string(),
            reference: PathBuf::from(DEFAULT_REFERENCE),
            unigrams: None,
            bigrams: None,
        }
    }

    pub fn output_path(&self) -> &PathBuf {
        self.output.as_ref().unwrap_or(&self.input)
    }

    /// Both bigram tables, when the bigram model was requested.
    pub fn bigram_tables(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.unigrams.as_ref().zip(self.bigrams.as_ref())
    }
}
