use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::File as AsyncFile;
use tokio::io::AsyncBufReadExt;
use tracing::info;

use crate::error::{Error, Result};
use crate::scorer::LanguageModel;

pub const BIGRAM_MODEL_ID: &str = "bigram";

const SENTENCE_START: &str = "#";
const BIGRAM_WEIGHT: f64 = 0.8;
const UNIGRAM_WEIGHT: f64 = 0.2;
const SMOOTHING: f64 = 1e-6;

lazy_static! {
    static ref PUNCTUATION_PATTERN: Regex = Regex::new(r#"([,;:.!?¿¡()<>=\"'`])"#).unwrap();
}

#[derive(Default)]
struct BigramData {
    bigrams: HashMap<String, f64>,
    unigrams: HashMap<String, f64>,
}

/// Interpolated unigram/bigram model, a lightweight stand-in for a neural
/// causal LM.
#[derive(Default)]
pub struct BigramPerplexityModel {
    data: BigramData,
}

impl BigramPerplexityModel {
    pub fn new() -> BigramPerplexityModel {
        BigramPerplexityModel::default()
    }

    /// Build a model from in-memory tables.
    pub fn from_tables<U, B>(unigrams: U, bigrams: B) -> BigramPerplexityModel
    where
        U: IntoIterator<Item = (String, f64)>,
        B: IntoIterator<Item = (String, f64)>,
    {
        BigramPerplexityModel {
            data: BigramData {
                unigrams: unigrams.into_iter().collect(),
                bigrams: bigrams.into_iter().collect(),
            },
        }
    }

    /// Parse one table line: everything before the last space is the key.
    fn parse_line(line: &str) -> Option<std::result::Result<(String, f64), String>> {
        let line = line.trim_end();
        if line.is_empty() {
            return None;
        }
        let mut split = line.rsplitn(2, ' ');
        let prob = split.next().unwrap_or("");
        let Some(word) = split.next() else {
            return Some(Err(format!("expected `<words> <probability>`, got {line:?}")));
        };
        Some(
            prob.parse::<f64>()
                .map(|p| (word.to_string(), p))
                .map_err(|e| format!("bad probability {prob:?}: {e}")),
        )
    }

    async fn load_hashmap_from_file(path: PathBuf) -> Result<HashMap<String, f64>> {
        let mut hashmap = HashMap::new();
        let file = AsyncFile::open(&path)
            .await
            .map_err(|e| Error::io(&path, e))?;
        let reader = tokio::io::BufReader::new(file);
        let mut lines = reader.lines();

        let mut line_no = 0;
        while let Some(line) = lines.next_line().await.map_err(|e| Error::io(&path, e))? {
            line_no += 1;
            match Self::parse_line(&line) {
                None => continue,
                Some(Ok((word, prob))) => {
                    hashmap.insert(word, prob);
                }
                Some(Err(reason)) => {
                    return Err(Error::Table {
                        path,
                        line: line_no,
                        reason,
                    })
                }
            }
        }

        Ok(hashmap)
    }

    /// Loads a model from the unigram and bigram files
    /// These are text files with the following format:
    /// word(string) probability(float)
    /// word1(string) word2(string) probability(float)
    pub async fn from_file(
        unigrams_filename: &Path,
        bigrams_filename: &Path,
    ) -> Result<BigramPerplexityModel> {
        let start_time = std::time::Instant::now();

        info!(
            unigrams = %unigrams_filename.display(),
            bigrams = %bigrams_filename.display(),
            "loading bigram model"
        );
        let unigram_task = tokio::spawn(Self::load_hashmap_from_file(
            unigrams_filename.to_path_buf(),
        ));
        let bigram_task = tokio::spawn(Self::load_hashmap_from_file(
            bigrams_filename.to_path_buf(),
        ));

        let (unigrams_result, bigrams_result) = tokio::try_join!(unigram_task, bigram_task)?;
        let model = BigramPerplexityModel {
            data: BigramData {
                unigrams: unigrams_result?,
                bigrams: bigrams_result?,
            },
        };

        info!(
            unigrams = model.data.unigrams.len(),
            bigrams = model.data.bigrams.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "loaded bigram model"
        );
        Ok(model)
    }

    fn tokenize_sentence(&self, sentence: &str) -> Vec<String> {
        let parsed = PUNCTUATION_PATTERN.replace_all(sentence, " $0 ");
        parsed
            .split_ascii_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Average negative natural-log probability per token.
    ///
    /// Returns NaN for text without tokens.
    pub fn compute_mean_nll(&self, sentence: &str) -> f64 {
        let words = self.tokenize_sentence(&sentence.to_lowercase());
        if words.is_empty() {
            return f64::NAN;
        }
        let num_words = words.len() as f64;
        let mut prev_word = SENTENCE_START.to_string();
        let mut log_prob_sum = 0.;
        for word in words {
            let bigram = format!("{} {}", prev_word, word);
            let bi_dec = self.data.bigrams.get(&bigram).copied().unwrap_or(0.);
            let uni_dec = self.data.unigrams.get(word.as_str()).copied().unwrap_or(0.);
            prev_word = word;
            log_prob_sum += (bi_dec * BIGRAM_WEIGHT + uni_dec * UNIGRAM_WEIGHT + SMOOTHING).ln();
        }
        -log_prob_sum / num_words
    }
}

impl LanguageModel for BigramPerplexityModel {
    fn id(&self) -> &str {
        BIGRAM_MODEL_ID
    }

    fn mean_nll(&self, text: &str) -> Result<f64> {
        Ok(self.compute_mean_nll(text))
    }
}
