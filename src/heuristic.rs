//! Model-free 0..100 confusion rating for a record's `content`.
//!
//! The rating adds three parts: up to 40 points for low vocabulary variety
//! (type/token ratio), up to 40 for long sentences and 2 per archaic word
//! (at most 20).

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::record::{PERPLEXITY, PERPLEXITY_MODEL};

pub const CONTENT: &str = "content";
pub const HEURISTIC_MODEL: &str = "heuristic";

const ARCHAIC_TERMS: &[&str] = &[
    "wherefore", "anon", "hie", "thou", "thee", "thy", "thine", "ye", "nay", "ere", "o'er",
    "o’er", "hath", "dost", "art", "oft", "whence", "whither", "methinks", "aught", "naught",
    "misadventur’d", "misadventurd", "canker’d", "cankered", "partisans",
];

lazy_static! {
    static ref WORD_PATTERN: Regex = Regex::new(r"[a-z\u{00C0}-\u{017F}']+").unwrap();
    static ref SENTENCE_BREAK: Regex = Regex::new(r"[.!?]+\s+").unwrap();
    static ref ARCHAIC: HashSet<&'static str> = ARCHAIC_TERMS.iter().copied().collect();
}

/// Counts the rating is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextFeatures {
    pub tokens: usize,
    pub unique: usize,
    pub sentences: usize,
    pub archaic_hits: usize,
}

impl TextFeatures {
    pub fn of(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = WORD_PATTERN.find_iter(&lowered).map(|m| m.as_str()).collect();
        let unique = tokens.iter().collect::<HashSet<_>>().len();
        let archaic_hits = tokens.iter().filter(|t| ARCHAIC.contains(*t)).count();
        let sentences = SENTENCE_BREAK
            .split(text)
            .filter(|s| !s.is_empty())
            .count();
        Self {
            tokens: tokens.len(),
            unique,
            sentences,
            archaic_hits,
        }
    }
}

pub fn is_archaic(word: &str) -> bool {
    ARCHAIC.contains(word.to_lowercase().as_str())
}

/// Confusion rating of `text` on a 0..100 scale; 0 when it has no words.
pub fn confusion_score(text: &str) -> u32 {
    let f = TextFeatures::of(text);
    if f.tokens == 0 {
        return 0;
    }
    let tokens = f.tokens as f64;
    let ttr = f.unique as f64 / tokens;
    let avg_sentence = if f.sentences > 0 {
        tokens / f.sentences as f64
    } else {
        tokens
    };

    let variety = (1.0 - ((ttr - 0.2) / 0.6).clamp(0.0, 1.0)) * 40.0;
    let length = (avg_sentence / 25.0).min(1.0) * 40.0;
    let archaic = f.archaic_hits.min(10) as f64 * 2.0;
    (variety + length + archaic).clamp(0.0, 100.0).round() as u32
}

/// Rate every object's `content` and store it as its `perplexity`.
///
/// Returns how many records were rated; non-objects are left alone.
pub fn rate_items(items: &mut [Value]) -> usize {
    let mut rated = 0;
    for item in items.iter_mut() {
        let Value::Object(record) = item else {
            continue;
        };
        let score = confusion_score(record.get(CONTENT).and_then(Value::as_str).unwrap_or(""));
        record.insert(PERPLEXITY.to_string(), Value::from(score));
        record.insert(
            PERPLEXITY_MODEL.to_string(),
            Value::String(HEURISTIC_MODEL.to_string()),
        );
        rated += 1;
    }
    rated
}
