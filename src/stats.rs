//! Display-scale scores, histograms and z-score normalisation over a
//! scored dataset.
//!
//! Two kinds of score live in the same field: ratings already on a 0..100
//! scale, and raw perplexities from a language model. Raw perplexities are
//! mapped onto 0..100 with `25 * log10(p)`, so a perplexity of 10 shows as
//! 25 and 10 000 as 100.

use serde_json::Value;

use crate::record::{PERPLEXITY, PERPLEXITY_MODEL};

pub const CONFUSION: &str = "confusion";
pub const PERPLEXITY_NORM: &str = "perplexityNorm";

const SCALE_MAX: f64 = 100.0;
const RAW_MODEL_MARKERS: &[&str] = &["gpt2", "bigram"];
const BAR_WIDTH: usize = 40;

/// Whether `model_id` produces raw (unbounded) perplexities.
pub fn is_raw_model(model_id: &str) -> bool {
    let model_id = model_id.to_lowercase();
    RAW_MODEL_MARKERS.iter().any(|m| model_id.contains(m))
}

fn clamp_scale(x: f64) -> f64 {
    x.clamp(0.0, SCALE_MAX)
}

/// The record's score, from `perplexity` or else `confusion`.
pub fn raw_score(item: &Value) -> Option<f64> {
    item.get(PERPLEXITY)
        .filter(|v| !v.is_null())
        .or_else(|| item.get(CONFUSION))
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

/// The record's score on the 0..100 display scale.
pub fn display_score(item: &Value) -> f64 {
    let p = raw_score(item).filter(|p| *p >= 0.0).unwrap_or(0.0);
    let model = item
        .get(PERPLEXITY_MODEL)
        .and_then(Value::as_str)
        .unwrap_or("");
    if p <= SCALE_MAX && !is_raw_model(model) {
        return clamp_scale(p);
    }
    clamp_scale((25.0 * p.max(1.0).log10()).round())
}

/// Mean and sample standard deviation. A zero spread is reported as 1.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0);
    let std = var.sqrt();
    (mean, if std == 0.0 { 1.0 } else { std })
}

/// Summary of a z-score normalisation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
}

/// Add `perplexityNorm` to every object: the display score re-centred on 50
/// with 15 points per standard deviation.
pub fn normalize(items: &mut [Value]) -> Normalization {
    let scores: Vec<f64> = items.iter().map(display_score).collect();
    let (mean, std) = mean_std(&scores);
    for (item, score) in items.iter_mut().zip(&scores) {
        if let Value::Object(record) = item {
            let z = (score - mean) / std;
            let norm = clamp_scale((50.0 + 15.0 * z).round());
            record.insert(PERPLEXITY_NORM.to_string(), Value::from(norm as u64));
        }
    }
    Normalization {
        count: items.len(),
        mean,
        std,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub counts: Vec<usize>,
    pub min: f64,
    pub width: f64,
}

impl Histogram {
    /// Bucket `values` into `bins` equal ranges over `[min, max]`; values
    /// outside the range land in the first or last bucket.
    pub fn build(values: &[f64], bins: usize, min: f64, max: f64) -> Self {
        let bins = bins.max(1);
        let width = (max - min) / bins as f64;
        let mut counts = vec![0; bins];
        for v in values {
            let idx = ((v - min) / width).floor();
            let idx = if idx < 0.0 { 0 } else { (idx as usize).min(bins - 1) };
            counts[idx] += 1;
        }
        Self { counts, min, width }
    }

    /// One line per bucket: `lo–hi | count ████`.
    pub fn render(&self) -> Vec<String> {
        let max_count = self.counts.iter().copied().max().unwrap_or(0);
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let lo = (self.min + i as f64 * self.width).round() as i64;
                let hi = (self.min + (i + 1) as f64 * self.width).round() as i64;
                format!("{lo:>3}–{hi:<3} | {c:>4} {}", bar(c, max_count))
            })
            .collect()
    }
}

fn bar(n: usize, max_n: usize) -> String {
    if max_n == 0 {
        return String::new();
    }
    let w = ((n as f64 / max_n as f64) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(w)
}

/// Headline figures for a dataset's scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    pub total: usize,
    pub values: Vec<f64>,
    pub normalized: bool,
}

impl ScoreSummary {
    /// Collect every record with a finite score, optionally mapped to the
    /// display scale.
    pub fn collect(items: &[Value], normalized: bool) -> Self {
        let values = items
            .iter()
            .filter(|it| raw_score(it).is_some())
            .map(|it| {
                if normalized {
                    display_score(it)
                } else {
                    raw_score(it).unwrap_or(0.0)
                }
            })
            .collect();
        Self {
            total: items.len(),
            values,
            normalized,
        }
    }

    pub fn at_least(&self, threshold: f64) -> usize {
        self.values.iter().filter(|v| **v >= threshold).count()
    }

    pub fn range(&self) -> (f64, f64) {
        if self.values.is_empty() {
            return (0.0, 0.0);
        }
        let min = self.values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (min, max)
    }
}
