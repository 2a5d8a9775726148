//! Batch driver: walk the records, score the unscored ones, write back.

use std::future::Future;
use std::path::PathBuf;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::AnnotateConfig;
use crate::dataset;
use crate::error::Result;
use crate::record;
use crate::scorer::{perplexity, LanguageModel};
use crate::span;

/// Progress is reported after every this many scored records.
pub const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub scored: usize,
    pub total: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub scored: usize,
    pub skipped: usize,
    /// Scored records whose scoring failed and fell back to 0.0.
    pub failed: usize,
    /// Array elements that are not objects and were left alone.
    pub not_objects: usize,
}

/// Scores records against one reference text with one model.
pub struct Annotator<'a, M: LanguageModel + ?Sized> {
    model: &'a M,
    reference: &'a [u8],
    force: bool,
}

impl<'a, M: LanguageModel + ?Sized> Annotator<'a, M> {
    pub fn new(model: &'a M, reference: &'a [u8]) -> Self {
        Self {
            model,
            reference,
            force: false,
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Perplexity of the text a record points at.
    pub fn score_record(&self, record: &serde_json::Map<String, Value>) -> Result<f64> {
        let (start, end) = record::span(record)?;
        let text = span::extract(self.reference, start, end);
        perplexity(self.model, &text)
    }

    /// Annotate `items` in place, logging progress.
    pub fn annotate(&self, items: &mut [Value]) -> BatchReport {
        self.annotate_with_progress(items, |p| {
            info!("scored {}/{}", p.scored, p.total);
        })
    }

    /// Annotate `items` in place, calling `on_progress` every
    /// [`PROGRESS_EVERY`] scored records.
    pub fn annotate_with_progress<F>(&self, items: &mut [Value], mut on_progress: F) -> BatchReport
    where
        F: FnMut(Progress),
    {
        let mut report = BatchReport {
            total: items.len(),
            ..BatchReport::default()
        };

        for (index, item) in items.iter_mut().enumerate() {
            let Value::Object(record) = item else {
                warn!(index, "record is not an object, leaving it untouched");
                report.not_objects += 1;
                continue;
            };
            if !self.force && record::is_scored(record) {
                report.skipped += 1;
                continue;
            }

            let ppl = self.score_record(record).unwrap_or_else(|err| {
                warn!(index, %err, "failed to score record");
                report.failed += 1;
                0.0
            });
            record::write_score(record, ppl, self.model.id());

            report.scored += 1;
            if report.scored % PROGRESS_EVERY == 0 {
                on_progress(Progress {
                    scored: report.scored,
                    total: report.total,
                });
            }
        }

        report
    }
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Written { report: BatchReport, path: PathBuf },
    /// Input was valid JSON but not an array; nothing was written.
    NotAnArray,
}

/// Annotate the dataset named by `config`.
///
/// The model is only loaded once the input is known to be an array.
pub async fn annotate_file<M, F, Fut>(config: &AnnotateConfig, load_model: F) -> Result<RunOutcome>
where
    M: LanguageModel,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<M>>,
{
    let document = dataset::load_json(&config.input).await?;
    let Value::Array(mut items) = document else {
        error!(
            path = %config.input.display(),
            "input JSON must be an array of explanation objects"
        );
        return Ok(RunOutcome::NotAnArray);
    };

    let reference = dataset::load_reference(&config.reference).await?;
    info!(
        records = items.len(),
        reference_bytes = reference.len(),
        "loaded dataset"
    );

    info!(model = %config.model, "loading model");
    let model = load_model().await?;

    let report = Annotator::new(&model, &reference)
        .force(config.force)
        .annotate(&mut items);
    info!(
        scored = report.scored,
        skipped = report.skipped,
        failed = report.failed,
        "annotation finished"
    );

    let path = config.output_path().clone();
    dataset::write_items(&path, &items).await?;
    Ok(RunOutcome::Written { report, path })
}
