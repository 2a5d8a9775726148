use std::cell::Cell;
use std::path::Path;

use serde_json::{json, Value};
use tempfile::TempDir;

use ppl_annotate::{annotate_file, AnnotateConfig, Error, LanguageModel, Result, RunOutcome};

const PLAY: &str = "\
Two households, both alike in dignity,
In fair Verona, where we lay our scene,
From ancient grudge break to new mutiny,
Where civil blood makes civil hands unclean.
";

/// Deterministic stand-in for a causal LM: perplexity grows with the
/// number of distinct characters.
struct CharModel {
    id: String,
}

impl LanguageModel for CharModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn mean_nll(&self, text: &str) -> Result<f64> {
        let mut chars: Vec<char> = text.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        Ok((chars.len() as f64).ln() / 3.0)
    }
}

struct Fixture {
    dir: TempDir,
    config: AnnotateConfig,
}

impl Fixture {
    fn new(items: &Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("explanations.json");
        std::fs::write(&input, serde_json::to_string_pretty(items).unwrap()).unwrap();
        let reference = dir.path().join("play.txt");
        std::fs::write(&reference, PLAY).unwrap();

        let mut config = AnnotateConfig::new(input);
        config.reference = reference;
        Self { dir, config }
    }

    async fn run(&self) -> Result<RunOutcome> {
        let id = self.config.model.clone();
        annotate_file(&self.config, || async move { Ok::<_, Error>(CharModel { id }) }).await
    }

    fn read(&self, path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn read_output(&self) -> Value {
        self.read(self.config.output_path())
    }
}

#[tokio::test]
async fn empty_span_scores_zero_with_default_model_id() {
    let fx = Fixture::new(&json!([{"startOffset": 0, "endOffset": 0}]));
    fx.run().await.unwrap();

    assert_eq!(
        fx.read_output(),
        json!([{
            "startOffset": 0,
            "endOffset": 0,
            "perplexity": 0.0,
            "perplexityModel": "gpt2"
        }])
    );
}

#[tokio::test]
async fn prescored_record_is_unchanged() {
    let input = json!([{"startOffset": 0, "endOffset": 5, "perplexity": 12.3}]);
    let fx = Fixture::new(&input);
    let outcome = fx.run().await.unwrap();

    match outcome {
        RunOutcome::Written { report, .. } => {
            assert_eq!(report.skipped, 1);
            assert_eq!(report.scored, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(fx.read_output(), input);
}

#[tokio::test]
async fn force_rescores_everything() {
    let input = json!([{"startOffset": 0, "endOffset": 3, "perplexity": 12.3, "perplexityModel": "old"}]);
    let mut fx = Fixture::new(&input);
    fx.config.force = true;
    fx.config.model = "distilgpt2".to_string();
    fx.run().await.unwrap();

    let out = fx.read_output();
    // "Two": three distinct characters, exp(ln 3 / 3) = 1.44...
    assert_eq!(out[0]["perplexity"], json!(1.44));
    assert_eq!(out[0]["perplexityModel"], json!("distilgpt2"));
}

#[tokio::test]
async fn scores_every_record_of_a_batch() {
    let items: Vec<Value> = (0..25)
        .map(|i| json!({"id": i, "startOffset": i * 4, "endOffset": i * 4 + 12}))
        .collect();
    let fx = Fixture::new(&Value::Array(items));
    let outcome = fx.run().await.unwrap();

    let RunOutcome::Written { report, path } = outcome else {
        panic!("nothing written");
    };
    assert_eq!(report.total, 25);
    assert_eq!(report.scored, 25);
    assert_eq!(report.failed, 0);
    assert_eq!(&path, fx.config.output_path());

    let out = fx.read_output();
    let out = out.as_array().unwrap();
    assert_eq!(out.len(), 25);
    for (i, item) in out.iter().enumerate() {
        assert_eq!(item["id"], json!(i));
        let ppl = item["perplexity"].as_f64().unwrap();
        assert!(ppl >= 0.0);
        assert_eq!((ppl * 100.0).round() / 100.0, ppl);
        assert_eq!(item["perplexityModel"], json!("gpt2"));
    }
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let items = json!([
        {"startOffset": 0, "endOffset": 15},
        {"startOffset": -20, "endOffset": 3},
        {"startOffset": 50, "endOffset": 10},
        {"startOffset": 150, "endOffset": 100000}
    ]);
    let fx = Fixture::new(&items);
    fx.run().await.unwrap();
    let first = std::fs::read_to_string(fx.config.output_path()).unwrap();

    fx.run().await.unwrap();
    let second = std::fs::read_to_string(fx.config.output_path()).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn object_input_writes_nothing_and_skips_model() {
    let fx = Fixture::new(&json!({"items": []}));
    let out = fx.dir.path().join("out.json");
    let mut config = fx.config.clone();
    config.output = Some(out.clone());

    let loaded = Cell::new(false);
    let outcome = annotate_file(&config, || async {
        loaded.set(true);
        Ok::<_, Error>(CharModel { id: "gpt2".into() })
    })
    .await
    .unwrap();

    assert_eq!(outcome, RunOutcome::NotAnArray);
    assert!(!loaded.get());
    assert!(!out.exists());
}

#[tokio::test]
async fn separate_output_leaves_input_alone() {
    let input = json!([{"startOffset": 4, "endOffset": 14, "speaker": "Chorus"}]);
    let mut fx = Fixture::new(&input);
    let out = fx.dir.path().join("scored.json");
    fx.config.output = Some(out.clone());
    fx.run().await.unwrap();

    assert_eq!(fx.read(&fx.config.input), input);
    let scored = fx.read(&out);
    assert_eq!(scored[0]["speaker"], json!("Chorus"));
    assert!(scored[0]["perplexity"].as_f64().unwrap() > 1.0);
}

#[tokio::test]
async fn missing_reference_is_fatal() {
    let mut fx = Fixture::new(&json!([{"startOffset": 0, "endOffset": 3}]));
    fx.config.reference = fx.dir.path().join("nowhere.txt");

    let err = fx.run().await.unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[tokio::test]
async fn invalid_json_is_fatal() {
    let fx = Fixture::new(&json!([]));
    std::fs::write(&fx.config.input, "[{\"startOffset\": ").unwrap();

    let err = fx.run().await.unwrap_err();
    assert!(matches!(err, Error::Json { .. }));
}

#[tokio::test]
async fn model_load_failure_is_fatal_and_writes_nothing() {
    let fx = Fixture::new(&json!([{"startOffset": 0, "endOffset": 3}]));
    let before = std::fs::read_to_string(&fx.config.input).unwrap();

    let result = annotate_file(&fx.config, || async {
        Err::<CharModel, _>(Error::Tokenizer("missing tokenizer.json".into()))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(std::fs::read_to_string(&fx.config.input).unwrap(), before);
}
