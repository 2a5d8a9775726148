use clap::Parser;

use ppl_annotate::logging::init_tracing;
use ppl_annotate::{
    annotate_file, AnnotateConfig, BigramPerplexityModel, CausalLm, LanguageModel, RunOutcome,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = AnnotateConfig::parse();

    let outcome = annotate_file(&config, || async {
        let model: Box<dyn LanguageModel> = match config.bigram_tables() {
            Some((unigrams, bigrams)) => {
                Box::new(BigramPerplexityModel::from_file(unigrams, bigrams).await?)
            }
            None => Box::new(CausalLm::load(&config.model)?),
        };
        Ok::<_, ppl_annotate::Error>(model)
    })
    .await?;

    if let RunOutcome::Written { report, path } = outcome {
        println!("Wrote {} items -> {}", report.total, path.display());
    }
    Ok(())
}
