use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;

use ppl_annotate::config::DEFAULT_INPUT;
use ppl_annotate::dataset::{load_json, write_items};
use ppl_annotate::heuristic::rate_items;
use ppl_annotate::logging::init_tracing;

/// Rate each record's `content` on a 0..100 confusion scale, without a model
#[derive(Parser)]
#[command(name = "ppl-heuristic")]
struct Cli {
    /// JSON array of explanation records
    #[arg(long = "in", value_name = "PATH", default_value = DEFAULT_INPUT)]
    input: PathBuf,
    /// Output path (defaults to the input path)
    #[arg(long = "out", value_name = "PATH")]
    output: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let output = cli.output.as_ref().unwrap_or(&cli.input);

    let Value::Array(mut items) = load_json(&cli.input).await? else {
        anyhow::bail!("{}: input must be a JSON array", cli.input.display());
    };

    let rated = rate_items(&mut items);
    tracing::info!(rated, total = items.len(), "rated records");
    write_items(output, &items).await?;
    println!("Scored {} items -> {}", items.len(), output.display());
    Ok(())
}
