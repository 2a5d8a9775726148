use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;

use ppl_annotate::config::DEFAULT_INPUT;
use ppl_annotate::dataset::{load_json, write_items};
use ppl_annotate::logging::init_tracing;
use ppl_annotate::stats::normalize;

/// Add a z-score normalised `perplexityNorm` (0..100) to every record
#[derive(Parser)]
#[command(name = "ppl-normalize")]
struct Cli {
    /// Scored JSON array of explanation records
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

    let summary = normalize(&mut items);
    write_items(output, &items).await?;
    println!(
        "Normalized {} items (mean={:.2}, std={:.2}) -> {}",
        summary.count,
        summary.mean,
        summary.std,
        output.display()
    );
    Ok(())
}
