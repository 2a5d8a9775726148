use std::path::PathBuf;

use clap::Parser;

use ppl_annotate::config::DEFAULT_INPUT;
use ppl_annotate::dataset::load_json;
use ppl_annotate::logging::init_tracing;
use ppl_annotate::stats::{Histogram, ScoreSummary};

/// Print a histogram of the perplexity scores in a dataset
#[derive(Parser)]
#[command(name = "ppl-hist")]
struct Cli {
    /// Scored JSON array of explanation records
    #[arg(long = "in", value_name = "PATH", default_value = DEFAULT_INPUT)]
    input: PathBuf,
    /// Number of histogram buckets over 0..100
    #[arg(long, default_value = "10")]
    bins: usize,
    /// Use raw scores instead of the 0..100 display scale
    #[arg(long)]
    no_normalize: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let document = load_json(&cli.input).await?;
    let Some(items) = document.as_array() else {
        anyhow::bail!("{}: input must be a JSON array", cli.input.display());
    };

    let summary = ScoreSummary::collect(items, !cli.no_normalize);
    let (min, max) = summary.range();
    let histogram = Histogram::build(&summary.values, cli.bins, 0.0, 100.0);

    println!("File: {}", cli.input.display());
    println!(
        "Items total: {}, with perplexity: {}",
        summary.total,
        summary.values.len()
    );
    println!("Normalized: {}", summary.normalized);
    println!("Range: {min}..{max}");
    println!(
        ">=50: {}, >=70: {}, >=85: {}",
        summary.at_least(50.0),
        summary.at_least(70.0),
        summary.at_least(85.0)
    );
    println!("Histogram (0..100):");
    for line in histogram.render() {
        println!("{line}");
    }
    Ok(())
}
