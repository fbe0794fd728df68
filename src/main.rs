use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info};

use review_lda::resources::{LemmaTable, PolarityTable, WordSet};
use review_lda::{write_token_table, Pipeline, PipelineConfig, Resources, Result};

#[derive(Parser)]
#[command(name = "review-lda")]
#[command(about = "Clean, classify and topic-model product reviews")]
#[command(version)]
struct Cli {
    /// Newline-delimited JSON reviews with `overall` and `reviewText`
    input: PathBuf,

    /// JSON pipeline configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of reviews to load
    #[arg(short, long)]
    limit: Option<usize>,

    /// Random seed for the split, the forest and the topic models
    #[arg(long)]
    seed: Option<u64>,

    /// Stop-word file, one word per line
    #[arg(long)]
    stop_words: Option<PathBuf>,

    /// Lemma file, `inflected<TAB>lemma` per line
    #[arg(long)]
    lemmas: Option<PathBuf>,

    /// Polarity lexicon, `word,positive|negative` per line
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// Write the token/lemma table here as NDJSON
    #[arg(long)]
    tokens_out: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}

/// Returns whether every branch succeeded.
fn run(cli: &Cli) -> Result<bool> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(limit) = cli.limit {
        config.max_documents = limit;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let english = Resources::english();
    let resources = Resources::new(
        match &cli.stop_words {
            Some(path) => Box::new(WordSet::from_path(path)?),
            None => english.stop_words,
        },
        match &cli.lemmas {
            Some(path) => Box::new(LemmaTable::from_path(path)?),
            None => english.lemmas,
        },
        match &cli.lexicon {
            Some(path) => Box::new(PolarityTable::from_path(path)?),
            None => english.lexicon,
        },
    );

    let pipeline = Pipeline::new(config)?.with_resources(resources);
    let report = pipeline.run(&cli.input)?;

    if let Some(path) = &cli.tokens_out {
        write_token_table(path, &report.tokens)?;
        info!("wrote {} token records to {}", report.tokens.len(), path.display());
    }

    print!("{}", report);
    Ok(report.failed_branches().is_empty())
}
