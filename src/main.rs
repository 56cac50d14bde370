use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mention_coref::prepare::DEFAULT_PROPORTION;
use mention_coref::{
    prepare_path, process_path, CorefConfig, Error, InputFormat, ResolverKind, Result,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "coref")]
#[command(about = "Mention-pair coreference resolution for MMAX and TEI corpora")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve coreference in a document or a corpus directory
    Resolve {
        /// Input file or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Input format: mmax or tei
        #[arg(short, long)]
        format: Option<InputFormat>,

        /// Resolve algorithm: all2all, entity_based, incremental, closest or siamese
        #[arg(short, long)]
        resolver: Option<ResolverKind>,

        /// Decision threshold
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Linear model JSON file
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Model server base URL
        #[arg(long)]
        scorer_url: Option<String>,
    },

    /// Write training vectors for a corpus
    Prepare {
        /// Input file or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Output TSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Input format: mmax or tei
        #[arg(short, long)]
        format: Option<InputFormat>,

        /// Negative examples per positive one
        #[arg(short, long, default_value_t = DEFAULT_PROPORTION)]
        proportion: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = CorefConfig::from_env()?;

    match cli.command {
        Command::Resolve {
            input,
            output,
            format,
            resolver,
            threshold,
            model,
            scorer_url,
        } => {
            if let Some(format) = format {
                config = config.with_format(format);
            }
            if let Some(resolver) = resolver {
                config = config.with_resolver(resolver);
            }
            if let Some(threshold) = threshold {
                config = config.with_threshold(threshold);
            }
            if let Some(model) = model {
                config = config.with_model_path(model);
            }
            if let Some(url) = scorer_url {
                config = config.with_scorer_url(url);
            }

            let resolver = Arc::new(config.build_resolver()?);
            let summary = process_path(
                &input,
                &output,
                config.format,
                resolver,
                config.read_options(),
                config.workers,
            )
            .await?;
            info!(
                resolved = summary.resolved,
                skipped = summary.skipped,
                failed = summary.failed,
                "done"
            );
        }
        Command::Prepare {
            input,
            output,
            format,
            proportion,
        } => {
            if let Some(format) = format {
                config = config.with_format(format);
            }
            config.validate()?;
            let extractor = config.build_extractor()?;
            let format = config.format;
            let seed = config.seed;
            let counts = tokio::task::spawn_blocking(move || {
                prepare_path(&input, &output, format, &extractor, proportion, seed)
            })
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))??;
            info!(
                positives = counts.positives,
                negatives = counts.negatives,
                "done"
            );
        }
    }
    Ok(())
}
