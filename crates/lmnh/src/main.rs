use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use lmnh_bucket::S3BucketStore;
use lmnh_core::archive::{ArchiveCollator, ArchiveSource};
use lmnh_core::config::PipelineConfig;
use lmnh_core::drivers::{run_batch, run_stream, CapMode, StreamOptions};
use lmnh_core::loader::Loader;
use lmnh_core::logging::{init_logging, LogConfig, LogFormat};
use lmnh_core::source::{ReplaySource, StreamSource};
use lmnh_core::store::{InteractionStore, MemoryStore, PgInteractionStore};
use lmnh_core::{db, seed};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Load museum kiosk interactions into Postgres",
    long_about = "Extract visitor ratings and assistance requests from the S3 archive \
                  or a live event stream, validate them and load them into the \
                  museum database.",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the ETL (default)
    Run(RunArgs),
    /// Run database migrations
    Migrate,
    /// Seed reference data (optionally running migrations)
    DbSeed(DbSeedArgs),
}

#[derive(Args, Debug, Default)]
struct DbSeedArgs {
    /// Skip running migrations before seeding
    #[arg(long)]
    skip_migrations: bool,
}

#[derive(Args, Debug, Default, Clone)]
struct RunArgs {
    /// Name of the S3 bucket holding the archive
    #[arg(short, long)]
    bucket: Option<String>,

    /// Rows to load from the archive, or polls to make in stream mode
    #[arg(short, long)]
    rows: Option<usize>,

    /// Write error logs to etl.log instead of the console
    #[arg(short, long)]
    log: bool,

    /// Read from the live event stream instead of the archive
    #[arg(short, long)]
    stream: bool,

    /// Stream from a JSON-lines file ("-" for stdin) instead of Kafka
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// What the stream row cap counts: iterations or messages
    #[arg(long, default_value = "iterations")]
    cap_by: CapMode,

    /// Load into a seeded in-memory store instead of Postgres
    #[arg(long)]
    dry_run: bool,

    /// Console log format: text or json (default: $LOG_FORMAT or text)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Directory for downloaded archive files
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run(cli.run));

    let mut log_config = LogConfig::from_env()?;
    if let Command::Run(args) = &command {
        log_config.error_file = args.log;
        if let Some(format) = args.log_format {
            log_config.format = format;
        }
    }
    let _guard = init_logging(&log_config)?;

    let config = PipelineConfig::from_env();

    match command {
        Command::Run(args) => run_etl(&config, args).await,
        Command::Migrate => {
            let pool = db::connect(config.database_url()?).await?;
            db::run_migrations(&pool).await?;
            info!("Database migrations applied");
            Ok(())
        }
        Command::DbSeed(args) => {
            let pool = db::connect(config.database_url()?).await?;
            if args.skip_migrations {
                warn!("Skipping migrations before seeding");
            } else {
                db::run_migrations(&pool).await?;
            }
            seed::run(&pool).await?;
            info!("Reference data seeded");
            Ok(())
        }
    }
}

async fn run_etl(config: &PipelineConfig, args: RunArgs) -> Result<()> {
    info!("Starting ETL...");

    let store: Arc<dyn InteractionStore> = if args.dry_run {
        warn!("Dry run: loading into an in-memory store");
        Arc::new(MemoryStore::seeded())
    } else {
        let pool = db::connect(config.database_url()?).await?;
        Arc::new(PgInteractionStore::new(pool))
    };
    let loader = Loader::new(store);

    if args.stream || args.replay.is_some() {
        run_stream_mode(config, &args, &loader).await
    } else {
        run_batch_mode(config, &args, &loader).await
    }
}

async fn run_batch_mode(config: &PipelineConfig, args: &RunArgs, loader: &Loader) -> Result<()> {
    let bucket = args
        .bucket
        .as_deref()
        .context("--bucket is required unless --stream is set")?;
    let data_dir = args.data_dir.clone().unwrap_or_else(|| config.data_dir.clone());

    let store = S3BucketStore::connect(config.bucket_config(bucket))
        .await
        .context("failed to configure the S3 client")?;
    let archive = ArchiveCollator::new(store, data_dir);
    let rows = archive
        .fetch_collated_rows(args.rows)
        .await
        .with_context(|| format!("failed to collate archive from bucket {bucket}"))?;

    let progress = ProgressBar::new(rows.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len}")
            .context("invalid progress bar template")?
            .progress_chars("#>-"),
    );
    progress.set_message("Uploading Rows...");

    let summary = run_batch(loader, &rows, args.rows, |_| progress.inc(1)).await;
    progress.finish_and_clear();
    let summary = summary?;

    info!(%summary, "All data uploaded!");
    Ok(())
}

async fn run_stream_mode(config: &PipelineConfig, args: &RunArgs, loader: &Loader) -> Result<()> {
    let mut source = open_source(config, args).await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current poll");
            let _ = stop_tx.send(true);
        }
    });

    let options = StreamOptions {
        cap: args.rows.map(|rows| rows as u64),
        cap_by: args.cap_by,
        ..StreamOptions::default()
    };
    let summary = run_stream(loader, source.as_mut(), &options, stop_rx).await?;

    info!(
        polls = summary.polls,
        messages = summary.messages,
        summary = %summary.load,
        "Stream closed"
    );
    Ok(())
}

async fn open_source(config: &PipelineConfig, args: &RunArgs) -> Result<Box<dyn StreamSource>> {
    match &args.replay {
        Some(path) if path.as_os_str() == "-" => Ok(Box::new(ReplaySource::stdin())),
        Some(path) => {
            let source = ReplaySource::open(path)
                .await
                .with_context(|| format!("failed to open replay file {}", path.display()))?;
            Ok(Box::new(source))
        }
        None => open_kafka(config),
    }
}

#[cfg(feature = "kafka")]
fn open_kafka(config: &PipelineConfig) -> Result<Box<dyn StreamSource>> {
    let source = lmnh_core::source::KafkaSource::subscribe(&config.kafka)
        .context("failed to subscribe to the Kafka topic")?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "kafka"))]
fn open_kafka(_config: &PipelineConfig) -> Result<Box<dyn StreamSource>> {
    anyhow::bail!("this build has no Kafka support; rebuild with --features kafka or pass --replay")
}
