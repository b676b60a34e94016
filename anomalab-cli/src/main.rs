//! anomalab CLI: run anomaly-detection benchmarks from the terminal.

mod commands;

use anomalab_ml::ModelFamily;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// anomalab: grid-searched AUC-ROC benchmarks for unsupervised outlier detectors
#[derive(Parser, Debug)]
#[command(name = "anomalab", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (dataset paths and the output dir resolve against it)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run the grid search and export the result tables
    Run {
        /// Output directory (overrides `output.dir`)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only run these datasets (repeatable)
        #[arg(short, long = "dataset")]
        datasets: Vec<String>,
        /// Only run these model families (repeatable): iforest, lof, knn, hbos, ecod
        #[arg(short, long = "model")]
        models: Vec<ModelFamily>,
    },
    /// Load every configured dataset and print its shape
    Datasets,
    /// List model families and the grids that would be searched
    Models,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Write a default `.anomalab/config.toml` in the workspace
    Init,
    /// Print the effective merged configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)));

    let log_dir = directories::ProjectDirs::from("dev", "anomalab", "anomalab")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "anomalab.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let ctx = commands::Context {
        workspace,
        config_path: cli.config,
    };
    commands::handle_command(cli.command, &ctx).await
}
