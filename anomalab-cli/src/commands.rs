//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use anomalab_ml::config::{WORKSPACE_DIR, workspace_config_path};
use anomalab_ml::training::format_params;
use anomalab_ml::{
    BenchConfig, DatasetCatalog, ExperimentRunner, Metric, ModelFamily, PivotTable, config_exists, export_all,
    load_config,
};
use anyhow::Context as _;
use std::path::{Path, PathBuf};

/// Paths every command resolves against.
#[derive(Debug, Clone)]
pub struct Context {
    pub workspace: PathBuf,
    pub config_path: Option<PathBuf>,
}

impl Context {
    fn load_config(&self) -> anyhow::Result<BenchConfig> {
        if self.config_path.is_none() && !config_exists(Some(&self.workspace)) {
            tracing::info!("No configuration file found, using built-in defaults (see `anomalab config init`)");
        }
        load_config(Some(&self.workspace), self.config_path.as_deref())
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
    }
}

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, ctx: &Context) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            output,
            datasets,
            models,
        } => handle_run(ctx, output, &datasets, &models).await,
        Commands::Datasets => handle_datasets(ctx).await,
        Commands::Models => handle_models(ctx),
        Commands::Config { action } => handle_config(action, ctx),
    }
}

async fn handle_run(
    ctx: &Context,
    output: Option<PathBuf>,
    datasets: &[String],
    models: &[ModelFamily],
) -> anyhow::Result<()> {
    let mut config = ctx.load_config()?;
    config.restrict(datasets, models)?;
    if let Some(dir) = output {
        config.output.dir = dir;
    }
    config.output.dir = resolve(&ctx.workspace, &config.output.dir);

    // Validates every grid before any dataset is read.
    let runner = ExperimentRunner::new(config.clone())?;
    let (loaded, catalog) = DatasetCatalog::load_all(&config.datasets, &ctx.workspace).await?;

    let output_config = config.output.clone();
    let (outcome, paths) = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let outcome = runner.run(&loaded, &catalog)?;
        let paths = export_all(&outcome, &output_config)?;
        Ok((outcome, paths))
    })
    .await
    .context("experiment task panicked")??;

    for metric in [Metric::Validation, Metric::Test] {
        println!("\n## {}\n", metric.title());
        print!("{}", PivotTable::from_outcome(&outcome, metric).render_markdown());
    }

    let failed: Vec<_> = outcome.failed_trials().collect();
    if !failed.is_empty() {
        println!("\n{} of {} trials failed:", failed.len(), outcome.records.len());
        for record in failed {
            println!(
                "  {} / {} ({}): {}",
                record.dataset,
                record.family.key(),
                format_params(&record.params),
                record.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    println!("\nResults written to:");
    for path in [&paths.validation, &paths.test, &paths.trials, &paths.manifest] {
        println!("  {}", path.display());
    }
    Ok(())
}

async fn handle_datasets(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let (_, catalog) = DatasetCatalog::load_all(&config.datasets, &ctx.workspace).await?;
    println!("| Dataset | Source | Rows | Features | Outliers | Ratio |");
    println!("|---|---|---:|---:|---:|---:|");
    for entry in catalog.list() {
        println!(
            "| {} | {} | {} | {} | {} | {:.4} |",
            entry.name,
            entry.source.kind(),
            entry.summary.rows,
            entry.summary.features,
            entry.summary.outliers,
            entry.summary.outlier_ratio
        );
    }
    Ok(())
}

fn handle_models(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    for family in ModelFamily::ALL {
        let Some(grid) = config.models.iter().find(|g| g.family == family) else {
            println!("{:<8} {:<8} (not configured)", family.key(), family.label());
            continue;
        };
        let sweep = grid.sweep();
        println!(
            "{:<8} {:<8} {} combination(s) - {}",
            family.key(),
            family.label(),
            sweep.len(),
            family.description()
        );
        for (key, values) in &sweep.params {
            let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            println!("    {key} = [{}]", rendered.join(", "));
        }
    }
    Ok(())
}

fn handle_config(action: ConfigAction, ctx: &Context) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = ctx.workspace.join(WORKSPACE_DIR);
            std::fs::create_dir_all(&config_dir)
                .with_context(|| format!("creating {}", config_dir.display()))?;

            let config_path = workspace_config_path(&ctx.workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&BenchConfig::default())?;
            std::fs::write(&config_path, &toml_str)
                .with_context(|| format!("writing {}", config_path.display()))?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            println!("{}", render_config(ctx)?);
            Ok(())
        }
    }
}

/// The effective merged configuration as TOML.
fn render_config(ctx: &Context) -> anyhow::Result<String> {
    let config = ctx.load_config()?;
    Ok(toml::to_string_pretty(&config)?)
}

/// Resolve a possibly relative path against the workspace.
fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        workspace.join(path)
    } else {
        path.to_path_buf()
    }
}
