use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scalemb_core::config::{Config, Endpoints};
use scalemb_core::loader::{self, SourceEncoding};
use scalemb_core::normalize::{normalize, NormalizeOptions};
use scalemb_core::pipeline::{ImportPipeline, RunReport, RunRequest};
use scalemb_core::{sink, ItemTable, OverwritePolicy, Pooling, ProviderConfig, ProviderKind};
use scalemb_providers::{ProviderRegistry, ProviderSettings};

/// Embed psychometric scale items with remote or local models and write one
/// CSV per provider configuration.
#[derive(Parser, Debug)]
#[command(name = "scalemb", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every entry of the `[[runs]]` registry in a config file.
    Import(ImportArgs),
    /// Run a single provider configuration given on the command line.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
    /// Only run entries with this output name (repeatable).
    #[arg(long)]
    only: Vec<String>,
    /// Replace existing outputs instead of refusing to write.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    source: PathBuf,
    #[arg(long, default_value = "utf8")]
    encoding: SourceEncoding,
    #[arg(long)]
    provider: ProviderKind,
    #[arg(long)]
    model: String,
    #[arg(long)]
    language: String,
    /// Language code of an `item_<code>` column in the source (repeatable; default de, en).
    #[arg(long = "source-language")]
    source_languages: Vec<String>,
    /// Keep only rows of this scale (repeatable; default keeps all).
    #[arg(long = "scale")]
    scales: Vec<String>,
    /// Remove this column before embedding (repeatable).
    #[arg(long = "drop")]
    drop_columns: Vec<String>,
    #[arg(long)]
    dimensions: Option<usize>,
    #[arg(long)]
    pooling: Option<Pooling>,
    #[arg(long, allow_negative_numbers = true)]
    layer: Option<i32>,
    /// Cohere `input_type`, Gecko `task_type` or Aleph Alpha representation.
    #[arg(long)]
    task: Option<String>,
    #[arg(long)]
    output: PathBuf,
    #[arg(long)]
    overwrite: bool,
    #[arg(long, default_value_t = 1)]
    workers: usize,
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// Root directory searched for local models.
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

impl RunArgs {
    fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.provider,
            model: self.model.clone(),
            dimensions: self.dimensions,
            pooling: self.pooling,
            layer: self.layer,
            task: self.task.clone(),
        }
    }

    fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions::new(self.language.clone())
            .languages(self.source_languages.iter().cloned())
            .keep_scales(self.scales.iter().cloned())
            .drop_columns(self.drop_columns.iter().cloned())
    }

    fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            workers: self.workers.max(1),
            endpoints: Endpoints::default(),
            model_dir: self.model_dir.clone(),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Normalizes `table` for one run, then embeds and writes it.
fn run_one(
    registry: &mut ProviderRegistry,
    table: &ItemTable,
    options: &NormalizeOptions,
    request: &RunRequest,
) -> Result<RunReport> {
    // Refuse early so an existing artifact never costs a model load.
    sink::check_destination(&request.destination, request.policy)?;
    let normalized = normalize(table, options)?;
    let provider = registry.get(&request.config)?;
    let report = ImportPipeline::new(provider).run(&normalized, request)?;
    println!(
        "✅ {} {} → {} ({} items, d={})",
        request.config.provider,
        request.config.model,
        report.destination.display(),
        report.rows,
        report.dimension
    );
    Ok(report)
}

fn import(args: ImportArgs) -> Result<()> {
    if !args.config.is_file() {
        bail!("config file not found: {}", args.config.display());
    }
    let config = Config::load_from(&args.config)?;
    let cfg = config.import().with_context(|| format!("reading {}", args.config.display()))?;
    let runs: Vec<_> = cfg
        .runs
        .iter()
        .filter(|r| args.only.is_empty() || args.only.iter().any(|o| o == &r.output))
        .collect();
    if runs.is_empty() {
        bail!("no run writes any of {:?}", args.only);
    }

    let table = loader::load(&cfg.source.path, cfg.source.encoding)?;
    let mut registry = ProviderRegistry::new(ProviderSettings::from(&cfg));
    info!(runs = runs.len(), items = table.len(), "starting import");
    for run in runs {
        let policy = if args.overwrite { OverwritePolicy::Overwrite } else { run.policy() };
        let request = RunRequest { config: run.provider_config(), destination: cfg.output_path(run), policy };
        run_one(&mut registry, &table, &run.normalize_options(&cfg.source), &request)
            .with_context(|| format!("run '{}' ({} {})", run.output, run.provider, run.model))?;
    }
    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let table = loader::load(&args.source, args.encoding)?;
    let mut registry = ProviderRegistry::new(args.settings());
    let request = RunRequest {
        config: args.provider_config(),
        destination: args.output.clone(),
        policy: OverwritePolicy::from_flag(args.overwrite),
    };
    run_one(&mut registry, &table, &args.normalize_options(), &request)?;
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Import(args) => import(args),
        Command::Run(args) => run(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<scalemb_core::Error>() {
                Some(e) => eprintln!("❌ {} failed: {:#}", e.stage(), err),
                None => eprintln!("❌ {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
