//! CLI for the municipal finance report ETL.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fiscus_config::{validate_settings, Settings};
use fiscus_extract::{CacheOnlyBackend, InterimCache, JsonWordExtractor, LocalTokens, PollConfig, RemoteTokens};
use fiscus_reports::register_builtin;
use fiscus_runtime::{run_batch, Context, Registry, ReportParams, RunOptions};

#[derive(Parser)]
#[command(name = "fiscus")]
#[command(about = "Municipal finance report ETL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML settings file; defaults to the environment
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ETL for one report family
    Etl {
        /// Registered report name, e.g. CityTaxCollections
        report: String,

        /// Fiscal year, e.g. 2021
        #[arg(long)]
        fiscal_year: Option<i32>,

        /// Fiscal quarter, 1 through 4
        #[arg(long)]
        quarter: Option<u32>,

        /// Calendar year
        #[arg(long)]
        year: Option<i32>,

        /// Calendar month, 1 through 12
        #[arg(long)]
        month: Option<u32>,

        /// Budget flavor: adopted or proposed
        #[arg(long)]
        kind: Option<String>,

        /// Do not save any new files
        #[arg(long)]
        dry_run: bool,

        /// Do not validate the data
        #[arg(long)]
        no_validate: bool,

        /// Only extract the data (do not transform/load)
        #[arg(long)]
        extract_only: bool,

        /// Re-process files whose outputs are already up to date
        #[arg(long)]
        force: bool,
    },

    /// List the registered report families
    List,

    /// Validate the settings file given with --config
    ValidateConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Etl {
            report,
            fiscal_year,
            quarter,
            year,
            month,
            kind,
            dry_run,
            no_validate,
            extract_only,
            force,
        } => {
            let params = ReportParams {
                fiscal_year,
                quarter,
                year,
                month,
                kind: kind
                    .as_deref()
                    .map(|k| k.parse::<fiscus_runtime::BudgetKind>())
                    .transpose()?,
            };
            let options = RunOptions {
                dry_run,
                no_validate,
                extract_only,
                force,
            };
            let settings = match &cli.config {
                Some(path) => Settings::from_yaml_file(path)?,
                None => Settings::from_env(),
            };
            run_etl(settings, &report, params, options)
        }
        Commands::List => {
            let registry = builtin_registry()?;
            for group in [
                fiscus_runtime::ReportGroup::Collections,
                fiscus_runtime::ReportGroup::Qcmr,
                fiscus_runtime::ReportGroup::Budget,
            ] {
                println!("{}:", group.as_str());
                for entry in registry.by_group(group) {
                    println!(
                        "  {:<28} {}  [{}]",
                        entry.descriptor.name,
                        entry.descriptor.description,
                        entry.descriptor.params.describe()
                    );
                }
            }
            Ok(())
        }
        Commands::ValidateConfig => {
            let config = cli
                .config
                .as_ref()
                .ok_or_else(|| anyhow!("validate-config requires --config"))?;
            let settings = Settings::from_yaml_file(config)?;
            let result = validate_settings(&settings);
            for warning in &result.warnings {
                println!("warning: {warning}");
            }
            if result.is_valid() {
                println!("Configuration OK");
                Ok(())
            } else {
                for error in &result.errors {
                    eprintln!("error: {error}");
                }
                bail!("configuration invalid");
            }
        }
    }
}

fn builtin_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    register_builtin(&mut registry)?;
    Ok(registry)
}

fn build_context(settings: Settings) -> Result<Context> {
    let tokens = LocalTokens::new(JsonWordExtractor);
    let cache = InterimCache::new(&settings.data.interim);
    let poll = PollConfig {
        interval: Duration::from_secs(settings.remote.poll_interval_secs),
        deadline: Duration::from_secs(settings.remote.deadline_secs),
        max_retries: settings.remote.max_retries,
    };
    let tables = RemoteTokens::new(CacheOnlyBackend::new(&settings.data.interim))
        .with_cache(cache)
        .with_poll_config(poll);
    Ok(Context::new(settings, Box::new(tokens), Box::new(tables))?)
}

fn run_etl(
    settings: Settings,
    report: &str,
    params: ReportParams,
    options: RunOptions,
) -> Result<()> {
    let registry = builtin_registry()?;
    let entry = registry.get(report).ok_or_else(|| {
        anyhow!(
            "unknown report '{report}'; available: {}",
            registry.names().join(", ")
        )
    })?;

    let ctx = build_context(settings)?;
    let summary = run_batch(entry, &ctx, &params, &options)?;
    if summary.processed.is_empty() && summary.fresh == 0 {
        bail!(
            "no raw files matched for '{report}' ({})",
            entry.descriptor.params.describe()
        );
    }
    for processed in &summary.processed {
        tracing::info!(report, params = %processed, "finished");
    }
    if summary.fresh > 0 || summary.skipped > 0 {
        tracing::info!(
            report,
            fresh = summary.fresh,
            skipped = summary.skipped,
            "some files were skipped"
        );
    }
    Ok(())
}
