use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use cms_loader::app::ports::RecordStore;
use cms_loader::app::{clear_all, LoadRun, LoadUseCase, NormalizeUseCase, VerificationReport, VerifyUseCase};
use cms_loader::config::{Config, StoreConfig};
use cms_loader::infra::{InMemoryStore, SupabaseStore};
use cms_loader::pipeline::normalize::NormalizeSummary;
use cms_loader::{logging, observability};

#[derive(Parser)]
#[command(name = "cms_loader")]
#[command(about = "Normalize CMS nursing-home exports and load them into Supabase")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./cms_loader.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the three raw exports into the handoff tables
    Normalize,
    /// Load the cleaned tables into the store
    Load {
        /// Delete existing rows (children first) before loading
        #[arg(long)]
        clear: bool,
        /// Rows per insert request
        #[arg(long)]
        batch_size: Option<usize>,
        /// Load into an in-memory store instead of the remote one
        #[arg(long)]
        dry_run: bool,
    },
    /// Normalize, load, then verify
    Run {
        #[arg(long)]
        clear: bool,
    },
    /// Report row counts and sample breakdowns from the store
    Verify,
    /// Delete every row from all collections
    Clear,
}

fn remote_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store_config = StoreConfig::from_env(config.request_timeout())?;
    info!("Using store at {}", store_config.base_url);
    Ok(Arc::new(SupabaseStore::new(store_config)?))
}

fn print_normalize(summaries: &[NormalizeSummary]) {
    for s in summaries {
        println!(
            "   {} rows: {} -> {} (removed {})",
            s.table,
            s.rows_before,
            s.rows_after,
            s.removed()
        );
    }
}

fn print_load(run: &LoadRun) {
    for report in &run.reports {
        let marker = if report.is_complete() { "✅" } else { "⚠️ " };
        println!(
            "{} {}: {}/{} rows inserted, {} batch errors in {:.1}s",
            marker,
            report.collection,
            report.accepted_rows,
            report.total_rows,
            report.failed_batches,
            report.elapsed.as_secs_f64()
        );
        for message in &report.error_messages {
            println!("   - {}", message);
        }
        if report.suppressed_errors > 0 {
            println!("   ... and {} more", report.suppressed_errors);
        }
    }
    println!("⏱️  Total time: {:.1}s", run.elapsed.as_secs_f64());
}

fn print_verify(report: &VerificationReport) {
    println!("\n📊 Row counts:");
    for (collection, count) in &report.counts {
        match count {
            Some(c) => println!("   {}: {} rows", collection, c),
            None => println!("   {}: unknown", collection),
        }
    }
    if !report.top_states.is_empty() {
        println!(
            "\n🗺️  Top states by facility count (from {} providers):",
            report.state_sample_size
        );
        for (state, count) in &report.top_states {
            println!("   {}: {} facilities", state, count);
        }
    }
    if !report.top_categories.is_empty() {
        println!(
            "\n📋 Top deficiency categories (sample of {}):",
            report.category_sample_size
        );
        for (category, count) in &report.top_categories {
            println!("   {}: {}", category, count);
        }
    }
    if !report.quality_samples.is_empty() {
        println!("\n🔎 Sample quality measures:");
        for sample in &report.quality_samples {
            println!(
                "   {}: score={}, national_avg={}",
                sample.measure_description, sample.score, sample.national_average
            );
        }
    }
}

async fn run_command(command: Commands, mut config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Normalize => {
            println!("🧹 Normalizing raw CMS exports...");
            let summaries = NormalizeUseCase::new(&config.paths.raw_dir, &config.paths.clean_dir).run()?;
            print_normalize(&summaries);
            println!("✅ Cleaned tables written to {}", config.paths.clean_dir.display());
        }
        Commands::Load {
            clear,
            batch_size,
            dry_run,
        } => {
            if let Some(size) = batch_size {
                config.loader.batch_size = size;
            }
            config.loader.clear_before_load |= clear;
            config.validate()?;

            let store: Arc<dyn RecordStore> = if dry_run {
                println!("🧪 Dry run: loading into an in-memory store");
                Arc::new(InMemoryStore::new())
            } else {
                remote_store(&config)?
            };

            println!("📤 Loading cleaned tables...");
            let run = LoadUseCase::new(store, config.loader_options(), &config.paths.clean_dir)
                .run()
                .await?;
            print_load(&run);
        }
        Commands::Run { clear } => {
            config.loader.clear_before_load |= clear;
            let store = remote_store(&config)?;

            println!("\n🧹 Step 1: Normalizing...");
            let summaries = NormalizeUseCase::new(&config.paths.raw_dir, &config.paths.clean_dir).run()?;
            print_normalize(&summaries);

            println!("\n📤 Step 2: Loading...");
            let run = LoadUseCase::new(store.clone(), config.loader_options(), &config.paths.clean_dir)
                .run()
                .await?;
            print_load(&run);

            println!("\n🔍 Step 3: Verifying...");
            let report = VerifyUseCase::new(store, config.verify.clone()).run().await;
            print_verify(&report);
        }
        Commands::Verify => {
            let store = remote_store(&config)?;
            let report = VerifyUseCase::new(store, config.verify.clone()).run().await;
            print_verify(&report);
        }
        Commands::Clear => {
            let store = remote_store(&config)?;
            println!("🗑️  Clearing all collections...");
            clear_all(store.as_ref()).await?;
            println!("✅ All collections cleared");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    if let Err(e) = observability::init() {
        warn!("Metrics disabled: {}", e);
    }

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("cms_run", run_id = %run_id);

    let outcome = run_command(cli.command, config).instrument(span).await;

    observability::metrics::load::run_finished();
    observability::push_to_gateway("cms_loader").await;

    if let Err(e) = &outcome {
        error!("Run failed: {:#}", e);
        println!("❌ Run failed: {:#}", e);
    }
    outcome
}
