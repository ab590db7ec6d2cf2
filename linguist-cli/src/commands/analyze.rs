use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use linguist_core::catalog;
use linguist_core::clock::SystemClock;
use linguist_core::progress::{IndicatifReporter, NoopReporter, ProgressReporter};
use linguist_core::scheduler::{TickReport, TickStatus};
use linguist_core::service::LinguistService;
use linguist_core::store::{ResultStore, SqliteStore};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Discard stored results first so every tracked entity is re-analyzed
    #[arg(long)]
    pub force: bool,
    /// Maximum entities to analyze (overrides [schedule] batch_size)
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// SQLite database path (overrides [store] path)
    #[arg(long)]
    pub db_path: Option<PathBuf>,
    /// Print the tick report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: AnalyzeArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let mut config = super::load_config(config, args.db_path.as_ref())?;
    if let Some(batch_size) = args.batch_size {
        config.schedule.batch_size = batch_size;
    }
    config.validate().context("Invalid config")?;

    let store: Arc<dyn ResultStore> = match &config.store.path {
        Some(path) => Arc::new(
            SqliteStore::open(path)
                .with_context(|| format!("Cannot open database: {}", path.display()))?,
        ),
        None => Arc::new(SqliteStore::in_memory().context("Cannot open database")?),
    };
    let catalog = catalog::from_config(&config);

    if args.force {
        let entities = catalog
            .list_tracked_entities()
            .await
            .context("Cannot list catalog entities")?;
        for entity in &entities {
            store.delete(&entity.entity_ref).await?;
        }
    }

    let service = LinguistService::assemble(&config, store, catalog, Arc::new(SystemClock))
        .context("Cannot start service")?;

    let reporter: Box<dyn ProgressReporter> = if args.json {
        Box::new(NoopReporter)
    } else {
        Box::new(IndicatifReporter::new())
    };
    let report = service
        .scheduler
        .run_tick(reporter.as_ref())
        .await
        .context("Tick failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &TickReport) {
    match report.status {
        TickStatus::LeaseHeldElsewhere => {
            println!("Another instance holds the tick lease; nothing analyzed.");
            return;
        }
        TickStatus::SkippedRunning => {
            println!("A tick is already running; nothing analyzed.");
            return;
        }
        TickStatus::Completed | TickStatus::TimedOut => {}
    }

    println!("Analysis tick #{}", report.tick);
    println!();
    println!("  Tracked:    {}", report.entities_seen);
    println!("  Stale:      {}", report.stale);
    println!("  Analyzed:   {}", report.stored);
    if report.superseded > 0 {
        println!("  Superseded: {}", report.superseded);
    }
    if report.abandoned > 0 {
        println!("  Abandoned:  {} (timed out, retried next run)", report.abandoned);
    }
    if !report.failures.is_empty() {
        println!();
        println!("  Failures:");
        for failure in &report.failures {
            println!(
                "    {:<40} {:<22} {}",
                failure.entity_ref.as_str(),
                failure.kind,
                failure.message
            );
        }
    }
}
