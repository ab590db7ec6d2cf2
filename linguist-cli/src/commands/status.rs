use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use linguist_core::store::{ResultStore, SqliteStore};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// SQLite database path (overrides [store] path)
    #[arg(long)]
    pub db_path: Option<PathBuf>,
    /// Print the stats as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: StatusArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config, args.db_path.as_ref())?;
    let db_path = super::require_store_path(&config)?;
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Cannot open database: {}", db_path.display()))?;

    let stats = store.stats().await.context("Failed to read store stats")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Linguist status");
    println!();
    println!("  Database: {}", db_path.display());
    if stats.db_size_bytes > 0 {
        println!("  Size:     {}", super::format_bytes(stats.db_size_bytes));
    }
    println!();
    println!("  Results:  {}", stats.total_results);
    if stats.partial_results > 0 {
        println!("  Partial:  {}", stats.partial_results);
    }
    match (stats.oldest_computed_at, stats.newest_computed_at) {
        (Some(oldest), Some(newest)) => {
            println!("  Oldest:   {}", oldest.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("  Newest:   {}", newest.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        _ => println!("  No results stored yet."),
    }
    Ok(())
}
