use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use linguist_core::staleness::is_fresh;
use linguist_core::store::{ResultStore, SqliteStore};
use linguist_core::types::{EntityRef, StatUnit};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Entity reference, e.g. component:default/web
    pub entity_ref: String,
    /// SQLite database path (overrides [store] path)
    #[arg(long)]
    pub db_path: Option<PathBuf>,
    /// Print the stored result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ShowArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config, args.db_path.as_ref())?;
    let db_path = super::require_store_path(&config)?;
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Cannot open database: {}", db_path.display()))?;

    let entity_ref = EntityRef::from(args.entity_ref.trim());
    let result = store
        .read(&entity_ref)
        .await?
        .with_context(|| format!("No language data for {entity_ref}"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let fresh = is_fresh(
        Some(&result),
        config.cache.max_age.as_duration(),
        chrono::Utc::now(),
    );
    println!("Languages for {entity_ref}");
    println!();
    println!(
        "  Computed: {}{}",
        result.computed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        if fresh { "" } else { " (stale)" }
    );
    if let Some(location) = &result.source_location_used {
        println!("  Source:   {location}");
    }
    println!(
        "  Files:    {}{}",
        result.files_analyzed,
        if result.is_partial() {
            format!(" ({} unreadable)", result.unreadable_files)
        } else {
            String::new()
        }
    );
    println!();
    for stat in &result.stats {
        let amount = match (result.unit, stat.lines) {
            (StatUnit::Lines, Some(lines)) => format!("{lines} lines"),
            _ => super::format_bytes(stat.bytes),
        };
        println!(
            "  {:<24} {:>7.2}%  {amount}",
            stat.language, stat.percentage
        );
    }
    Ok(())
}
