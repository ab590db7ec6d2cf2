pub mod analyze;
pub mod serve;
pub mod show;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use linguist_core::config::LinguistConfig;
use tracing::debug;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "linguist.toml";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the scheduler and the HTTP API
    Serve(serve::ServeArgs),
    /// Run one analysis tick now and print the outcome
    Analyze(analyze::AnalyzeArgs),
    /// Show the stored language breakdown for an entity
    Show(show::ShowArgs),
    /// Summarize the result store
    Status(status::StatusArgs),
}

pub async fn run(cmd: Command, config: Option<&Path>) -> anyhow::Result<()> {
    match cmd {
        Command::Serve(args) => serve::run(args, config).await,
        Command::Analyze(args) => analyze::run(args, config).await,
        Command::Show(args) => show::run(args, config).await,
        Command::Status(args) => status::run(args, config).await,
    }
}

/// Load the explicit config file, else `./linguist.toml`, else defaults.
/// A `--db-path` override replaces `[store] path`.
pub fn load_config(
    path: Option<&Path>,
    db_path: Option<&PathBuf>,
) -> anyhow::Result<LinguistConfig> {
    let mut config = match path {
        Some(path) => LinguistConfig::load(path)
            .with_context(|| format!("Cannot load config: {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            LinguistConfig::load(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("Cannot load config: {DEFAULT_CONFIG_FILE}"))?
        }
        None => {
            debug!("No config file, using defaults");
            LinguistConfig::default()
        }
    };
    if let Some(db_path) = db_path {
        config.store.path = Some(db_path.clone());
    }
    Ok(config)
}

/// Resolve the store path for read-only commands, which need a file.
pub fn require_store_path(config: &LinguistConfig) -> anyhow::Result<PathBuf> {
    let path = config
        .store
        .path
        .clone()
        .context("No database configured: set [store] path in the config or pass --db-path")?;
    if !path.exists() {
        anyhow::bail!("Database not found: {}", path.display());
    }
    Ok(path)
}

#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
