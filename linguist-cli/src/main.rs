use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use linguist_core::error::{ConfigError, LinguistError};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "linguist",
    version,
    about = "Scheduled, cache-backed language breakdowns for catalog entities"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Config file (default: ./linguist.toml when present)
    #[arg(short, long, global = true, env = "LINGUIST_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

const EXIT_GENERAL: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_DATABASE: u8 = 4;
const EXIT_CATALOG: u8 = 5;

/// Exit code for a failed command. Typed errors anywhere in the chain win;
/// otherwise the rendered message is matched.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    let typed = err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<LinguistError>() {
            return Some(match e {
                LinguistError::Config(_) => EXIT_CONFIG,
                LinguistError::Store(_) => EXIT_DATABASE,
                LinguistError::Catalog(_) => EXIT_CATALOG,
                LinguistError::Analysis(_) => EXIT_GENERAL,
            });
        }
        cause.downcast_ref::<ConfigError>().map(|_| EXIT_CONFIG)
    });
    if let Some(code) = typed {
        return code;
    }

    let message = format!("{err:#}").to_lowercase();
    [
        ("config", EXIT_CONFIG),
        ("database", EXIT_DATABASE),
        ("sqlite", EXIT_DATABASE),
        ("catalog", EXIT_CATALOG),
    ]
    .into_iter()
    .find(|(needle, _)| message.contains(needle))
    .map_or(EXIT_GENERAL, |(_, code)| code)
}

/// Logs go to stderr so `--json` output stays clean. `RUST_LOG` overrides
/// the flags.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: cannot start async runtime: {e}");
            return ExitCode::from(EXIT_GENERAL);
        }
    };

    match runtime.block_on(commands::run(cli.command, cli.config.as_deref())) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}
