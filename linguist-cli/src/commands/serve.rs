use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use linguist_core::service::LinguistService;
use linguist_http::AppState;
use tokio::sync::watch;
use tracing::info;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides [server] host)
    #[arg(long)]
    pub host: Option<String>,
    /// Port to bind (overrides [server] port)
    #[arg(long)]
    pub port: Option<u16>,
    /// SQLite database path (overrides [store] path)
    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

pub async fn run(args: ServeArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let mut config = super::load_config(config, args.db_path.as_ref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let mut service = LinguistService::from_config(&config).context("Cannot start service")?;
    let queue = service
        .take_refresh_queue()
        .context("Refresh queue already taken")?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind {addr}"))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = service.scheduler.clone().spawn(queue, shutdown_rx);

    let state = AppState::new(service.facade.clone());
    let mut http_shutdown = shutdown_tx.subscribe();
    let server = tokio::spawn(linguist_http::serve(listener, state, async move {
        let _ = http_shutdown.wait_for(|stop| *stop).await;
    }));

    tokio::signal::ctrl_c()
        .await
        .context("Cannot listen for shutdown signal")?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    scheduler.await.context("Scheduler task failed")?;
    server
        .await
        .context("HTTP server task failed")?
        .context("HTTP server error")?;
    Ok(())
}
