//! Hearth HTTP server
//!
//! Run with: hearth-server

use std::sync::Arc;

use clap::Parser;

use hearth::config::{init_logging, ConfigArgs};
use hearth::HearthRuntime;

#[derive(Parser, Debug)]
#[command(name = "hearth-server")]
#[command(about = "Hearth dashboard data server")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "HEARTH_LISTEN_ADDR", default_value = "0.0.0.0:3030")]
    listen: String,

    /// Do not run scheduled sweeps (manual POST /sync still works)
    #[arg(long, env = "HEARTH_NO_SCHEDULER")]
    no_scheduler: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.config.log_json);

    let no_scheduler = args.no_scheduler;
    let config = args.config.into_config(Some(args.listen));
    let runtime = Arc::new(HearthRuntime::from_config(config)?);

    // Settle the mode before serving the first request
    let probed = runtime.probe().probe_registered().await;
    tracing::info!(
        "Starting in {} mode ({} service(s) probed)",
        runtime.mode().current_mode(),
        probed.len()
    );

    if !no_scheduler {
        runtime.scheduler().start(runtime.config().sync_interval())?;
    }

    let listener = tokio::net::TcpListener::bind(&runtime.config().listen_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    let app = hearth::api::router(runtime.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runtime.scheduler().stop().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
