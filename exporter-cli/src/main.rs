mod cli;
mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fritzbox_cable::Exporter;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Args, LogFormat};
use crate::server::MetricsServer;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    // Values from .env are visible to clap's env fallbacks.
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        router = %args.scrape_uri,
        "starting fritzcable-exporter"
    );

    let exporter = Exporter::new(args.router_config()).context("failed to set up the exporter")?;
    let server = MetricsServer::new(args.bind_address(), args.telemetry_path(), Arc::new(exporter));

    let cancel_token = server.cancel_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_token.cancel();
    });

    server.run().await
}

fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level `{level}`"))?,
    };

    let subscriber = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => subscriber.with(fmt::layer().with_target(false)).try_init()?,
        LogFormat::Json => subscriber.with(fmt::layer().json()).try_init()?,
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
