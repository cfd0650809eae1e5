mod cli;
mod runtime;
mod stub;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use bot_core::config::BotConfig;
use cli::{Cli, Commands};
use runtime::Runtime;
use stub::{InMemoryConfigStore, StubTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "bot_gateway=info".into()),
        )
        .init();

    match cli.command {
        Commands::ShowConfig { config } => {
            let config = load_config(config.as_deref());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Serve { config } => serve(load_config(config.as_deref())).await,
    }
}

fn load_config(config_path: Option<&std::path::Path>) -> BotConfig {
    let path = config_path.and_then(|p| p.to_str());
    BotConfig::load(path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config load failed, falling back to defaults");
        BotConfig::default()
    })
}

async fn serve(config: BotConfig) -> anyhow::Result<()> {
    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    // No production bot-definition store ships in this crate; the
    // in-memory stub is what `serve` runs against until one is wired in.
    let config_store = Arc::new(InMemoryConfigStore::new());
    let runtime = Runtime::new(&config, config_store, None);
    runtime.register_transport(StubTransport::new("default"));

    info!(bind, port, "bot-gateway runtime ready");

    shutdown_signal().await;
    runtime.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
