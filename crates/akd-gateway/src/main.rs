mod bootstrap;
mod broadcast;
mod cli;
mod commands;
mod daemon;
mod permission;
mod sink;
mod turn;
mod ws;

use std::sync::Arc;

use axum::routing::get;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use akd_domain::config::{Config, LogFormat};
use cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = Cli::parse();

    match parsed.command {
        None | Some(Command::Serve) => {
            let (config, _path) = cli::load_config()?;
            init_tracing(&config);
            run_server(Arc::new(config)).await
        }
        Some(Command::Chat { cwd }) => {
            let (config, _path) = cli::load_config()?;
            init_tracing(&config);
            cli::chat::chat(Arc::new(config), cwd).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, path) = cli::load_config()?;
            if !cli::config::validate(&config, &path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _path) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("akd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.tracing.filter.clone()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.tracing.format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("akd starting");

    let daemon = bootstrap::build_daemon(config.clone()).await?;

    let app = axum::Router::new()
        .route("/v1/ws", get(ws::client_ws))
        .with_state(daemon.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "akd listening");

    let shutdown_daemon = daemon.clone();
    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown_daemon.shutdown().await;
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
