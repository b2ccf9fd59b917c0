//! Gateway binary.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use usermgmt_auth::TokenService;
use usermgmt_core::config::{GatewayConfig, DEFAULT_CONFIG_FILE};
use usermgmt_directory::{DirectoryClient, DirectoryConfig};
use usermgmt_server::{build_router, server, AppState};

#[derive(Debug, Parser)]
#[command(name = "usermgmt-server", version, about = "Directory user management gateway")]
struct Cli {
    /// Configuration file; `UM_*` environment variables override its values.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,usermgmt_server=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = GatewayConfig::load(&cli.config).context("invalid configuration")?;
    info!(?config, "configuration loaded");

    let tokens = TokenService::from_files(&config.keys).context("failed to load token keys")?;
    let directory = DirectoryConfig::from_settings(&config.directory)
        .context("invalid directory settings")?;

    let state = AppState::new(
        DirectoryClient::new(directory),
        tokens,
        config.protected.clone(),
    );
    let app = build_router(state, config.server.login_rate_limit);

    server::serve(app, &config.server).await
}
