//! wagerhub-tail - Main Entry Point
//!
//! Connects to the WagerHub platform, follows live balance and transaction
//! pushes, and prints them until interrupted.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use wagerhub_client::config;
use wagerhub_client::gateway::messages::topics;
use wagerhub_client::gateway::{GatewayConfig, StaticTokenProvider, WsGateway};
use wagerhub_client::wallet::WalletBalanceStore;
use wagerhub_client::{CancelFlag, RestClient};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Bearer token for the platform (overrides config/env)
    #[arg(long, env = "WAGERHUB_AUTH_TOKEN")]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting wagerhub-tail");

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let mut app_config = config::load_config(Some(&args.config))
        .or_else(|_| config::load_from_env())
        .unwrap_or_default();
    if args.token.is_some() {
        app_config.platform.auth_token = args.token;
    }

    let token = app_config
        .platform
        .auth_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("no auth token (set WAGERHUB_AUTH_TOKEN)"))?;

    let rest = Arc::new(RestClient::new(
        &app_config.platform.api_url,
        Arc::new(StaticTokenProvider::new(token.clone())),
    )?);

    let gateway = Arc::new(WsGateway::new(
        GatewayConfig::new(app_config.platform.ws_url.clone()).with_reconnect_delay(
            std::time::Duration::from_millis(app_config.settings.reconnect_delay_ms),
        ),
    ));

    let store = Arc::new(WalletBalanceStore::new(rest.clone()));
    store.attach(&gateway);
    store.subscribe(|snapshot| {
        if let Some(balance) = snapshot.balance {
            println!("balance: {}", balance);
        }
    });
    gateway.subscribe(topics::TRANSACTION, |frame| {
        println!("transaction: {}", frame);
    });

    gateway.connect(token);

    let cancel = CancelFlag::new();
    if let Err(e) = store.refresh(&cancel).await {
        info!("Initial balance fetch failed (will rely on pushes): {}", e);
    }

    // Keep the application running
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, cleaning up...");
    gateway.disconnect();

    Ok(())
}
