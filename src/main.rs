//! PortNote - Entry Point
//!
//! Modes:
//! - Default: dashboard server (optionally with the scan agent embedded)
//! - --agent / -a: scan agent only

use portnote::dashboard::shutdown_signal;
use portnote::{AuthState, Config, DashboardServer, ScanAgent, Store};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let agent_mode = args.iter().any(|a| a == "--agent" || a == "-a");
    let json_logs = args.iter().any(|a| a == "--json");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("PortNote v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: portnote [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --agent, -a   Run the scan agent only");
        println!("  --json        Log as JSON lines");
        println!("  --help, -h    Show this help");
        println!();
        println!("Default: Run the dashboard server");
        println!();
        println!("Environment variables:");
        println!("  JWT_SECRET            Token signing key");
        println!("  USER_SECRET           Claim embedded in session tokens");
        println!("  LOGIN_USERNAME        Dashboard login name");
        println!("  LOGIN_PASSWORD        Dashboard login password");
        println!("  PORTNOTE_DB_PATH      SQLite database file");
        println!("  PORTNOTE_BIND_ADDR    Bind address (default: 127.0.0.1)");
        println!("  PORTNOTE_PORT         HTTP port (default: 3000)");
        println!("  PORTNOTE_REQUIRE_AUTH Require a token on the inventory API");
        println!("  PORTNOTE_SCAN_AGENT   Run the scan agent inside the server");
        return Ok(());
    }

    // Setup logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env();
    let store = Arc::new(Store::open(&config.db_path)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if agent_mode {
        info!("PortNote scan agent v{}", env!("CARGO_PKG_VERSION"));

        let agent = Arc::new(ScanAgent::new(store, config.scanner));
        let handle = tokio::spawn(agent.run(shutdown_rx));

        shutdown_signal().await;
        shutdown_tx.send(true)?;
        handle.await?;
        return Ok(());
    }

    info!("PortNote v{}", env!("CARGO_PKG_VERSION"));

    let agent_handle = if config.scan_agent_enabled {
        let agent = Arc::new(ScanAgent::new(store.clone(), config.scanner));
        Some(tokio::spawn(agent.run(shutdown_rx)))
    } else {
        None
    };

    let auth = Arc::new(AuthState::new(config.auth)?);
    let server = DashboardServer::new(config.dashboard, store, auth);
    let result = server.run().await;

    shutdown_tx.send(true).ok();
    if let Some(handle) = agent_handle {
        handle.await?;
    }

    result
}
