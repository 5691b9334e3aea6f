//! Main application entry point for the lobby server
//!
//! Loads configuration, sets up logging, starts the game listener and the
//! monitoring endpoints, then waits for a termination signal.

mod cli;
mod config;
mod logging;
mod monitor;
mod signals;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::CliArgs;
use config::AppConfig;
use lobby_core::{create_server_with_config, GameServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Upper bound for the server to finish its cleanup after a signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Main application struct
pub struct Application {
    config: AppConfig,
    server: Arc<GameServer>,
}

impl Application {
    /// Loads configuration, applies CLI overrides and initializes logging.
    pub async fn new(args: CliArgs) -> Result<Self> {
        // Load configuration first (before logging setup)
        let mut config = AppConfig::load_from_file(&args.config).await?;
        config.apply_cli(&args);

        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;

        logging::setup_logging(&config.logging)?;

        let server = create_server_with_config(config.to_server_config()?);
        info!(
            "🚀 Lobby server v{} | Config: {}",
            env!("CARGO_PKG_VERSION"),
            args.config.display()
        );

        Ok(Self {
            config,
            server: Arc::new(server),
        })
    }

    /// Runs until a shutdown signal arrives.
    pub async fn run(self) -> Result<()> {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!("  ⏱️ Idle timeout: {}s", self.config.server.idle_timeout_secs);

        let listeners = self.server.bind_listeners()?;
        let server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move {
                match server.serve(listeners).await {
                    Ok(()) => info!("✅ Server completed successfully"),
                    Err(e) => error!("❌ Server error: {}", e),
                }
            })
        };

        let (monitor_stop, monitor_handle) = if self.config.monitor.enabled {
            let addr = self.config.monitor_address()?;
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind monitoring address {addr}"))?;
            let (stop_tx, stop_rx) = oneshot::channel::<()>();
            let handle = tokio::spawn(monitor::serve(
                listener,
                self.server.get_lobby(),
                async move {
                    let _ = stop_rx.await;
                },
            ));
            (Some(stop_tx), Some(handle))
        } else {
            info!("Monitoring endpoints disabled");
            (None, None)
        };

        info!("✅ Lobby server is now running!");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        signals::wait_for_shutdown_signal().await?;

        info!("🛑 Shutdown signal received, initiating graceful shutdown...");
        self.server.shutdown().await?;
        if let Some(stop) = monitor_stop {
            let _ = stop.send(());
        }

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, server_handle).await.is_err() {
            warn!("Server did not stop within {:?}", SHUTDOWN_TIMEOUT);
        }
        if let Some(handle) = monitor_handle {
            match handle.await {
                Ok(Err(e)) => warn!("Monitoring server error: {}", e),
                Err(e) => warn!("Monitoring task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }

        info!("👋 Lobby server shutdown complete");
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let app = match Application::new(args).await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run().await {
        error!("❌ Application error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
