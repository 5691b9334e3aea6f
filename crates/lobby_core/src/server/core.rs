//! Core lobby server implementation.
//!
//! This module contains the main `GameServer` struct: it binds the listeners,
//! runs the accept loops, hands each stream to the transport adapter and
//! keeps the idle reaper running until shutdown.

use crate::{
    config::ServerConfig,
    connection::handle_tcp_connection,
    error::ServerError,
    lobby::{Lobby, Presence},
    reaper::IdleReaper,
};
use futures::stream::{FuturesUnordered, StreamExt};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Notice sent to every session when the server stops.
pub const SHUTDOWN_NOTICE: &str = "Server is shutting down";

/// The lobby server.
///
/// `GameServer` owns the [`Lobby`] (registry, broadcaster, dispatcher), the
/// network listeners and the shutdown channel that stops the accept loops and
/// the idle reaper together.
pub struct GameServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Session lifecycle hub shared with every connection task
    lobby: Arc<Lobby>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl GameServer {
    /// Creates a new server with the specified configuration.
    pub fn new(config: ServerConfig) -> Self {
        let lobby = Arc::new(Lobby::new(config.max_connections));
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config,
            lobby,
            shutdown_sender,
        }
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.config.validate()?;
        info!("🚀 Starting lobby server on {}", self.config.bind_address);
        let listeners = self.bind_listeners()?;
        self.serve(listeners).await
    }

    /// Creates the TCP listeners for the configured address.
    ///
    /// With `use_reuse_port` enabled one listener per CPU core is bound to the
    /// same address so the kernel can spread incoming connections.
    pub fn bind_listeners(&self) -> Result<Vec<TcpListener>, ServerError> {
        let core_count = num_cpus::get();
        let num_acceptors = if self.config.use_reuse_port {
            core_count
        } else {
            1
        };

        info!(
            "🧠 Detected {} CPU cores, using {} acceptor(s)",
            core_count, num_acceptors
        );

        let mut listeners = Vec::with_capacity(num_acceptors);
        for i in 0..num_acceptors {
            let listener = bind_listener(self.config.bind_address, self.config.use_reuse_port)?;
            info!("✅ Listener {} bound on {}", i, self.config.bind_address);
            listeners.push(listener);
        }
        Ok(listeners)
    }

    /// Runs the accept loops and the idle reaper on already-bound listeners
    /// until [`GameServer::shutdown`] is called.
    pub async fn serve(&self, listeners: Vec<TcpListener>) -> Result<(), ServerError> {
        if listeners.is_empty() {
            return Err(ServerError::Internal("no listeners to serve".into()));
        }

        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        let reaper = IdleReaper::new(
            self.lobby.clone(),
            self.config.idle_timeout,
            self.config.reap_interval,
        );
        let reaper_handle = tokio::spawn(reaper.run(self.shutdown_sender.subscribe()));
        info!(
            "🕒 Idle reaper started: timeout {:?}, sweep every {:?}",
            self.config.idle_timeout, self.config.reap_interval
        );

        let outbound_buffer = self.config.outbound_buffer;
        let max_line_length = self.config.max_line_length;

        let mut accept_futures = listeners
            .into_iter()
            .map(|listener| {
                let lobby = self.lobby.clone();
                async move {
                    loop {
                        match listener.accept().await {
                            Ok((stream, addr)) => {
                                tokio::spawn(handle_tcp_connection(
                                    stream,
                                    addr,
                                    lobby.clone(),
                                    outbound_buffer,
                                    max_line_length,
                                ));
                            }
                            Err(e) => {
                                // Accept failures (e.g. fd exhaustion) are
                                // transient; keep the loop alive.
                                error!("Failed to accept connection: {}", e);
                                tokio::task::yield_now().await;
                            }
                        }
                    }
                }
            })
            .collect::<FuturesUnordered<_>>();

        tokio::select! {
            _ = accept_futures.next() => {
                warn!("Accept loop exited unexpectedly");
            }
            _ = shutdown_receiver.recv() => {
                info!("Shutdown signal received");
            }
        }

        info!("🧹 Performing server cleanup...");
        // Stop the reaper even if the accept loops ended on their own.
        let _ = self.shutdown_sender.send(());
        let closed = self.lobby.shutdown_all(SHUTDOWN_NOTICE);
        info!("Closed {} session(s)", closed);
        if let Err(e) = reaper_handle.await {
            warn!("Idle reaper task failed: {}", e);
        }

        info!("Server stopped");
        Ok(())
    }

    /// Initiates server shutdown.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// Gets the lobby shared by all connections.
    pub fn get_lobby(&self) -> Arc<Lobby> {
        self.lobby.clone()
    }

    /// Read-only snapshot of who is online.
    pub fn presence(&self) -> Presence {
        self.lobby.presence()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn bind_listener(address: SocketAddr, reuse_port: bool) -> Result<TcpListener, ServerError> {
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
    socket.set_reuse_address(true).ok();

    if reuse_port {
        #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos", target_os = "cygwin"))))]
        {
            match socket.set_reuse_port(true) {
                Ok(()) => info!("SO_REUSEPORT enabled for load balancing across acceptor threads"),
                Err(e) => warn!("Failed to set SO_REUSEPORT: {}", e),
            }
        }
        #[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos", target_os = "cygwin")))))]
        {
            warn!("SO_REUSEPORT is not supported on this platform. Using SO_REUSEADDR only.");
        }
    }

    socket
        .bind(&address.into())
        .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
    socket
        .listen(1024)
        .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;

    let std_listener: StdTcpListener = socket.into();
    std_listener
        .set_nonblocking(true)
        .map_err(|e| ServerError::Network(format!("Failed to set non-blocking: {e}")))?;

    TcpListener::from_std(std_listener)
        .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))
}
