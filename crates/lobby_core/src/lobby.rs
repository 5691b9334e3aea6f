//! Session lifecycle hub.
//!
//! The transport reports connection events here (`on_accept`, `on_line`,
//! `on_close`, `on_error`). Every way a session can end (peer close, stream
//! error, `/quit`, idle eviction, kick, shutdown) funnels into
//! [`Lobby::disconnect`], whose atomic registry removal guarantees a single
//! leave broadcast and a single close per session.

use crate::broadcast::{deliver, Broadcaster, SYSTEM_SENDER};
use crate::connection::ConnectionHandle;
use crate::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::registry::SessionRegistry;
use crate::session::{DisconnectReason, SessionId, UNNAMED_PLACEHOLDER};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Greeting queued for every new session.
pub const WELCOME: &str = "Welcome to the game! Use /name to set your name";

/// Notice for connections refused because the server is at capacity.
pub const SERVER_FULL: &str = "Server is full, try again later";

/// Read-only view of who is online, for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct Presence {
    pub online: usize,
    pub sessions: Vec<PresenceEntry>,
}

/// One session as reported to monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceEntry {
    pub id: String,
    pub name: String,
}

/// Ties the registry, broadcaster and dispatcher together.
pub struct Lobby {
    registry: Arc<SessionRegistry>,
    broadcaster: Broadcaster,
    dispatcher: CommandDispatcher,
    max_connections: usize,
}

impl Lobby {
    pub fn new(max_connections: usize) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());
        let dispatcher = CommandDispatcher::new(registry.clone(), broadcaster.clone());
        Self {
            registry,
            broadcaster,
            dispatcher,
            max_connections,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Registers a newly accepted connection.
    ///
    /// Returns `None` when the server is full; the connection has then been
    /// sent a notice and asked to close.
    pub fn on_accept(&self, connection: ConnectionHandle) -> Option<SessionId> {
        if self.registry.len() >= self.max_connections {
            warn!(
                "Rejecting connection: {} sessions already online",
                self.registry.len()
            );
            deliver(connection.as_ref(), SYSTEM_SENDER, SERVER_FULL);
            connection.close();
            return None;
        }

        // Queued before registering so no other frame can precede it.
        deliver(connection.as_ref(), SYSTEM_SENDER, WELCOME);
        let id = self.registry.register(connection);
        info!(
            "Session {} connected, {} online",
            id,
            self.registry.len()
        );

        self.broadcaster
            .broadcast_except(SYSTEM_SENDER, &format!("{id} joined the game"), id);
        Some(id)
    }

    /// Handles one inbound line. Lines for sessions that are closing or gone
    /// are dropped.
    pub fn on_line(&self, id: SessionId, line: &str) {
        if !self.registry.touch(id, Instant::now()) {
            debug!("Ignoring line for inactive session {}", id);
            return;
        }

        debug!("Session {} sent: {}", id, line);
        if self.dispatcher.dispatch(id, line) == DispatchOutcome::Quit {
            self.registry.begin_closing(id);
            self.disconnect(id, DisconnectReason::Quit);
        }
    }

    /// The peer closed the stream.
    pub fn on_close(&self, id: SessionId) {
        self.disconnect(id, DisconnectReason::PeerClosed);
    }

    /// Reading or writing the stream failed; treated like a peer close.
    pub fn on_error(&self, id: SessionId, cause: &dyn fmt::Display) {
        warn!("Session {} transport error: {}", id, cause);
        self.disconnect(id, DisconnectReason::TransportError(cause.to_string()));
    }

    /// Sends a kick notice and disconnects the session.
    pub fn kick(&self, id: SessionId, reason: &str) -> bool {
        if !self.registry.begin_closing(id) {
            return false;
        }
        self.evict(id, reason, DisconnectReason::Kicked(reason.to_string()))
    }

    /// Disconnects a session if, as of `now`, it has been idle for longer
    /// than `idle_timeout`. A session that sent a line since the caller last
    /// looked at it is left alone.
    pub fn evict_idle(&self, id: SessionId, now: Instant, idle_timeout: Duration) -> bool {
        if !self.registry.begin_closing_if_idle(id, now, idle_timeout) {
            return false;
        }
        self.evict(id, "idle timeout", DisconnectReason::IdleTimeout)
    }

    /// Notifies and disconnects a session already moved to `Closing`.
    fn evict(&self, id: SessionId, notice: &str, reason: DisconnectReason) -> bool {
        self.broadcaster
            .send_to(id, SYSTEM_SENDER, &format!("You have been kicked: {notice}"));
        self.disconnect(id, reason)
    }

    /// Removes a session, closes its connection and tells everyone else.
    ///
    /// Safe to call from any number of places at once: only the caller that
    /// actually removes the entry does anything, the rest are no-ops.
    pub fn disconnect(&self, id: SessionId, reason: DisconnectReason) -> bool {
        let Some(removed) = self.registry.remove(id) else {
            debug!("Session {} already removed ({})", id, reason);
            return false;
        };

        removed.connection.close();
        let label = removed.session.label();
        info!(
            "Session {} ({}) disconnected: {}, {} online",
            id,
            label,
            reason,
            self.registry.len()
        );
        self.broadcaster
            .broadcast_all(SYSTEM_SENDER, &format!("{label} left the game"));
        true
    }

    /// Notifies and disconnects every session.
    pub fn shutdown_all(&self, notice: &str) -> usize {
        let mut closed = 0;
        for session in self.registry.snapshot() {
            let id = session.id();
            if self.registry.begin_closing(id) {
                self.broadcaster.send_to(id, SYSTEM_SENDER, notice);
            }
            if self.disconnect(id, DisconnectReason::Kicked("server shutdown".into())) {
                closed += 1;
            }
        }
        closed
    }

    /// Snapshot of online sessions for the monitoring surface.
    pub fn presence(&self) -> Presence {
        let sessions: Vec<PresenceEntry> = self
            .registry
            .snapshot()
            .into_iter()
            .map(|session| PresenceEntry {
                id: session.id().to_string(),
                name: session
                    .display_name()
                    .unwrap_or(UNNAMED_PLACEHOLDER)
                    .to_string(),
            })
            .collect();
        Presence {
            online: sessions.len(),
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ChannelConnection, Connection, OutboundReceiver};

    fn connect(lobby: &Lobby) -> (Option<SessionId>, Arc<ChannelConnection>, OutboundReceiver) {
        let (conn, outbound) = ChannelConnection::new(32);
        let conn = Arc::new(conn);
        let id = lobby.on_accept(conn.clone());
        (id, conn, outbound)
    }

    fn drain(outbound: &mut OutboundReceiver) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = outbound.frames.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn test_accept_welcomes_and_announces() {
        let lobby = Lobby::new(10);
        let (a, _, mut a_out) = connect(&lobby);
        let a = a.unwrap();
        assert_eq!(drain(&mut a_out), vec![format!("[System]: {WELCOME}\n")]);

        let (b, _, mut b_out) = connect(&lobby);
        let b = b.unwrap();
        assert_eq!(drain(&mut b_out), vec![format!("[System]: {WELCOME}\n")]);
        assert_eq!(drain(&mut a_out), vec![format!("[System]: {b} joined the game\n")]);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_full_server_refuses_connection() {
        let lobby = Lobby::new(1);
        let (first, _, _first_out) = connect(&lobby);
        assert!(first.is_some());

        let (second, conn, mut out) = connect(&lobby);
        assert!(second.is_none());
        assert!(conn.is_closed());
        assert_eq!(drain(&mut out), vec![format!("[System]: {SERVER_FULL}\n")]);
        assert_eq!(lobby.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_broadcasts_once() {
        let lobby = Lobby::new(10);
        let (a, a_conn, _a_out) = connect(&lobby);
        let a = a.unwrap();
        let (_b, _, mut b_out) = connect(&lobby);
        lobby.on_line(a, "/name Alice");
        drain(&mut b_out);

        lobby.on_close(a);
        lobby.on_close(a);
        lobby.on_error(a, &"reset by peer");
        assert!(!lobby.evict_idle(a, Instant::now(), Duration::ZERO));

        assert!(a_conn.is_closed());
        assert_eq!(drain(&mut b_out), vec!["[System]: Alice left the game\n".to_string()]);
        assert!(lobby.registry().get(a).is_none());
    }

    #[tokio::test]
    async fn test_quit_closes_after_farewell() {
        let lobby = Lobby::new(10);
        let (a, a_conn, mut a_out) = connect(&lobby);
        let a = a.unwrap();
        let (_b, _, mut b_out) = connect(&lobby);
        drain(&mut a_out);
        drain(&mut b_out);

        lobby.on_line(a, "/quit");
        assert!(a_conn.is_closed());
        assert_eq!(drain(&mut a_out), vec!["[System]: Goodbye!\n".to_string()]);
        assert_eq!(drain(&mut b_out), vec![format!("[System]: {a} left the game\n")]);

        lobby.on_line(a, "still there?");
        assert!(drain(&mut b_out).is_empty());
    }

    #[tokio::test]
    async fn test_kick_sends_reason() {
        let lobby = Lobby::new(10);
        let (a, _, mut a_out) = connect(&lobby);
        let a = a.unwrap();
        drain(&mut a_out);

        assert!(lobby.kick(a, "spamming"));
        assert_eq!(
            drain(&mut a_out),
            vec!["[System]: You have been kicked: spamming\n".to_string()]
        );
        assert!(!lobby.kick(a, "spamming"));
    }

    #[tokio::test]
    async fn test_presence_uses_placeholder() {
        let lobby = Lobby::new(10);
        let (a, _, _a_out) = connect(&lobby);
        let (b, _, _b_out) = connect(&lobby);
        let (a, b) = (a.unwrap(), b.unwrap());
        lobby.on_line(b, "/name Bob");

        let presence = lobby.presence();
        assert_eq!(presence.online, 2);
        assert_eq!(
            presence.sessions,
            vec![
                PresenceEntry { id: a.to_string(), name: UNNAMED_PLACEHOLDER.to_string() },
                PresenceEntry { id: b.to_string(), name: "Bob".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn test_presence_serializes_for_monitoring() {
        let lobby = Lobby::new(10);
        let (a, _, _a_out) = connect(&lobby);
        let a = a.unwrap();

        let value = serde_json::to_value(lobby.presence()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "online": 1,
                "sessions": [{ "id": a.to_string(), "name": "Unnamed" }],
            })
        );
    }

    #[tokio::test]
    async fn test_shutdown_all_notifies_everyone() {
        let lobby = Lobby::new(10);
        let (_a, a_conn, mut a_out) = connect(&lobby);
        let (_b, b_conn, mut b_out) = connect(&lobby);
        drain(&mut a_out);
        drain(&mut b_out);

        assert_eq!(lobby.shutdown_all("Server is shutting down"), 2);
        assert!(lobby.registry().is_empty());
        assert!(a_conn.is_closed() && b_conn.is_closed());
        assert_eq!(
            drain(&mut a_out).first().map(String::as_str),
            Some("[System]: Server is shutting down\n")
        );
    }
}
