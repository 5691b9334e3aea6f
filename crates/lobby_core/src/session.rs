//! Session identity and per-session state.
//!
//! A [`Session`] is value-like: it carries the player's identity and activity
//! data but not the live stream. The stream is reached through the
//! [`Connection`](crate::connection::Connection) capability stored next to it
//! in the registry.

use std::fmt;
use tokio::time::Instant;
use uuid::Uuid;

/// Label used for unnamed sessions wherever a name field is reported.
pub const UNNAMED_PLACEHOLDER: &str = "Unnamed";

/// Unique identifier for a connected session.
///
/// Generated from a random UUID v4 at accept time and never reused while the
/// process runs; a reconnecting client always gets a fresh identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of a session.
///
/// `Connecting` exists only before registry insertion. Once a session is
/// `Closing` no further inbound lines are processed for it, and `Closed` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Why a session left the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer closed the stream.
    PeerClosed,
    /// Reading or writing the stream failed.
    TransportError(String),
    /// The player issued `/quit`.
    Quit,
    /// No input for longer than the idle threshold.
    IdleTimeout,
    /// Removed by the server (kick or shutdown).
    Kicked(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::TransportError(cause) => write!(f, "transport error: {cause}"),
            Self::Quit => write!(f, "quit"),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::Kicked(reason) => write!(f, "kicked: {reason}"),
        }
    }
}

/// Server-side record of one connected client.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    display_name: Option<String>,
    last_active_at: Instant,
    state: SessionState,
    join_seq: u64,
}

impl Session {
    /// Creates a session in the `Connecting` state.
    ///
    /// `join_seq` orders sessions for listing; the registry assigns it.
    pub fn new(id: SessionId, join_seq: u64, now: Instant) -> Self {
        Self {
            id,
            display_name: None,
            last_active_at: now,
            state: SessionState::Connecting,
            join_seq,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn last_active_at(&self) -> Instant {
        self.last_active_at
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn join_seq(&self) -> u64 {
        self.join_seq
    }

    /// The name shown to other players: display name, or the id if unset.
    pub fn label(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }

    /// Records inbound activity. Never moves the timestamp backwards.
    pub fn touch(&mut self, now: Instant) {
        if now > self.last_active_at {
            self.last_active_at = now;
        }
    }

    /// Replaces the display name, returning the previous label.
    pub fn rename(&mut self, name: String) -> String {
        let previous = self.label();
        self.display_name = Some(name);
        previous
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Whether inbound lines should still be processed for this session.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_session_ids_are_distinct() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<SessionId>().unwrap(), a);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_is_monotonic() {
        let start = Instant::now();
        let mut session = Session::new(SessionId::new(), 0, start);
        session.touch(start + Duration::from_secs(10));
        session.touch(start + Duration::from_secs(5));
        assert_eq!(session.last_active_at(), start + Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_label_falls_back_to_id() {
        let id = SessionId::new();
        let mut session = Session::new(id, 0, Instant::now());
        assert_eq!(session.label(), id.to_string());

        let previous = session.rename("Alice".to_string());
        assert_eq!(previous, id.to_string());
        assert_eq!(session.label(), "Alice");
        assert_eq!(session.display_name(), Some("Alice"));
    }
}
