//! The authoritative table of connected sessions.
//!
//! Backed by a sharded `DashMap`, so operations on different sessions never
//! contend on a global lock while every insert, remove and per-session update
//! stays atomic for its key.

use crate::connection::ConnectionHandle;
use crate::session::{Session, SessionId, SessionState};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

struct SessionEntry {
    session: Session,
    connection: ConnectionHandle,
}

/// A session detached from the registry together with its connection.
#[derive(Debug)]
pub struct RemovedSession {
    pub session: Session,
    pub connection: ConnectionHandle,
}

/// Concurrent map from session id to session.
///
/// Lookups return copies of the session data; callers never hold a reference
/// into the table past a single call, so a concurrent removal can never leave
/// anyone looking at a stale entry.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
    next_seq: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Allocates a fresh id, stores an `Active` session for `connection` and
    /// returns the id.
    pub fn register(&self, connection: ConnectionHandle) -> SessionId {
        let join_seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();

        loop {
            let id = SessionId::new();
            // Retry on the (practically impossible) v4 collision.
            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.sessions.entry(id) {
                let mut session = Session::new(id, join_seq, now);
                session.set_state(SessionState::Active);
                slot.insert(SessionEntry {
                    session,
                    connection: connection.clone(),
                });
                return id;
            }
        }
    }

    /// Returns a copy of the session, or `None` if it is not registered.
    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions.get(&id).map(|entry| entry.session.clone())
    }

    /// Returns the connection capability of a registered session.
    pub fn connection(&self, id: SessionId) -> Option<ConnectionHandle> {
        self.sessions.get(&id).map(|entry| entry.connection.clone())
    }

    /// Runs `f` against the session while holding its entry lock.
    ///
    /// `f` must not call back into the registry.
    pub fn update<R>(&self, id: SessionId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.sessions
            .get_mut(&id)
            .map(|mut entry| f(&mut entry.session))
    }

    /// Records inbound activity. Returns `false` when the session is gone or
    /// no longer accepting input.
    pub fn touch(&self, id: SessionId, now: Instant) -> bool {
        self.update(id, |session| {
            if session.is_active() {
                session.touch(now);
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }

    /// Moves an active session to `Closing`. Returns `false` if it was absent
    /// or already closing.
    pub fn begin_closing(&self, id: SessionId) -> bool {
        self.update(id, |session| {
            if session.is_active() {
                session.set_state(SessionState::Closing);
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }

    /// Moves an active session to `Closing` only if, as of `now`, it has been
    /// idle for longer than `idle_timeout`.
    ///
    /// The idleness check and the state change happen under the same entry
    /// lock as [`SessionRegistry::touch`], so a line that lands first always
    /// saves the session.
    pub fn begin_closing_if_idle(&self, id: SessionId, now: Instant, idle_timeout: Duration) -> bool {
        self.update(id, |session| {
            let idle_for = now.saturating_duration_since(session.last_active_at());
            if session.is_active() && idle_for > idle_timeout {
                session.set_state(SessionState::Closing);
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }

    /// Atomically detaches a session.
    ///
    /// Exactly one of any number of concurrent callers receives `Some`; every
    /// later call returns `None`.
    pub fn remove(&self, id: SessionId) -> Option<RemovedSession> {
        self.sessions.remove(&id).map(|(_, mut entry)| {
            entry.session.set_state(SessionState::Closed);
            RemovedSession {
                session: entry.session,
                connection: entry.connection,
            }
        })
    }

    /// Point-in-time copy of all sessions, ordered by join time.
    pub fn snapshot(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .map(|entry| entry.session.clone())
            .collect();
        sessions.sort_by_key(Session::join_seq);
        sessions
    }

    /// Point-in-time copy of every connection, for fan-out.
    pub fn connections(&self) -> Vec<(SessionId, ConnectionHandle)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.connection.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
