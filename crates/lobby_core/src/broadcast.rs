//! Best-effort delivery of framed lines to one or many sessions.
//!
//! Every message on the wire is `[<sender>]: <content>\n`. Delivery never
//! blocks: a saturated or closed target simply misses the frame.

use crate::connection::Connection;
use crate::error::DeliveryError;
use crate::registry::SessionRegistry;
use crate::session::SessionId;
use std::sync::Arc;
use tracing::debug;

/// Sender label for server-generated notices.
pub const SYSTEM_SENDER: &str = "System";

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Dropped(DeliveryError),
    /// The target is not (or no longer) registered.
    Absent,
}

/// Builds the wire frame for one message.
pub fn format_frame(sender: &str, content: &str) -> String {
    format!("[{sender}]: {content}\n")
}

/// Enqueues a message on a connection the caller already holds.
pub fn deliver(connection: &dyn Connection, sender: &str, content: &str) -> Delivery {
    match connection.try_send(format_frame(sender, content)) {
        Ok(()) => Delivery::Delivered,
        Err(e) => Delivery::Dropped(e),
    }
}

/// Fan-out over the session registry.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Sends one message to a single session.
    pub fn send_to(&self, id: SessionId, sender: &str, content: &str) -> Delivery {
        let Some(connection) = self.registry.connection(id) else {
            return Delivery::Absent;
        };
        let delivery = deliver(connection.as_ref(), sender, content);
        if let Delivery::Dropped(reason) = delivery {
            debug!("Dropped frame for session {}: {}", id, reason);
        }
        delivery
    }

    /// Sends one message to every registered session. Returns how many
    /// targets accepted it.
    pub fn broadcast_all(&self, sender: &str, content: &str) -> usize {
        self.fan_out(sender, content, None)
    }

    /// Sends one message to every registered session except `excluded`.
    pub fn broadcast_except(&self, sender: &str, content: &str, excluded: SessionId) -> usize {
        self.fan_out(sender, content, Some(excluded))
    }

    fn fan_out(&self, sender: &str, content: &str, excluded: Option<SessionId>) -> usize {
        let frame = format_frame(sender, content);
        let mut delivered = 0;

        for (id, connection) in self.registry.connections() {
            if Some(id) == excluded {
                continue;
            }
            match connection.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(reason) => debug!("Dropped broadcast frame for session {}: {}", id, reason),
            }
        }

        delivered
    }
}
