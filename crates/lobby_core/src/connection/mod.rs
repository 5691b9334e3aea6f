//! Connection capabilities and the TCP transport adapter.
//!
//! The lobby never touches a socket directly. Each registered session is
//! paired with a [`Connection`] capability that can enqueue an outbound frame
//! without blocking and request the stream to close. The transport adapter in
//! [`handler`] owns the actual stream, drives the read loop and reports events
//! back to the [`Lobby`](crate::Lobby).

pub mod channel;
pub mod handler;

pub use channel::{ChannelConnection, OutboundReceiver};
pub use handler::{handle_connection, handle_tcp_connection};

use crate::error::DeliveryError;
use std::fmt;
use std::sync::Arc;

/// A write/close capability for one client stream.
///
/// Implementations must never block: `try_send` either enqueues the frame or
/// reports why it could not, and `close` only signals the owner of the stream.
pub trait Connection: Send + Sync + fmt::Debug {
    /// Enqueues one already-framed line for delivery.
    fn try_send(&self, frame: String) -> Result<(), DeliveryError>;

    /// Requests the underlying stream to be closed. Idempotent.
    fn close(&self);

    /// Whether `close` has been requested or the stream is gone.
    fn is_closed(&self) -> bool;
}

/// Shared handle to a connection capability.
pub type ConnectionHandle = Arc<dyn Connection>;
