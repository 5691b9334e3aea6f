//! Error types for the lobby server.
//!
//! Only startup paths (binding, configuration) surface a [`ServerError`].
//! Everything that happens after a connection is accepted is scoped to that
//! one session and is reported to the player as a notice instead.

use thiserror::Error;

/// Errors that can stop the server from starting or running.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Network-related error (bind, listen, socket setup)
    #[error("Network error: {0}")]
    Network(String),
    /// Invalid configuration values
    #[error("Configuration error: {0}")]
    Config(String),
    /// Internal server error (invalid state, task failures)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reasons a display name is rejected by `/name`.
///
/// The `Display` text is sent verbatim to the player as the rejection notice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("Name cannot be empty")]
    Empty,
    #[error("Name cannot be longer than {max} characters")]
    TooLong { max: usize },
    #[error("Name may only contain letters, digits, underscores and Chinese characters")]
    InvalidCharacters,
}

/// Failure to enqueue a frame on a connection's outbound queue.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The outbound buffer is full; the frame is dropped.
    #[error("outbound buffer saturated")]
    Saturated,
    /// The connection's writer has already gone away.
    #[error("connection closed")]
    Closed,
}
