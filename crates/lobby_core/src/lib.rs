//! # Lobby Core - Multiplayer Session Server
//!
//! A line-oriented TCP session server: players connect, pick a display name,
//! chat with everyone online and issue slash commands. The crate owns the
//! whole session lifecycle, from accept to the single leave broadcast.
//!
//! ## Architecture Overview
//!
//! * **Transport adapter** ([`connection`]) - Splits each stream into a read
//!   loop and a writer task fed by a bounded outbound queue
//! * **Session registry** ([`registry`]) - Concurrent map of live sessions
//!   with an atomic remove that decides who performs a disconnect
//! * **Broadcaster** ([`broadcast`]) - Non-blocking fan-out of framed lines
//! * **Command dispatcher** ([`dispatcher`]) - Routes `/name`, `/list`,
//!   `/info`, `/help`, `/ping`, `/quit` and plain chat
//! * **Idle reaper** ([`reaper`]) - Periodically evicts silent sessions
//! * **Lobby** ([`lobby`]) - Lifecycle hub every connection event goes through
//!
//! ### Wire format
//!
//! Inbound: one UTF-8 line per message, `\n` terminated. Outbound: every
//! frame is `[sender]: content\n`, where server notices use the sender
//! `System`.
//!
//! ```text
//! > /name Alice
//! [System]: Your name is now Alice
//! > hello
//! [Alice]: hello
//! ```
//!
//! ## Thread Safety
//!
//! * The registry is a `DashMap`; no lock is held while a frame is enqueued
//! * Outbound queues are bounded; a saturated queue drops the frame for that
//!   one recipient and never blocks the sender
//! * All disconnect paths race on a single registry removal, so a session
//!   leaves exactly once
//!
//! ## Error Handling
//!
//! Only startup fails with [`ServerError`]. Per-session problems (bad names,
//! unknown commands, over-long lines) are answered with a notice and the
//! session carries on.

pub use config::ServerConfig;
pub use error::{DeliveryError, NameError, ServerError};
pub use lobby::{Lobby, Presence, PresenceEntry};
pub use server::GameServer;
pub use session::{DisconnectReason, Session, SessionId, SessionState};
pub use utils::{create_server, create_server_with_config};

pub mod broadcast;
pub mod command;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod lobby;
pub mod reaper;
pub mod registry;
pub mod server;
pub mod session;
pub mod utils;
