//! Server orchestration.

pub mod core;

pub use self::core::{GameServer, SHUTDOWN_NOTICE};
