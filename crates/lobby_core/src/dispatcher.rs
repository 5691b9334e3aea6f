//! Interprets one inbound line for one session.
//!
//! Chat lines are fanned out to everyone; commands act on the issuing
//! session only. A failing command turns into a notice for the issuer and
//! never affects the session's connection or anyone else.

use crate::broadcast::{Broadcaster, SYSTEM_SENDER};
use crate::command::{validate_name, Command, Input, COMMAND_PREFIX, HELP_TEXT};
use crate::error::NameError;
use crate::registry::SessionRegistry;
use crate::session::{SessionId, UNNAMED_PLACEHOLDER};
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Farewell sent in reply to `/quit`.
pub const FAREWELL: &str = "Goodbye!";

/// What the caller should do with the session after a line was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    /// The session asked to leave; its farewell has already been queued.
    Quit,
}

/// A command that could not be carried out. The `Display` text is the reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0}")]
    InvalidName(#[from] NameError),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Unknown command: {prefix}{0}, type {prefix}help for available commands", prefix = COMMAND_PREFIX)]
    Unknown(String),
    /// The session disappeared while the command ran.
    #[error("session is no longer connected")]
    SessionGone,
}

/// Routes lines to chat fan-out or command handlers.
#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Arc<SessionRegistry>,
    broadcaster: Broadcaster,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<SessionRegistry>, broadcaster: Broadcaster) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    /// Handles one line from `id`.
    pub fn dispatch(&self, id: SessionId, line: &str) -> DispatchOutcome {
        match Input::parse(line) {
            Input::Empty => DispatchOutcome::Continue,
            Input::Chat(text) => {
                self.chat(id, text);
                DispatchOutcome::Continue
            }
            Input::Command(command) => {
                let is_quit = command == Command::Quit;
                match self.execute(id, command) {
                    Ok(()) if is_quit => DispatchOutcome::Quit,
                    Ok(()) => DispatchOutcome::Continue,
                    Err(CommandError::SessionGone) => {
                        debug!("Session {} left while its command was running", id);
                        DispatchOutcome::Continue
                    }
                    Err(e) => {
                        self.reply(id, &e.to_string());
                        DispatchOutcome::Continue
                    }
                }
            }
        }
    }

    fn execute(&self, id: SessionId, command: Command) -> Result<(), CommandError> {
        match command {
            Command::Name(None) => Err(CommandError::Usage("/name <name>")),
            Command::Name(Some(raw)) => self.rename(id, &raw),
            Command::List => self.list(id),
            Command::Help => {
                self.reply(id, HELP_TEXT);
                Ok(())
            }
            Command::Quit => {
                self.reply(id, FAREWELL);
                Ok(())
            }
            Command::Ping => {
                self.reply(id, "pong");
                Ok(())
            }
            Command::Info => self.info(id),
            Command::Unknown(token) => Err(CommandError::Unknown(token)),
        }
    }

    fn chat(&self, id: SessionId, text: &str) {
        let Some(session) = self.registry.get(id) else {
            return;
        };
        self.broadcaster.broadcast_all(&session.label(), text);
    }

    fn rename(&self, id: SessionId, raw: &str) -> Result<(), CommandError> {
        let name = validate_name(raw)?;
        let previous = self
            .registry
            .update(id, |session| session.rename(name.clone()))
            .ok_or(CommandError::SessionGone)?;

        info!("Session {} renamed from {} to {}", id, previous, name);
        self.reply(id, &format!("Your name is now {name}"));
        self.broadcaster
            .broadcast_all(SYSTEM_SENDER, &format!("{previous} is now known as {name}"));
        Ok(())
    }

    fn list(&self, id: SessionId) -> Result<(), CommandError> {
        let mut listing = String::from("Online players:");
        for session in self.registry.snapshot() {
            let _ = write!(listing, "\n- {}", session.label());
            if session.id() == id {
                listing.push_str(" (you)");
            }
        }
        self.reply(id, &listing);
        Ok(())
    }

    fn info(&self, id: SessionId) -> Result<(), CommandError> {
        let session = self.registry.get(id).ok_or(CommandError::SessionGone)?;
        let text = format!(
            "Server info:\n- Online players: {}\n- Your ID: {}\n- Your name: {}",
            self.registry.len(),
            id,
            session.display_name().unwrap_or(UNNAMED_PLACEHOLDER)
        );
        self.reply(id, &text);
        Ok(())
    }

    fn reply(&self, id: SessionId, text: &str) {
        self.broadcaster.send_to(id, SYSTEM_SENDER, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ChannelConnection, ConnectionHandle, OutboundReceiver};

    struct Harness {
        registry: Arc<SessionRegistry>,
        dispatcher: CommandDispatcher,
    }

    impl Harness {
        fn new() -> Self {
            let registry = Arc::new(SessionRegistry::new());
            let broadcaster = Broadcaster::new(registry.clone());
            let dispatcher = CommandDispatcher::new(registry.clone(), broadcaster);
            Self {
                registry,
                dispatcher,
            }
        }

        fn connect(&self) -> (SessionId, OutboundReceiver) {
            let (conn, outbound) = ChannelConnection::new(32);
            let handle: ConnectionHandle = Arc::new(conn);
            (self.registry.register(handle), outbound)
        }
    }

    fn drain(outbound: &mut OutboundReceiver) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = outbound.frames.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn test_chat_is_broadcast_with_label() {
        let h = Harness::new();
        let (a, mut a_out) = h.connect();
        let (_b, mut b_out) = h.connect();

        assert_eq!(h.dispatcher.dispatch(a, "hello"), DispatchOutcome::Continue);
        let expected = format!("[{a}]: hello\n");
        assert_eq!(drain(&mut a_out), vec![expected.clone()]);
        assert_eq!(drain(&mut b_out), vec![expected]);
    }

    #[tokio::test]
    async fn test_rename_success_and_notice() {
        let h = Harness::new();
        let (a, mut a_out) = h.connect();
        let (_b, mut b_out) = h.connect();

        h.dispatcher.dispatch(a, "/name Alice");
        assert_eq!(h.registry.get(a).unwrap().display_name(), Some("Alice"));

        let notice = format!("[System]: {a} is now known as Alice\n");
        assert_eq!(
            drain(&mut a_out),
            vec!["[System]: Your name is now Alice\n".to_string(), notice.clone()]
        );
        assert_eq!(drain(&mut b_out), vec![notice]);

        h.dispatcher.dispatch(a, "hi");
        assert_eq!(drain(&mut b_out), vec!["[Alice]: hi\n".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_rename_leaves_name_unchanged() {
        let h = Harness::new();
        let (a, mut a_out) = h.connect();
        let (_b, mut b_out) = h.connect();
        h.dispatcher.dispatch(a, "/name Alice");
        drain(&mut a_out);
        drain(&mut b_out);

        for bad in ["/name bad name!", "/name    ", "/name abcdefghijklmnopqrstuvwxyz"] {
            h.dispatcher.dispatch(a, bad);
            assert_eq!(h.registry.get(a).unwrap().display_name(), Some("Alice"));
        }

        let replies = drain(&mut a_out);
        assert_eq!(
            replies,
            vec![
                format!("[System]: {}\n", NameError::InvalidCharacters),
                "[System]: Usage: /name <name>\n".to_string(),
                format!("[System]: {}\n", NameError::TooLong { max: 20 }),
            ]
        );
        assert!(drain(&mut b_out).is_empty());
    }

    #[tokio::test]
    async fn test_name_without_argument_shows_usage() {
        let h = Harness::new();
        let (a, mut a_out) = h.connect();
        h.dispatcher.dispatch(a, "/name");
        assert_eq!(drain(&mut a_out), vec!["[System]: Usage: /name <name>\n".to_string()]);
    }

    #[tokio::test]
    async fn test_list_marks_caller_and_uses_names() {
        let h = Harness::new();
        let (a, mut a_out) = h.connect();
        let (b, mut b_out) = h.connect();
        h.dispatcher.dispatch(a, "/name Alice");
        drain(&mut a_out);
        drain(&mut b_out);

        h.dispatcher.dispatch(b, "/LIST");
        let replies = drain(&mut b_out);
        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0],
            format!("[System]: Online players:\n- Alice\n- {b} (you)\n")
        );
        assert!(!replies[0].contains(&a.to_string()));
        assert!(drain(&mut a_out).is_empty());
    }

    #[tokio::test]
    async fn test_ping_help_info_reply_to_caller_only() {
        let h = Harness::new();
        let (a, mut a_out) = h.connect();
        let (_b, mut b_out) = h.connect();

        h.dispatcher.dispatch(a, "/ping");
        h.dispatcher.dispatch(a, "/help");
        h.dispatcher.dispatch(a, "/info");

        let replies = drain(&mut a_out);
        assert_eq!(replies[0], "[System]: pong\n");
        assert_eq!(replies[1], format!("[System]: {HELP_TEXT}\n"));
        assert!(replies[2].contains("Online players: 2"));
        assert!(replies[2].contains(&format!("Your ID: {a}")));
        assert!(replies[2].contains("Your name: Unnamed"));
        assert!(drain(&mut b_out).is_empty());
    }

    #[tokio::test]
    async fn test_quit_queues_farewell() {
        let h = Harness::new();
        let (a, mut a_out) = h.connect();
        assert_eq!(h.dispatcher.dispatch(a, "/quit"), DispatchOutcome::Quit);
        assert_eq!(drain(&mut a_out), vec!["[System]: Goodbye!\n".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_command_names_token() {
        let h = Harness::new();
        let (a, mut a_out) = h.connect();
        assert_eq!(h.dispatcher.dispatch(a, "/Dance"), DispatchOutcome::Continue);
        assert_eq!(
            drain(&mut a_out),
            vec!["[System]: Unknown command: /dance, type /help for available commands\n".to_string()]
        );
    }

    #[tokio::test]
    async fn test_lines_for_removed_session_are_ignored() {
        let h = Harness::new();
        let (a, _a_out) = h.connect();
        let (_b, mut b_out) = h.connect();
        h.registry.remove(a);

        assert_eq!(h.dispatcher.dispatch(a, "hello"), DispatchOutcome::Continue);
        assert_eq!(h.dispatcher.dispatch(a, "/name Ghost"), DispatchOutcome::Continue);
        assert_eq!(h.dispatcher.dispatch(a, "/info"), DispatchOutcome::Continue);
        assert!(drain(&mut b_out).is_empty());
    }
}
