//! Parsing of inbound lines into chat or commands.

use crate::error::NameError;

/// Leading character that marks a line as a command.
pub const COMMAND_PREFIX: char = '/';

/// Longest accepted display name, in characters.
pub const MAX_NAME_LENGTH: usize = 20;

/// Static command catalogue sent by `/help`.
pub const HELP_TEXT: &str = "Available commands:\n\
/name <name> - set your display name\n\
/list - show online players\n\
/info - show server info and your identity\n\
/help - show this help\n\
/ping - test the connection\n\
/quit - leave the game\n\
Type anything else to chat";

/// Recognized commands, plus a catch-all for everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/name [text]`; `None` when no argument was given.
    Name(Option<String>),
    List,
    Help,
    Quit,
    Ping,
    Info,
    /// Any other token, lowercased and without the prefix.
    Unknown(String),
}

/// One classified inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    /// Nothing left after trimming.
    Empty,
    Chat(&'a str),
    Command(Command),
}

impl<'a> Input<'a> {
    /// Classifies a line. Surrounding whitespace is ignored.
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        match line.strip_prefix(COMMAND_PREFIX) {
            Some(body) => Self::Command(Command::parse(body)),
            None => Self::Chat(line),
        }
    }
}

impl Command {
    /// Parses the text after the prefix. Only the first space separates the
    /// token from its argument.
    fn parse(body: &str) -> Self {
        let (token, argument) = match body.split_once(' ') {
            Some((token, argument)) => (token, Some(argument)),
            None => (body, None),
        };

        match token.to_lowercase().as_str() {
            "name" => Self::Name(argument.map(str::to_string)),
            "list" => Self::List,
            "help" => Self::Help,
            "quit" => Self::Quit,
            "ping" => Self::Ping,
            "info" => Self::Info,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Validates and normalizes a requested display name.
pub fn validate_name(raw: &str) -> Result<String, NameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(NameError::TooLong {
            max: MAX_NAME_LENGTH,
        });
    }
    if !name.chars().all(is_name_char) {
        return Err(NameError::InvalidCharacters);
    }
    Ok(name.to_string())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || ('\u{4e00}'..='\u{9fa5}').contains(&c)
}
