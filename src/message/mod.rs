//! Wire-format message types.
//!
//! A decoded line consists of an optional tag map, an optional prefix
//! (the message source), a command name, middle parameters, and an
//! optional trailing parameter:
//!
//! ```text
//! [@tags] [:prefix] <command> [params...] [:trailing]
//! ```

mod parse;
mod tags;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

/// The source of a wire message, `name[!user[@host]]`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Prefix {
    /// Server name or sender nickname.
    pub name: String,
    /// Username portion, if present.
    pub user: Option<String>,
    /// Host portion, if present.
    pub host: Option<String>,
}

impl Prefix {
    /// Split a raw prefix string into its name, user, and host parts.
    pub fn parse(raw: &str) -> Self {
        let (name_user, host) = match raw.split_once('@') {
            Some((nu, h)) => (nu, Some(h.to_string())),
            None => (raw, None),
        };
        let (name, user) = match name_user.split_once('!') {
            Some((n, u)) => (n.to_string(), Some(u.to_string())),
            None => (name_user.to_string(), None),
        };
        Prefix { name, user, host }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(user) = &self.user {
            write!(f, "!{}", user)?;
        }
        if let Some(host) = &self.host {
            write!(f, "@{}", host)?;
        }
        Ok(())
    }
}

/// An owned, decoded wire message.
///
/// Tag values are kept in their wire-escaped form; unescaping is the
/// concern of the tag normalization layer.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// Raw tag key/value pairs. Empty when the line carried no tags.
    pub tags: HashMap<String, String>,
    /// Message source, if present.
    pub prefix: Option<Prefix>,
    /// Command name (verb or numeric).
    pub command: String,
    /// Middle parameters, excluding the trailing parameter.
    pub params: Vec<String>,
    /// Trailing parameter (the part after ` :`), if present.
    pub trailing: Option<String>,
}

impl Message {
    /// Parse a single line into a [`Message`].
    pub fn parse(line: &str) -> Result<Message, MessageParseError> {
        parse::parse_message(line)
    }

    /// `PRIVMSG <target> :<text>`
    pub fn privmsg(target: &str, text: &str) -> Message {
        Message {
            command: "PRIVMSG".to_string(),
            params: vec![target.to_string()],
            trailing: Some(text.to_string()),
            ..Message::default()
        }
    }

    /// `JOIN <target>`
    pub fn join(target: &str) -> Message {
        Message {
            command: "JOIN".to_string(),
            params: vec![target.to_string()],
            ..Message::default()
        }
    }

    /// `PART <target>`
    pub fn part(target: &str) -> Message {
        Message {
            command: "PART".to_string(),
            params: vec![target.to_string()],
            ..Message::default()
        }
    }

    /// First middle parameter with a leading `#` sigil stripped.
    ///
    /// This is the conventional location of the channel name for every
    /// channel-scoped command.
    pub fn channel(&self) -> Option<&str> {
        self.params
            .first()
            .map(|p| p.strip_prefix('#').unwrap_or(p))
    }

    /// Sender name from the prefix, if present.
    pub fn sender(&self) -> Option<&str> {
        self.prefix.as_ref().map(|p| p.name.as_str())
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            f.write_str("@")?;
            tags::format_tags(f, &self.tags)?;
            f.write_str(" ")?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&self.command)?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        if let Some(trailing) = &self.trailing {
            write!(f, " :{}", trailing)?;
        }
        Ok(())
    }
}
