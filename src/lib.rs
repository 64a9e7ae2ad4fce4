//! # twirc
//!
//! An async client for the tag-annotated, IRC-derived chat protocol
//! behind Twitch chat (TMI).
//!
//! ## Features
//!
//! - Connection lifecycle management with automatic reconnect and
//!   capped exponential backoff
//! - Registration handshake with anonymous-login support
//! - Keepalive watchdog that detects silently dead connections
//! - Typed events for every supported command, with raw-line access
//! - Lazily normalized message tags (badges, emotes, channel modes)
//! - Per-channel and session-wide state tracking
//! - TCP, TLS, and WebSocket transports
//!
//! ## Quick Start
//!
//! ```no_run
//! use twirc::{Client, ClientConfig, Event};
//!
//! # async fn run() -> Result<(), twirc::ClientError> {
//! let mut client = Client::new(ClientConfig::anonymous());
//! let mut events = client.subscribe();
//!
//! client.connect().await?;
//! client.join("forsen").await?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let Event::Message(msg) = event {
//!         println!("[{}] {}: {}", msg.channel, msg.user, msg.message);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
pub mod codec;
mod dispatch;
pub mod error;
pub mod event;
pub mod message;
pub mod state;
pub mod tags;
pub mod transport;

pub use self::client::{
    Client, ClientConfig, ConnectionConfig, ConnectionKind, ConnectionState,
};
pub use self::codec::{IrcCodec, MAX_LINE_LEN};
pub use self::error::{ClientError, MessageParseError, Result};
pub use self::event::{Event, EventKind};
pub use self::message::{Message, Prefix};
pub use self::state::{ChannelState, StateStore};
pub use self::tags::{normalize_tags, EmoteRange, LazyTags, TagMap, TagValue};
pub use self::transport::Transport;
