//! Typed events emitted by the client.
//!
//! Every event that corresponds to a received line carries the original
//! raw line for diagnostics and replay, plus a [`LazyTags`] whose
//! normalized form is computed on first access.

use crate::tags::LazyTags;

/// A chat message sent to a channel.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub raw: String,
    pub channel: String,
    pub user: String,
    /// Message text, with the action envelope stripped when `is_action`.
    pub message: String,
    /// Set when the message was sent as a `/me` action.
    pub is_action: bool,
    pub tags: LazyTags,
}

/// A general server notice scoped to a channel.
#[derive(Debug, Clone)]
pub struct NoticeEvent {
    pub raw: String,
    pub channel: String,
    pub message: String,
    pub tags: LazyTags,
}

/// Subscription, raid, ritual, and similar channel notices.
#[derive(Debug, Clone)]
pub struct UserNoticeEvent {
    pub raw: String,
    pub channel: String,
    /// User-entered message text; empty when the notice carried none.
    pub message: String,
    pub tags: LazyTags,
}

/// A private message between users, outside any channel.
#[derive(Debug, Clone)]
pub struct WhisperEvent {
    pub raw: String,
    /// Recipient parameter as sent by the server.
    pub channel: String,
    pub user: String,
    pub message: String,
    pub tags: LazyTags,
}

/// Session-wide state for the authenticated user, sent after
/// registration.
#[derive(Debug, Clone)]
pub struct GlobalUserStateEvent {
    pub raw: String,
    pub tags: LazyTags,
}

/// The authenticated user's standing in one channel.
#[derive(Debug, Clone)]
pub struct UserStateEvent {
    pub raw: String,
    pub channel: String,
    pub tags: LazyTags,
}

/// Channel-wide settings, sent on join and on every settings change.
#[derive(Debug, Clone)]
pub struct RoomStateEvent {
    pub raw: String,
    pub channel: String,
    pub tags: LazyTags,
}

/// A user joined a channel.
#[derive(Debug, Clone)]
pub struct JoinEvent {
    pub raw: String,
    pub channel: String,
    pub user: String,
}

/// A user left a channel.
#[derive(Debug, Clone)]
pub struct PartEvent {
    pub raw: String,
    pub channel: String,
    pub user: String,
}

/// Chat history purged, for the whole channel or one user.
#[derive(Debug, Clone)]
pub struct ClearChatEvent {
    pub raw: String,
    pub channel: String,
    /// Name of the timed-out or banned user; empty for a full clear.
    pub message: String,
    pub tags: LazyTags,
}

/// A single message deleted from a channel.
#[derive(Debug, Clone)]
pub struct ClearMessageEvent {
    pub raw: String,
    pub channel: String,
    /// Text of the deleted message.
    pub message: String,
    pub tags: LazyTags,
}

/// Host mode started or stopped.
#[derive(Debug, Clone)]
pub struct HostTargetEvent {
    pub raw: String,
    pub channel: String,
    pub message: String,
    pub tags: LazyTags,
}

/// An inbound server liveness probe (already answered by the client).
#[derive(Debug, Clone)]
pub struct PingEvent {
    pub raw: String,
}

/// A liveness probe reply.
#[derive(Debug, Clone)]
pub struct PongEvent {
    pub raw: String,
}

/// The connection was lost or closed.
#[derive(Debug, Clone)]
pub struct DisconnectEvent {
    /// Why the connection ended; `None` for a voluntary disconnect.
    pub reason: Option<String>,
}

/// An unrecoverable failure outside any caller-awaited operation.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub message: String,
}

/// Everything the client can emit.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Event {
    /// Transport opened.
    Connect,
    /// Transport closed, voluntarily or not.
    Disconnect(DisconnectEvent),
    /// Registration acknowledged by the server.
    Register,
    Ping(PingEvent),
    Pong(PongEvent),
    Message(MessageEvent),
    Notice(NoticeEvent),
    UserNotice(UserNoticeEvent),
    Whisper(WhisperEvent),
    GlobalUserState(GlobalUserStateEvent),
    UserState(UserStateEvent),
    RoomState(RoomStateEvent),
    Join(JoinEvent),
    Part(PartEvent),
    ClearChat(ClearChatEvent),
    ClearMessage(ClearMessageEvent),
    HostTarget(HostTargetEvent),
    Error(ErrorEvent),
}

/// Discriminant of an [`Event`], for subscribing by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventKind {
    Connect,
    Disconnect,
    Register,
    Ping,
    Pong,
    Message,
    Notice,
    UserNotice,
    Whisper,
    GlobalUserState,
    UserState,
    RoomState,
    Join,
    Part,
    ClearChat,
    ClearMessage,
    HostTarget,
    Error,
}

impl Event {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connect => EventKind::Connect,
            Event::Disconnect(_) => EventKind::Disconnect,
            Event::Register => EventKind::Register,
            Event::Ping(_) => EventKind::Ping,
            Event::Pong(_) => EventKind::Pong,
            Event::Message(_) => EventKind::Message,
            Event::Notice(_) => EventKind::Notice,
            Event::UserNotice(_) => EventKind::UserNotice,
            Event::Whisper(_) => EventKind::Whisper,
            Event::GlobalUserState(_) => EventKind::GlobalUserState,
            Event::UserState(_) => EventKind::UserState,
            Event::RoomState(_) => EventKind::RoomState,
            Event::Join(_) => EventKind::Join,
            Event::Part(_) => EventKind::Part,
            Event::ClearChat(_) => EventKind::ClearChat,
            Event::ClearMessage(_) => EventKind::ClearMessage,
            Event::HostTarget(_) => EventKind::HostTarget,
            Event::Error(_) => EventKind::Error,
        }
    }

    /// Raw line this event was decoded from, when one exists.
    ///
    /// Lifecycle events (`connect`, `disconnect`, `register`, `error`)
    /// have no wire counterpart and return `None`.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Event::Ping(e) => Some(&e.raw),
            Event::Pong(e) => Some(&e.raw),
            Event::Message(e) => Some(&e.raw),
            Event::Notice(e) => Some(&e.raw),
            Event::UserNotice(e) => Some(&e.raw),
            Event::Whisper(e) => Some(&e.raw),
            Event::GlobalUserState(e) => Some(&e.raw),
            Event::UserState(e) => Some(&e.raw),
            Event::RoomState(e) => Some(&e.raw),
            Event::Join(e) => Some(&e.raw),
            Event::Part(e) => Some(&e.raw),
            Event::ClearChat(e) => Some(&e.raw),
            Event::ClearMessage(e) => Some(&e.raw),
            Event::HostTarget(e) => Some(&e.raw),
            _ => None,
        }
    }
}
