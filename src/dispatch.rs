//! Routing of decoded wire messages to typed events.
//!
//! Each received line is decoded and routed by command name to exactly
//! one normalization routine, which emits the corresponding event.
//! Unrecognized commands are ignored, keeping the client forward
//! compatible with protocol extensions. Three commands additionally
//! write into the state store; their tags are normalized once and the
//! same computation backs both the event and the stored copy.

use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::trace;

use crate::event::{
    ClearChatEvent, ClearMessageEvent, Event, GlobalUserStateEvent, HostTargetEvent, JoinEvent,
    MessageEvent, NoticeEvent, PartEvent, PingEvent, PongEvent, RoomStateEvent, UserNoticeEvent,
    UserStateEvent, WhisperEvent,
};
use crate::message::Message;
use crate::state::{write_lock, StateStore};
use crate::tags::LazyTags;

/// Fixed reply to an inbound server liveness probe.
pub(crate) const PONG_REPLY: &str = "PONG :tmi.twitch.tv";

/// Outcome of dispatching one line, for the connection controller.
#[derive(Debug, Default)]
pub(crate) struct DispatchOutcome {
    /// Wire line that must be sent immediately (probe reply).
    pub reply: Option<&'static str>,
    /// Server-assigned nickname from a welcome reply.
    pub registered_nick: Option<String>,
    /// A probe reply was received.
    pub pong: bool,
}

/// Routes lines to normalization routines and emits events.
pub(crate) struct Dispatcher {
    events: broadcast::Sender<Event>,
    store: Arc<RwLock<StateStore>>,
}

impl Dispatcher {
    pub(crate) fn new(events: broadcast::Sender<Event>, store: Arc<RwLock<StateStore>>) -> Self {
        Dispatcher { events, store }
    }

    fn emit(&self, event: Event) {
        // A send error only means no subscribers are listening.
        let _ = self.events.send(event);
    }

    /// Decode and route one line.
    pub(crate) fn dispatch(&self, raw: &str) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        let msg = match Message::parse(raw) {
            Ok(msg) => msg,
            Err(e) => {
                trace!(line = raw, error = %e, "ignoring undecodable line");
                return outcome;
            }
        };

        match msg.command.as_str() {
            "PING" => {
                outcome.reply = Some(PONG_REPLY);
                self.emit(Event::Ping(PingEvent { raw: raw.to_string() }));
            }
            "PONG" => {
                outcome.pong = true;
                self.emit(Event::Pong(PongEvent { raw: raw.to_string() }));
            }
            // Numeric welcome: the sole signal that registration
            // succeeded. The first parameter is the server-assigned
            // nickname.
            "001" => {
                outcome.registered_nick = Some(
                    msg.params
                        .first()
                        .cloned()
                        .unwrap_or_default(),
                );
            }
            "PRIVMSG" => {
                let text = msg.trailing.clone().unwrap_or_default();
                let is_action = is_action(&text);
                self.emit(Event::Message(MessageEvent {
                    raw: raw.to_string(),
                    channel: channel_of(&msg),
                    user: sender_of(&msg),
                    message: if is_action {
                        strip_action(&text).to_string()
                    } else {
                        text
                    },
                    is_action,
                    tags: LazyTags::new(msg.tags),
                }));
            }
            "USERSTATE" => {
                let channel = channel_of(&msg);
                let tags = LazyTags::new(msg.tags);
                write_lock(&self.store).set_user_state(&channel, tags.normalized().clone());
                self.emit(Event::UserState(UserStateEvent {
                    raw: raw.to_string(),
                    channel,
                    tags,
                }));
            }
            "ROOMSTATE" => {
                let channel = channel_of(&msg);
                let tags = LazyTags::new(msg.tags);
                write_lock(&self.store).set_room_state(&channel, tags.normalized().clone());
                self.emit(Event::RoomState(RoomStateEvent {
                    raw: raw.to_string(),
                    channel,
                    tags,
                }));
            }
            "GLOBALUSERSTATE" => {
                let tags = LazyTags::new(msg.tags);
                write_lock(&self.store).merge_global_user_state(tags.normalized());
                self.emit(Event::GlobalUserState(GlobalUserStateEvent {
                    raw: raw.to_string(),
                    tags,
                }));
            }
            "JOIN" => {
                self.emit(Event::Join(JoinEvent {
                    raw: raw.to_string(),
                    channel: channel_of(&msg),
                    user: sender_of(&msg),
                }));
            }
            "PART" => {
                self.emit(Event::Part(PartEvent {
                    raw: raw.to_string(),
                    channel: channel_of(&msg),
                    user: sender_of(&msg),
                }));
            }
            "NOTICE" => {
                self.emit(Event::Notice(NoticeEvent {
                    raw: raw.to_string(),
                    channel: channel_of(&msg),
                    message: msg.trailing.clone().unwrap_or_default(),
                    tags: LazyTags::new(msg.tags),
                }));
            }
            "USERNOTICE" => {
                self.emit(Event::UserNotice(UserNoticeEvent {
                    raw: raw.to_string(),
                    channel: channel_of(&msg),
                    message: msg.trailing.clone().unwrap_or_default(),
                    tags: LazyTags::new(msg.tags),
                }));
            }
            "CLEARCHAT" => {
                self.emit(Event::ClearChat(ClearChatEvent {
                    raw: raw.to_string(),
                    channel: channel_of(&msg),
                    message: msg.trailing.clone().unwrap_or_default(),
                    tags: LazyTags::new(msg.tags),
                }));
            }
            "CLEARMSG" => {
                self.emit(Event::ClearMessage(ClearMessageEvent {
                    raw: raw.to_string(),
                    channel: channel_of(&msg),
                    message: msg.trailing.clone().unwrap_or_default(),
                    tags: LazyTags::new(msg.tags),
                }));
            }
            "HOSTTARGET" => {
                self.emit(Event::HostTarget(HostTargetEvent {
                    raw: raw.to_string(),
                    channel: channel_of(&msg),
                    message: msg.trailing.clone().unwrap_or_default(),
                    tags: LazyTags::new(msg.tags),
                }));
            }
            "WHISPER" => {
                self.emit(Event::Whisper(WhisperEvent {
                    raw: raw.to_string(),
                    channel: msg.params.first().cloned().unwrap_or_default(),
                    user: sender_of(&msg),
                    message: msg.trailing.clone().unwrap_or_default(),
                    tags: LazyTags::new(msg.tags),
                }));
            }
            other => {
                trace!(command = other, "ignoring unrecognized command");
            }
        }

        outcome
    }
}

/// Channel name extraction shared by every channel-scoped command.
fn channel_of(msg: &Message) -> String {
    msg.channel().unwrap_or_default().to_string()
}

fn sender_of(msg: &Message) -> String {
    msg.sender().unwrap_or_default().to_string()
}

const ACTION_PREFIX: &str = "\u{1}ACTION ";
const ACTION_SUFFIX: char = '\u{1}';

/// A chat message is an action when wrapped in the CTCP ACTION envelope.
fn is_action(text: &str) -> bool {
    text.starts_with(ACTION_PREFIX) && text.ends_with(ACTION_SUFFIX) && text.len() > ACTION_PREFIX.len()
}

/// Strip the action envelope. Callers must have checked [`is_action`].
fn strip_action(text: &str) -> &str {
    &text[ACTION_PREFIX.len()..text.len() - 1]
}
