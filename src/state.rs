//! Latest known per-channel and session-wide state.
//!
//! The store is a passive sink: the dispatcher writes into it as a side
//! effect of state-bearing messages, and callers read from it at any
//! time. Reads reflect exactly what has been received so far. Entries
//! are never removed: leaving a channel keeps its last known state
//! until a rejoin overwrites it.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::tags::TagMap;

/// State held for a single channel.
///
/// The two sub-maps are updated independently; writing one never
/// disturbs the other.
#[derive(Debug, Clone, Default)]
pub struct ChannelState {
    /// The authenticated user's standing in the channel (badges, color,
    /// moderator flag, ...).
    pub user_state: TagMap,
    /// Channel-wide settings (slow mode, followers-only, emote-only, ...).
    pub room_state: TagMap,
}

/// Passive storage for channel and session state.
#[derive(Debug, Default)]
pub struct StateStore {
    global_user_state: Option<TagMap>,
    channels: HashMap<String, ChannelState>,
}

impl StateStore {
    /// Session-wide state for the authenticated user, if received.
    pub fn global_user_state(&self) -> Option<&TagMap> {
        self.global_user_state.as_ref()
    }

    /// State for one channel, if any state-bearing message for it has
    /// been received. Lookup is case-normalized.
    pub fn channel(&self, name: &str) -> Option<&ChannelState> {
        self.channels.get(&normalize_key(name))
    }

    /// Names of every channel with stored state.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    /// Shallow-merge new global user state over the existing value.
    pub(crate) fn merge_global_user_state(&mut self, tags: &TagMap) {
        let merged = self.global_user_state.get_or_insert_with(TagMap::new);
        for (key, value) in tags {
            merged.insert(key.clone(), value.clone());
        }
    }

    /// Replace the user-state sub-map for a channel, preserving its
    /// room state.
    pub(crate) fn set_user_state(&mut self, channel: &str, tags: TagMap) {
        self.channels
            .entry(normalize_key(channel))
            .or_default()
            .user_state = tags;
    }

    /// Replace the room-state sub-map for a channel, preserving its
    /// user state.
    pub(crate) fn set_room_state(&mut self, channel: &str, tags: TagMap) {
        self.channels
            .entry(normalize_key(channel))
            .or_default()
            .room_state = tags;
    }
}

fn normalize_key(channel: &str) -> String {
    channel.to_ascii_lowercase()
}

/// Poison-tolerant read lock. State writes never panic while holding
/// the lock, so a poisoned lock still guards consistent data.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Poison-tolerant write lock.
pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
