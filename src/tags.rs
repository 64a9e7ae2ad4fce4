//! Normalization of raw message tags into typed values.
//!
//! The server annotates state-bearing messages with a flat map of string
//! tags. This module converts that map into typed values: booleans,
//! integers, badge maps, and emote placements. Normalization is total:
//! malformed input degrades to a documented default instead of failing,
//! and unknown or future server tags always pass through as strings.

use std::collections::HashMap;
use std::sync::OnceLock;

/// A normalized tag map, keyed by public (camelCase) tag names.
pub type TagMap = HashMap<String, TagValue>;

/// Placement of a single emote within a message, as byte offsets into
/// the message text (`end` is inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmoteRange {
    pub start: usize,
    pub end: usize,
}

/// A typed tag value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TagValue {
    /// Flag-like tags, and the disabled/enabled arms of the three-way
    /// `followers-only` and `slow` tags.
    Bool(bool),
    /// Counter- and timestamp-like tags.
    Int(i64),
    /// Everything not otherwise typed, with `\s` escapes resolved.
    Str(String),
    /// `badges` / `badgeInfo`: badge name to version.
    Badges(HashMap<String, String>),
    /// `emotes`: emote id to its placements in the message text.
    Emotes(HashMap<String, Vec<EmoteRange>>),
}

impl TagValue {
    /// Boolean value, if this tag normalized to one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value, if this tag normalized to one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            TagValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// String value, if this tag passed through as one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Tags normalized to `true` on `"1"` and `false` on anything else.
const BOOLEAN_TAGS: &[&str] = &[
    "mod",
    "emote-only",
    "r9k",
    "rituals",
    "subs-only",
    "msg-param-should-share-streak",
];

/// Tags normalized to base-10 integers; unparseable values degrade to 0.
const NUMERIC_TAGS: &[&str] = &[
    "tmi-sent-ts",
    "bits",
    "ban-duration",
    "msg-param-cumulative-months",
    "msg-param-months",
    "msg-param-promo-gift-total",
    "msg-param-streak-months",
    "msg-param-viewerCount",
    "msg-param-threshold",
];

/// Legacy tags dropped from normalized maps entirely.
const DEPRECATED_TAGS: &[&str] = &["subscriber", "turbo", "user-type"];

/// Public name for a wire tag key. Hyphenated keys are renamed to their
/// camelCase equivalents; anything unlisted passes through unchanged.
fn public_name(wire: &str) -> &str {
    match wire {
        "badge-info" => "badgeInfo",
        "display-name" => "displayName",
        "emote-sets" => "emoteSets",
        "room-id" => "roomId",
        "tmi-sent-ts" => "tmiSentTs",
        "user-id" => "userId",
        "target-msg-id" => "targetMsgId",
        "target-user-id" => "targetUserId",
        "msg-id" => "msgId",
        "system-msg" => "systemMsg",
        "emote-only" => "emoteOnly",
        "followers-only" => "followersOnly",
        "subs-only" => "subsOnly",
        "ban-duration" => "banDuration",
        "message-id" => "messageId",
        "thread-id" => "threadId",
        "msg-param-cumulative-months" => "msgParamCumulativeMonths",
        "msg-param-displayName" => "msgParamDisplayName",
        "msg-param-login" => "msgParamLogin",
        "msg-param-months" => "msgParamMonths",
        "msg-param-promo-gift-total" => "msgParamPromoGiftTotal",
        "msg-param-promo-name" => "msgParamPromoName",
        "msg-param-recipient-display-name" => "msgParamRecipientDisplayName",
        "msg-param-recipient-id" => "msgParamRecipientId",
        "msg-param-recipient-user-name" => "msgParamRecipientUserName",
        "msg-param-sender-login" => "msgParamSenderLogin",
        "msg-param-sender-name" => "msgParamSenderName",
        "msg-param-should-share-streak" => "msgParamShouldShareStreak",
        "msg-param-streak-months" => "msgParamStreakMonths",
        "msg-param-sub-plan" => "msgParamSubPlan",
        "msg-param-sub-plan-name" => "msgParamSubPlanName",
        "msg-param-viewerCount" => "msgParamViewerCount",
        "msg-param-ritual-name" => "msgParamRitualName",
        "msg-param-threshold" => "msgParamThreshold",
        other => other,
    }
}

/// `emotes` format: `/`-delimited entries of `id:start-end,start-end,...`.
///
/// Malformed entries are skipped; empty input yields an empty map.
fn parse_emotes(raw: &str) -> HashMap<String, Vec<EmoteRange>> {
    let mut emotes = HashMap::new();
    if raw.is_empty() {
        return emotes;
    }

    for entry in raw.split('/') {
        let Some((id, placements)) = entry.split_once(':') else {
            continue;
        };
        let ranges: Vec<EmoteRange> = placements
            .split(',')
            .filter_map(|span| {
                let (start, end) = span.split_once('-')?;
                Some(EmoteRange {
                    start: start.parse().ok()?,
                    end: end.parse().ok()?,
                })
            })
            .collect();
        emotes.insert(id.to_string(), ranges);
    }
    emotes
}

/// `badges` / `badge-info` format: `,`-delimited `name/version` pairs.
///
/// A pair without a version maps to the empty string; empty input yields
/// an empty map.
fn parse_badges(raw: &str) -> HashMap<String, String> {
    if raw.is_empty() {
        return HashMap::new();
    }

    raw.split(',')
        .filter(|badge| !badge.is_empty())
        .map(|badge| match badge.split_once('/') {
            Some((name, version)) => (name.to_string(), version.to_string()),
            None => (badge.to_string(), String::new()),
        })
        .collect()
}

/// Resolve `\s` escapes to literal spaces.
fn unescape_spaces(value: &str) -> String {
    value.replace("\\s", " ")
}

fn normalize_value(wire_name: &str, value: &str) -> TagValue {
    match wire_name {
        "emotes" => TagValue::Emotes(parse_emotes(value)),
        "badges" | "badge-info" => TagValue::Badges(parse_badges(value)),
        // Three-way: -1 disabled, 0 enabled without a minimum, n minimum
        // follow age in minutes.
        "followers-only" => match value {
            "-1" => TagValue::Bool(false),
            "0" => TagValue::Bool(true),
            _ => match value.parse() {
                Ok(minutes) => TagValue::Int(minutes),
                Err(_) => TagValue::Bool(false),
            },
        },
        // 0 disabled, n seconds between messages.
        "slow" => match value {
            "0" => TagValue::Bool(false),
            _ => match value.parse() {
                Ok(seconds) => TagValue::Int(seconds),
                Err(_) => TagValue::Bool(false),
            },
        },
        _ if BOOLEAN_TAGS.contains(&wire_name) => TagValue::Bool(value == "1"),
        _ if NUMERIC_TAGS.contains(&wire_name) => TagValue::Int(value.parse().unwrap_or(0)),
        _ => TagValue::Str(unescape_spaces(value)),
    }
}

/// Normalize a raw tag map into typed values under public key names.
///
/// Total: never fails, never drops data other than the deprecated keys.
pub fn normalize_tags(raw: &HashMap<String, String>) -> TagMap {
    raw.iter()
        .filter(|(key, _)| !DEPRECATED_TAGS.contains(&key.as_str()))
        .map(|(key, value)| (public_name(key).to_string(), normalize_value(key, value)))
        .collect()
}

/// A raw tag map paired with its normalized form, computed on first
/// access and memoized.
///
/// Events carry one of these so that a message whose tags are never
/// inspected costs only the raw map, not a full normalization pass.
#[derive(Debug, Clone, Default)]
pub struct LazyTags {
    raw: HashMap<String, String>,
    normalized: OnceLock<TagMap>,
}

impl LazyTags {
    pub fn new(raw: HashMap<String, String>) -> Self {
        LazyTags {
            raw,
            normalized: OnceLock::new(),
        }
    }

    /// The raw wire tag map, values still escaped.
    pub fn raw(&self) -> &HashMap<String, String> {
        &self.raw
    }

    /// The normalized tag map, computed on first call.
    pub fn normalized(&self) -> &TagMap {
        self.normalized.get_or_init(|| normalize_tags(&self.raw))
    }
}
