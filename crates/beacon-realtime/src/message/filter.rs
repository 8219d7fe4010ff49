//! Criteria-based message filtering and payload transformation.
//!
//! Criteria are ANDed; an unrecognized criterion passes. Transform rules run
//! in order, each producing a new [`Message`] fed to the next. Rules that
//! touch `data` only apply when `data` is a JSON object.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use serde_json::{Map, Value};

use super::types::Message;

/// One filter criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Exact or `*` wildcard match on the event name.
    Event(String),
    /// Exact or `*` wildcard match on the channel name.
    Channel(String),
    /// Deep search of `data` for an equal value.
    DataContains(Value),
    /// `data` equals the value.
    DataEquals(Value),
    /// `data.user_id` equals the value.
    UserId(Value),
    /// `data.connection_id` equals the value.
    ConnectionId(Value),
    /// `data.user_id` is present (or absent when `false`).
    HasUserId(bool),
    /// `data.connection_id` is present (or absent when `false`).
    HasConnectionId(bool),
    /// A criterion type this filter does not know about.
    Unknown(String),
}

impl Criterion {
    /// Builds a criterion from a `type -> value` entry.
    pub fn from_entry(kind: &str, value: Value) -> Self {
        match kind {
            "event" => value
                .as_str()
                .map(|s| Self::Event(s.to_string()))
                .unwrap_or_else(|| Self::Unknown(kind.to_string())),
            "channel" => value
                .as_str()
                .map(|s| Self::Channel(s.to_string()))
                .unwrap_or_else(|| Self::Unknown(kind.to_string())),
            "data_contains" => Self::DataContains(value),
            "data_equals" => Self::DataEquals(value),
            "user_id" => Self::UserId(value),
            "connection_id" => Self::ConnectionId(value),
            "has_user_id" => Self::HasUserId(value.as_bool().unwrap_or(true)),
            "has_connection_id" => Self::HasConnectionId(value.as_bool().unwrap_or(true)),
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Parses a JSON criteria mapping.
pub fn criteria_from_map(map: &Map<String, Value>) -> Vec<Criterion> {
    map.iter()
        .map(|(kind, value)| Criterion::from_entry(kind, value.clone()))
        .collect()
}

/// Caller-supplied transformation of a structured payload.
pub type DataCallback = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// One transform rule.
#[derive(Clone)]
pub enum TransformRule {
    /// Adds `timestamp` (unix seconds) and `timestamp_iso` to `data`.
    AddTimestamp,
    /// Merges the object into `data.user_info`.
    AddUserInfo(Map<String, Value>),
    /// Replaces `data` with the callback's result.
    Callback(DataCallback),
    /// Replaces the event name.
    ChangeEvent(String),
    /// Merges the object into `data.metadata`.
    AddMetadata(Map<String, Value>),
}

impl TransformRule {
    /// Builds a rule from a `type -> value` entry. Unknown types yield `None`.
    pub fn from_entry(kind: &str, value: &Value) -> Option<Self> {
        match kind {
            "add_timestamp" => value.as_bool().unwrap_or(true).then_some(Self::AddTimestamp),
            "add_user_info" => value.as_object().cloned().map(Self::AddUserInfo),
            "change_event" => value.as_str().map(|s| Self::ChangeEvent(s.to_string())),
            "add_metadata" => value.as_object().cloned().map(Self::AddMetadata),
            _ => None,
        }
    }
}

impl fmt::Debug for TransformRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddTimestamp => write!(f, "AddTimestamp"),
            Self::AddUserInfo(info) => f.debug_tuple("AddUserInfo").field(info).finish(),
            Self::Callback(_) => write!(f, "Callback(..)"),
            Self::ChangeEvent(event) => f.debug_tuple("ChangeEvent").field(event).finish(),
            Self::AddMetadata(meta) => f.debug_tuple("AddMetadata").field(meta).finish(),
        }
    }
}

/// Predicate and transform stage applied to messages before dispatch.
pub trait MessageFilter: Send + Sync + fmt::Debug {
    /// Returns `true` when every criterion passes.
    fn filter(&self, message: &Message, criteria: &[Criterion]) -> bool;

    /// Applies `rules` in order and returns the resulting message.
    fn transform(&self, message: &Message, rules: &[TransformRule]) -> Message;
}

/// Stock [`MessageFilter`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMessageFilter;

impl MessageFilter for DefaultMessageFilter {
    fn filter(&self, message: &Message, criteria: &[Criterion]) -> bool {
        criteria.iter().all(|criterion| matches(message, criterion))
    }

    fn transform(&self, message: &Message, rules: &[TransformRule]) -> Message {
        rules
            .iter()
            .fold(message.clone(), |current, rule| apply(&current, rule))
    }
}

fn matches(message: &Message, criterion: &Criterion) -> bool {
    match criterion {
        Criterion::Event(pattern) => wildcard_match(pattern, message.event()),
        Criterion::Channel(pattern) => message
            .channel()
            .is_some_and(|channel| wildcard_match(pattern, channel)),
        Criterion::DataContains(needle) => contains_value(message.data(), needle),
        Criterion::DataEquals(expected) => message.data() == expected,
        Criterion::UserId(expected) => data_field(message, "user_id")
            .is_some_and(|actual| loosely_equal(actual, expected)),
        Criterion::ConnectionId(expected) => data_field(message, "connection_id")
            .is_some_and(|actual| loosely_equal(actual, expected)),
        Criterion::HasUserId(present) => data_field(message, "user_id").is_some() == *present,
        Criterion::HasConnectionId(present) => {
            data_field(message, "connection_id").is_some() == *present
        }
        Criterion::Unknown(kind) => {
            tracing::trace!(criterion = %kind, "Ignoring unknown filter criterion");
            true
        }
    }
}

fn apply(message: &Message, rule: &TransformRule) -> Message {
    match rule {
        TransformRule::ChangeEvent(event) => match message.data_object() {
            Some(_) => message.with_event(event.clone()),
            None => message.clone(),
        },
        TransformRule::Callback(callback) => match message.data_object() {
            Some(_) => message.with_data(callback(message.data())),
            None => message.clone(),
        },
        TransformRule::AddTimestamp => edit_object(message, |data| {
            let now = Utc::now();
            data.insert("timestamp".into(), Value::from(now.timestamp()));
            data.insert("timestamp_iso".into(), Value::String(now.to_rfc3339()));
        }),
        TransformRule::AddUserInfo(info) => {
            edit_object(message, |data| merge_into(data, "user_info", info))
        }
        TransformRule::AddMetadata(meta) => {
            edit_object(message, |data| merge_into(data, "metadata", meta))
        }
    }
}

fn edit_object(message: &Message, edit: impl FnOnce(&mut Map<String, Value>)) -> Message {
    match message.data_object() {
        Some(data) => {
            let mut data = data.clone();
            edit(&mut data);
            message.with_data(Value::Object(data))
        }
        None => message.clone(),
    }
}

fn merge_into(data: &mut Map<String, Value>, key: &str, additions: &Map<String, Value>) {
    let slot = data
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(target) = slot {
        for (k, v) in additions {
            target.insert(k.clone(), v.clone());
        }
    }
}

fn data_field<'a>(message: &'a Message, key: &str) -> Option<&'a Value> {
    message
        .data_object()
        .and_then(|data| data.get(key))
        .filter(|value| !value.is_null())
}

/// `*` matches any run of characters; everything else is literal.
fn wildcard_match(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }
    let expr = format!("^{}$", regex::escape(pattern).replace(r"\*", ".*"));
    Regex::new(&expr)
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

fn contains_value(haystack: &Value, needle: &Value) -> bool {
    if haystack == needle {
        return true;
    }
    match haystack {
        Value::Array(items) => items.iter().any(|item| contains_value(item, needle)),
        Value::Object(fields) => fields.values().any(|field| contains_value(field, needle)),
        _ => false,
    }
}

/// Numbers and strings compare by their textual form, so `123` matches `"123"`.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (scalar_text(actual), scalar_text(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
