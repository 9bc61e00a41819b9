//! Chat API records
//!
//! Wire payloads are decoded into `#[serde(deny_unknown_fields)]` shapes so
//! an upstream schema change fails the sync instead of silently dropping
//! columns.

use crate::error::{Error, Result};
use crate::types::SyncEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Room
// ============================================================================

/// A chat room as listed by `/rooms`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Room {
    /// Room ID
    pub id: String,
    /// Room name
    pub name: String,
    /// Room topic
    #[serde(default)]
    pub topic: Option<String>,
    /// Room picture
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Room URI, e.g. `cloud-custodian/cloud-custodian`. Absent for one-to-one rooms.
    #[serde(default)]
    pub uri: Option<String>,
    /// Path to the room
    pub url: String,
    /// Whether this is a one-to-one conversation
    #[serde(default)]
    pub one_to_one: bool,
    #[serde(default)]
    pub user_count: u32,
    #[serde(default)]
    pub unread_items: u32,
    #[serde(default)]
    pub mentions: u32,
    /// Notifications disabled for the current user
    #[serde(default)]
    pub lurk: bool,
    /// Room type: `ORG`, `REPO`, `ONETOONE`, ...
    #[serde(default)]
    pub github_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub noindex: bool,
    #[serde(default)]
    pub permissions: Option<Value>,
    #[serde(default)]
    pub room_member: bool,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub v: Option<u32>,
    #[serde(default)]
    pub security: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub matrix_room_link: Option<String>,
    #[serde(default)]
    pub users: Option<Value>,
    #[serde(default)]
    pub last_access_time: Option<DateTime<Utc>>,
    /// Counterpart of a one-to-one room
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(default)]
    pub favourite: Option<i64>,
    #[serde(default)]
    pub activity: Option<bool>,
    #[serde(default)]
    pub providers: Option<Vec<String>>,
}

impl Room {
    /// Decode a `/rooms` entry
    pub fn from_value(value: Value) -> Result<Self> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string();
        serde_json::from_value(value).map_err(|e| Error::malformed(format!("room {id}: {e}")))
    }

    /// Stable project key for this room: its URI, falling back to the URL path
    pub fn key(&self) -> &str {
        self.uri
            .as_deref()
            .unwrap_or_else(|| self.url.trim_start_matches('/'))
    }

    /// Whether the room type matches `room_type`, ignoring case
    pub fn is_type(&self, room_type: &str) -> bool {
        self.github_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(room_type))
    }
}

// ============================================================================
// Message
// ============================================================================

/// Message exactly as the chat API serves it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawChatMessage {
    id: String,
    text: String,
    html: Option<String>,
    sent: DateTime<Utc>,
    edited_at: Option<DateTime<Utc>>,
    from_user: Value,
    parent_id: Option<String>,
    thread_message_count: Option<u32>,
    #[serde(default)]
    unread: bool,
    #[serde(default)]
    read_by: u32,
    #[serde(default)]
    urls: Vec<Value>,
    #[serde(default)]
    mentions: Vec<Value>,
    #[serde(default)]
    issues: Vec<Value>,
    #[serde(default)]
    meta: Value,
    v: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    gv: Option<u32>,
    status: Option<bool>,
    virtual_user: Option<Value>,
}

/// A normalized chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    /// Plain-text/markdown body
    pub text: String,
    pub html: Option<String>,
    pub sent: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    /// Username of the sender
    pub author: String,
    /// Sender record as served upstream
    pub from_user: Value,
    /// Parent message ID when this is a thread reply
    pub parent: Option<String>,
    pub thread_message_count: u32,
    pub unread: bool,
    pub read_by: u32,
    pub urls: Vec<Value>,
    pub mentions: Vec<Value>,
    pub issues: Vec<Value>,
    pub meta: Value,
    pub v: Option<u32>,
    pub gv: Option<u32>,
    /// `/me` status message
    pub status: Option<bool>,
    pub virtual_user: Option<Value>,
}

impl ChatMessage {
    /// Validate and normalize one wire message.
    ///
    /// Fails on unknown or missing required fields and on a sender without a
    /// username.
    pub fn from_value(value: Value) -> Result<Self> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string();
        let raw: RawChatMessage = serde_json::from_value(value)
            .map_err(|e| Error::malformed(format!("message {id}: {e}")))?;

        let author = raw
            .from_user
            .get("username")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed(format!("message {id}: fromUser has no username")))?
            .to_string();

        Ok(Self {
            id: raw.id,
            text: raw.text,
            html: raw.html,
            sent: raw.sent,
            edited_at: raw.edited_at,
            author,
            from_user: raw.from_user,
            parent: raw.parent_id,
            thread_message_count: raw.thread_message_count.unwrap_or_default(),
            unread: raw.unread,
            read_by: raw.read_by,
            urls: raw.urls,
            mentions: raw.mentions,
            issues: raw.issues,
            meta: raw.meta,
            v: raw.v,
            gv: raw.gv,
            status: raw.status,
            virtual_user: raw.virtual_user,
        })
    }

    /// Decode a page of wire messages, failing on the first bad one
    pub fn from_page(values: Vec<Value>) -> Result<Vec<Self>> {
        values.into_iter().map(Self::from_value).collect()
    }
}

impl SyncEvent for ChatMessage {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.sent
    }

    fn reply_count(&self) -> u32 {
        self.thread_message_count
    }
}

/// Accepts `3`, `"3"` or null
fn lenient_u32<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u32>, D::Error> {
    use serde::de::Error as _;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid gv {n}"))),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid gv {s:?}"))),
        Some(other) => Err(D::Error::custom(format!("invalid gv {other}"))),
    }
}
