//! Provider wire types
//!
//! Field names follow the provider's snake_case JSON. The camelCase aliases
//! accept payloads that went through an SDK before reaching us.

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// List responses arrive either wrapped in `{"data": [...]}` or as a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    Array(Vec<T>),
    Wrapped {
        #[serde(default)]
        data: Option<Vec<T>>,
        #[serde(default, alias = "nextCursor")]
        next_cursor: Option<String>,
    },
}

impl<T> ListEnvelope<T> {
    /// Flatten either shape into a plain list
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListEnvelope::Array(items) => items,
            ListEnvelope::Wrapped { data, .. } => data.unwrap_or_default(),
        }
    }

    pub fn next_cursor(&self) -> Option<&str> {
        match self {
            ListEnvelope::Array(_) => None,
            ListEnvelope::Wrapped { next_cursor, .. } => next_cursor.as_deref(),
        }
    }
}

impl ListEnvelope<Value> {
    /// Decode message items one at a time. A record that does not fit the
    /// wire shape is kept with its decode error so the mapper can count it.
    pub fn into_messages(self) -> Vec<RawMessage> {
        self.into_items().into_iter().map(RawMessage::from_value).collect()
    }

    /// Decode items one at a time, dropping the ones that do not fit
    pub fn into_decoded<T: DeserializeOwned>(self, what: &str) -> Vec<T> {
        self.into_items()
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Skipping undecodable {}: {}", what, e);
                    None
                }
            })
            .collect()
    }
}

/// Single-object responses, wrapped or bare
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ObjectEnvelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> ObjectEnvelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            ObjectEnvelope::Wrapped { data } => data,
            ObjectEnvelope::Bare(value) => value,
        }
    }
}

/// A name/email pair as the provider sends it
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Participant {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Labels are objects on some providers and plain strings on others
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawLabel {
    Named {
        name: String,
        #[serde(default)]
        id: Option<String>,
    },
    Plain(String),
}

impl RawLabel {
    pub fn name(&self) -> &str {
        match self {
            RawLabel::Named { name, .. } => name,
            RawLabel::Plain(name) => name,
        }
    }
}

/// `references` is a single header string or a list of message ids
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawReferences {
    One(String),
    Many(Vec<String>),
}

impl RawReferences {
    pub fn joined(&self) -> String {
        match self {
            RawReferences::One(s) => s.trim().to_string(),
            RawReferences::Many(ids) => ids.join(" "),
        }
    }
}

/// Attachment metadata on a message
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawAttachment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, alias = "contentType")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default, alias = "isInline")]
    pub is_inline: Option<bool>,
    #[serde(default, alias = "contentId")]
    pub content_id: Option<String>,
}

/// A message as returned by the messages endpoints
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "grantId")]
    pub grant_id: Option<String>,
    #[serde(default, alias = "threadId")]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    /// Seconds since the Unix epoch
    #[serde(default)]
    pub date: Option<i64>,
    #[serde(default)]
    pub from: Option<Vec<Participant>>,
    #[serde(default)]
    pub to: Option<Vec<Participant>>,
    #[serde(default)]
    pub cc: Option<Vec<Participant>>,
    #[serde(default)]
    pub bcc: Option<Vec<Participant>>,
    #[serde(default, alias = "replyTo")]
    pub reply_to: Option<Vec<Participant>>,
    #[serde(default, alias = "files")]
    pub attachments: Option<Vec<RawAttachment>>,
    #[serde(default)]
    pub labels: Option<Vec<RawLabel>>,
    #[serde(default)]
    pub folders: Option<Vec<String>>,
    #[serde(default, alias = "messageId")]
    pub message_id: Option<String>,
    #[serde(default, alias = "inReplyTo")]
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub references: Option<RawReferences>,
    #[serde(default)]
    pub unread: Option<bool>,
    #[serde(default)]
    pub starred: Option<bool>,
    /// Set when the record could not be decoded
    #[serde(skip)]
    pub decode_error: Option<String>,
}

impl RawMessage {
    pub fn from_value(value: Value) -> Self {
        let id = value.get("id").and_then(Value::as_str).map(str::to_string);
        match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Message {:?} does not match the wire shape: {}", id, e);
                RawMessage {
                    id,
                    decode_error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }
}

/// A thread as returned by the threads endpoint
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawThread {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default, alias = "latestMessageReceivedDate")]
    pub latest_message_received_date: Option<i64>,
    #[serde(default, alias = "messageIds")]
    pub message_ids: Option<Vec<String>>,
    #[serde(default)]
    pub participants: Option<Vec<Participant>>,
    #[serde(default)]
    pub folders: Option<Vec<String>>,
    #[serde(default)]
    pub unread: Option<bool>,
}

/// An authorized mailbox connection
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Grant {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, alias = "grantStatus")]
    pub grant_status: Option<String>,
}

/// Body of a create-draft request
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DraftPayload {
    pub subject: String,
    pub body: String,
    pub to: Vec<Participant>,
    pub cc: Vec<Participant>,
    pub bcc: Vec<Participant>,
    pub reply_to: Vec<Participant>,
    #[serde(rename = "reply_to_message_id", skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// A created draft; `id` may be missing on malformed responses
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Draft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "threadId")]
    pub thread_id: Option<String>,
}
