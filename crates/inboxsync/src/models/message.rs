//! Canonical message model

use super::{EmailLabel, Sensitivity, ThreadId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An email address with a display name.
///
/// Both fields default to empty strings; `address` is the identity key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    pub name: String,
    pub address: String,
}

impl EmailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            address: address.into(),
        }
    }

    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Parse an address like "Jane Doe <jane@example.com>"
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(angle_start) = s.rfind('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = s[..angle_start].trim().trim_matches('"');
            let address = s[angle_start + 1..angle_end].trim();
            return Self::with_name(name, address);
        }

        Self::new(s)
    }

    /// Name if present, otherwise the address
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.address
        } else {
            &self.name
        }
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_empty() && self.name.is_empty()
    }

    /// Normalized identity key used for deduplication
    pub fn key(&self) -> String {
        self.address.trim().to_ascii_lowercase()
    }

    pub fn display(&self) -> String {
        if self.name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.name, self.address)
        }
    }
}

/// Attachment metadata (content is never stored by the core)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub inline: bool,
    pub content_id: Option<String>,
}

/// Provider-agnostic email message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub id: MessageId,
    pub thread_id: ThreadId,
    /// RFC 5322 Message-ID header, empty when the provider omits it
    pub internet_message_id: String,
    pub subject: String,
    pub body: String,
    pub body_snippet: String,
    pub sent_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub reply_to: Vec<EmailAddress>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub has_attachments: bool,
    pub attachments: Vec<Attachment>,
    pub sys_labels: Vec<String>,
    pub email_label: EmailLabel,
    pub sensitivity: Sensitivity,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub starred: bool,
}

impl EmailMessage {
    pub fn builder(id: MessageId, thread_id: ThreadId) -> MessageBuilder {
        MessageBuilder::new(id, thread_id)
    }

    /// Every address on the message, sender first
    pub fn participants(&self) -> impl Iterator<Item = &EmailAddress> {
        std::iter::once(&self.from)
            .chain(self.to.iter())
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .chain(self.reply_to.iter())
    }
}

/// Builder for [`EmailMessage`]
pub struct MessageBuilder {
    message: EmailMessage,
    email_label: Option<EmailLabel>,
}

impl MessageBuilder {
    fn new(id: MessageId, thread_id: ThreadId) -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        Self {
            message: EmailMessage {
                id,
                thread_id,
                internet_message_id: String::new(),
                subject: String::new(),
                body: String::new(),
                body_snippet: String::new(),
                sent_at: epoch,
                received_at: epoch,
                from: EmailAddress::default(),
                to: Vec::new(),
                cc: Vec::new(),
                bcc: Vec::new(),
                reply_to: Vec::new(),
                in_reply_to: None,
                references: None,
                has_attachments: false,
                attachments: Vec::new(),
                sys_labels: Vec::new(),
                email_label: EmailLabel::Inbox,
                sensitivity: Sensitivity::Normal,
                unread: false,
                starred: false,
            },
            email_label: None,
        }
    }

    pub fn internet_message_id(mut self, id: impl Into<String>) -> Self {
        self.message.internet_message_id = id.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.message.subject = subject.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.message.body = body.into();
        self
    }

    pub fn body_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.message.body_snippet = snippet.into();
        self
    }

    pub fn sent_at(mut self, sent_at: DateTime<Utc>) -> Self {
        self.message.sent_at = sent_at;
        self
    }

    pub fn received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.message.received_at = received_at;
        self
    }

    /// Set both sent and received timestamps
    pub fn date(self, at: DateTime<Utc>) -> Self {
        self.sent_at(at).received_at(at)
    }

    pub fn from(mut self, from: EmailAddress) -> Self {
        self.message.from = from;
        self
    }

    pub fn to(mut self, to: Vec<EmailAddress>) -> Self {
        self.message.to = to;
        self
    }

    pub fn cc(mut self, cc: Vec<EmailAddress>) -> Self {
        self.message.cc = cc;
        self
    }

    pub fn bcc(mut self, bcc: Vec<EmailAddress>) -> Self {
        self.message.bcc = bcc;
        self
    }

    pub fn reply_to(mut self, reply_to: Vec<EmailAddress>) -> Self {
        self.message.reply_to = reply_to;
        self
    }

    pub fn in_reply_to(mut self, in_reply_to: Option<String>) -> Self {
        self.message.in_reply_to = in_reply_to;
        self
    }

    pub fn references(mut self, references: Option<String>) -> Self {
        self.message.references = references;
        self
    }

    pub fn attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.message.attachments = attachments;
        self
    }

    pub fn sys_labels(mut self, sys_labels: Vec<String>) -> Self {
        self.message.sys_labels = sys_labels;
        self
    }

    /// Override the label-derived classification
    pub fn email_label(mut self, label: EmailLabel) -> Self {
        self.email_label = Some(label);
        self
    }

    pub fn sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.message.sensitivity = sensitivity;
        self
    }

    pub fn unread(mut self, unread: bool) -> Self {
        self.message.unread = unread;
        self
    }

    pub fn starred(mut self, starred: bool) -> Self {
        self.message.starred = starred;
        self
    }

    pub fn build(self) -> EmailMessage {
        let mut message = self.message;
        message.has_attachments = !message.attachments.is_empty();
        message.email_label = self
            .email_label
            .unwrap_or_else(|| EmailLabel::from_labels(&message.sys_labels));
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_with_name() {
        let addr = EmailAddress::parse("Jane Doe <jane@example.com>");
        assert_eq!(addr.name, "Jane Doe");
        assert_eq!(addr.address, "jane@example.com");
    }

    #[test]
    fn test_parse_address_quoted_name() {
        let addr = EmailAddress::parse("\"Doe, Jane\" <jane@example.com>");
        assert_eq!(addr.name, "Doe, Jane");
    }

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("  jane@example.com ");
        assert_eq!(addr.name, "");
        assert_eq!(addr.address, "jane@example.com");
    }

    #[test]
    fn test_display_name_falls_back_to_address() {
        assert_eq!(EmailAddress::new("a@b.c").display_name(), "a@b.c");
        assert_eq!(EmailAddress::with_name("A", "a@b.c").display_name(), "A");
    }

    #[test]
    fn test_key_is_case_insensitive() {
        assert_eq!(
            EmailAddress::new("Jane@Example.com").key(),
            EmailAddress::new("jane@example.com").key()
        );
    }

    #[test]
    fn test_builder_derives_flags() {
        let msg = EmailMessage::builder(MessageId::new("m1"), ThreadId::new("t1"))
            .sys_labels(vec!["SENT".to_string()])
            .attachments(vec![Attachment {
                id: "a1".to_string(),
                ..Default::default()
            }])
            .build();

        assert!(msg.has_attachments);
        assert_eq!(msg.email_label, EmailLabel::Sent);
        assert_eq!(msg.from, EmailAddress::default());
    }

    #[test]
    fn test_timestamps_serialize_as_iso8601() {
        let at = chrono::TimeZone::timestamp_opt(&Utc, 1_704_067_200, 0).unwrap();
        let msg = EmailMessage::builder(MessageId::new("m1"), ThreadId::new("t1"))
            .date(at)
            .build();

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sentAt"], "2024-01-01T00:00:00Z");
        assert_eq!(json["receivedAt"], "2024-01-01T00:00:00Z");
        assert_eq!(json["from"]["address"], "");
    }
}
