//! Raw provider message normalization
//!
//! Converts provider payloads into canonical [`EmailMessage`] records.
//! Pure and deterministic: no network or storage access.

use chrono::{DateTime, TimeZone, Utc};

use super::api::{Participant, RawAttachment, RawMessage};
use crate::models::{
    Attachment, EmailAddress, EmailLabel, EmailMessage, MessageId, Sensitivity, ThreadId,
};

/// A raw record that cannot become a canonical message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("message has no id")]
    MissingId,

    #[error("message {0} has no thread id")]
    MissingThreadId(String),

    #[error("message {0} has no date")]
    MissingDate(String),

    #[error("message {id} has an unrepresentable date {date}")]
    InvalidDate { id: String, date: i64 },

    #[error("record {id:?} could not be decoded: {reason}")]
    Malformed { id: String, reason: String },
}

/// Normalize one raw provider message
pub fn normalize_message(mut raw: RawMessage) -> Result<EmailMessage, MappingError> {
    if let Some(reason) = raw.decode_error.take() {
        return Err(MappingError::Malformed {
            id: raw.id.unwrap_or_default(),
            reason,
        });
    }

    let sys_labels = extract_labels(&raw);
    let email_label = EmailLabel::from_labels(&sys_labels);

    let id = non_empty(raw.id).ok_or(MappingError::MissingId)?;
    let thread_id =
        non_empty(raw.thread_id).ok_or_else(|| MappingError::MissingThreadId(id.clone()))?;

    // Provider dates are epoch seconds
    let date = raw.date.ok_or_else(|| MappingError::MissingDate(id.clone()))?;
    let sent_at = epoch_seconds_to_utc(date).ok_or_else(|| MappingError::InvalidDate {
        id: id.clone(),
        date,
    })?;

    let from = raw
        .from
        .as_deref()
        .and_then(|list| list.first())
        .map(map_participant)
        .unwrap_or_default();

    let attachments: Vec<Attachment> = raw
        .attachments
        .unwrap_or_default()
        .into_iter()
        .map(map_attachment)
        .collect();

    Ok(EmailMessage {
        id: MessageId::new(id),
        thread_id: ThreadId::new(thread_id),
        internet_message_id: raw.message_id.unwrap_or_default(),
        subject: raw.subject.unwrap_or_default(),
        body: raw.body.unwrap_or_default(),
        body_snippet: raw.snippet.unwrap_or_default(),
        sent_at,
        received_at: sent_at,
        from,
        to: map_participants(raw.to),
        cc: map_participants(raw.cc),
        bcc: map_participants(raw.bcc),
        reply_to: map_participants(raw.reply_to),
        in_reply_to: non_empty(raw.in_reply_to),
        references: raw
            .references
            .map(|r| r.joined())
            .filter(|r| !r.is_empty()),
        has_attachments: !attachments.is_empty(),
        attachments,
        sys_labels,
        email_label,
        sensitivity: Sensitivity::Normal,
        unread: raw.unread.unwrap_or(false),
        starred: raw.starred.unwrap_or(false),
    })
}

/// Normalize a batch, splitting successes from per-record failures
pub fn normalize_messages(
    raws: Vec<RawMessage>,
) -> (Vec<EmailMessage>, Vec<MappingError>) {
    let mut messages = Vec::with_capacity(raws.len());
    let mut errors = Vec::new();

    for raw in raws {
        match normalize_message(raw) {
            Ok(message) => messages.push(message),
            Err(e) => errors.push(e),
        }
    }

    (messages, errors)
}

fn epoch_seconds_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    let millis = secs.checked_mul(1000)?;
    Utc.timestamp_millis_opt(millis).single()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn map_participant(p: &Participant) -> EmailAddress {
    EmailAddress::with_name(
        p.name.clone().unwrap_or_default(),
        p.email.clone().unwrap_or_default(),
    )
}

fn map_participants(list: Option<Vec<Participant>>) -> Vec<EmailAddress> {
    list.unwrap_or_default()
        .iter()
        .map(map_participant)
        .collect()
}

fn map_attachment(raw: RawAttachment) -> Attachment {
    Attachment {
        id: raw.id.unwrap_or_default(),
        name: raw.filename.unwrap_or_default(),
        mime_type: raw.content_type.unwrap_or_default(),
        size: raw.size.unwrap_or(0),
        inline: raw.is_inline.unwrap_or(false),
        content_id: non_empty(raw.content_id),
    }
}

/// Label names, falling back to folder ids when the provider sent no labels
fn extract_labels(raw: &RawMessage) -> Vec<String> {
    let mut names: Vec<String> = match &raw.labels {
        Some(labels) if !labels.is_empty() => {
            labels.iter().map(|l| l.name().to_string()).collect()
        }
        _ => raw.folders.clone().unwrap_or_default(),
    };
    names.retain(|n| !n.is_empty());
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::api::RawLabel;

    fn participant(name: Option<&str>, email: &str) -> Participant {
        Participant {
            name: name.map(str::to_string),
            email: Some(email.to_string()),
        }
    }

    fn minimal(id: &str, thread_id: &str) -> RawMessage {
        RawMessage {
            id: Some(id.to_string()),
            thread_id: Some(thread_id.to_string()),
            date: Some(1_709_251_200),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_optional_fields_become_empty() {
        let msg = normalize_message(minimal("m1", "t1")).unwrap();

        assert!(msg.to.is_empty());
        assert!(msg.cc.is_empty());
        assert!(msg.bcc.is_empty());
        assert!(msg.reply_to.is_empty());
        assert!(msg.attachments.is_empty());
        assert!(!msg.has_attachments);
        assert_eq!(msg.from, EmailAddress::default());
        assert_eq!(msg.subject, "");
        assert_eq!(msg.internet_message_id, "");
        assert_eq!(msg.in_reply_to, None);
        assert_eq!(msg.sensitivity, Sensitivity::Normal);
    }

    #[test]
    fn test_date_is_epoch_seconds() {
        let msg = normalize_message(minimal("m1", "t1")).unwrap();
        assert_eq!(msg.sent_at.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(msg.received_at, msg.sent_at);
    }

    #[test]
    fn test_from_takes_first_entry() {
        let mut raw = minimal("m1", "t1");
        raw.from = Some(vec![
            participant(Some("Alice"), "alice@example.com"),
            participant(Some("Bob"), "bob@example.com"),
        ]);

        let msg = normalize_message(raw).unwrap();
        assert_eq!(msg.from, EmailAddress::with_name("Alice", "alice@example.com"));
    }

    #[test]
    fn test_recipients_default_missing_names() {
        let mut raw = minimal("m1", "t1");
        raw.to = Some(vec![participant(None, "to@example.com")]);
        raw.cc = Some(vec![Participant::default()]);

        let msg = normalize_message(raw).unwrap();
        assert_eq!(msg.to, vec![EmailAddress::new("to@example.com")]);
        assert_eq!(msg.cc, vec![EmailAddress::default()]);
    }

    #[test]
    fn test_attachments_map_and_flag() {
        let mut raw = minimal("m1", "t1");
        raw.attachments = Some(vec![RawAttachment {
            id: Some("a1".to_string()),
            filename: Some("report.pdf".to_string()),
            content_type: Some("application/pdf".to_string()),
            size: Some(2048),
            is_inline: None,
            content_id: Some(String::new()),
        }]);

        let msg = normalize_message(raw).unwrap();
        assert!(msg.has_attachments);
        let a = &msg.attachments[0];
        assert_eq!(a.name, "report.pdf");
        assert_eq!(a.mime_type, "application/pdf");
        assert_eq!(a.size, 2048);
        assert!(!a.inline);
        assert_eq!(a.content_id, None);
    }

    #[test]
    fn test_labels_project_names() {
        let mut raw = minimal("m1", "t1");
        raw.labels = Some(vec![
            RawLabel::Named {
                name: "SENT".to_string(),
                id: Some("l1".to_string()),
            },
            RawLabel::Plain("IMPORTANT".to_string()),
        ]);
        raw.folders = Some(vec!["INBOX".to_string()]);

        let msg = normalize_message(raw).unwrap();
        assert_eq!(msg.sys_labels, vec!["SENT", "IMPORTANT"]);
        assert_eq!(msg.email_label, EmailLabel::Sent);
    }

    #[test]
    fn test_folders_used_when_labels_absent() {
        let mut raw = minimal("m1", "t1");
        raw.folders = Some(vec!["DRAFT".to_string()]);

        let msg = normalize_message(raw).unwrap();
        assert_eq!(msg.sys_labels, vec!["DRAFT"]);
        assert_eq!(msg.email_label, EmailLabel::Draft);
    }

    #[test]
    fn test_missing_ids_are_mapping_errors() {
        let mut raw = minimal("m1", "t1");
        raw.id = None;
        assert_eq!(normalize_message(raw), Err(MappingError::MissingId));

        let mut raw = minimal("m1", "t1");
        raw.thread_id = Some("  ".to_string());
        assert_eq!(
            normalize_message(raw),
            Err(MappingError::MissingThreadId("m1".to_string()))
        );
    }

    #[test]
    fn test_out_of_range_date_is_mapping_error() {
        let mut raw = minimal("m1", "t1");
        raw.date = Some(i64::MAX);
        assert!(matches!(
            normalize_message(raw),
            Err(MappingError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_missing_date_is_mapping_error() {
        let mut raw = minimal("m1", "t1");
        raw.date = None;
        assert_eq!(
            normalize_message(raw),
            Err(MappingError::MissingDate("m1".to_string()))
        );
    }

    #[test]
    fn test_undecodable_record_is_mapping_error() {
        let raw = RawMessage::from_value(serde_json::json!({"id": "m2", "date": "yesterday"}));
        assert!(matches!(
            normalize_message(raw),
            Err(MappingError::Malformed { id, .. }) if id == "m2"
        ));
    }

    #[test]
    fn test_normalize_messages_skips_bad_records() {
        let raws = vec![minimal("m1", "t1"), RawMessage::default(), minimal("m2", "t1")];
        let (messages, errors) = normalize_messages(raws);
        assert_eq!(messages.len(), 2);
        assert_eq!(errors, vec![MappingError::MissingId]);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let mut raw = minimal("m1", "t1");
        raw.subject = Some("Hello".to_string());
        raw.references = Some(crate::provider::api::RawReferences::One("<a@x>".to_string()));
        assert_eq!(normalize_message(raw.clone()), normalize_message(raw));
    }
}
