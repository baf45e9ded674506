//! Reply composition and two-phase send
//!
//! Sending is create-draft then send-by-id. The draft id returned by the
//! first call is required before the second is attempted. Failures are not
//! retried and orphaned drafts are left on the provider.

use log::{info, warn};

use crate::models::{EmailAddress, EmailMessage, ThreadId};
use crate::provider::api::Participant;
use crate::provider::{DraftPayload, MailProvider, ProviderError, RawMessage};
use crate::query::get_reply_details;
use crate::storage::MailStore;

/// Errors from the send path
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to create draft: {0}")]
    DraftCreate(#[source] ProviderError),

    #[error("provider returned a draft without an id")]
    MissingDraftId,

    #[error("failed to send draft {draft_id}: {source}")]
    DraftSend {
        draft_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("thread {0} has no messages to reply to")]
    NothingToReplyTo(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// A message ready to hand to the provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingEmail {
    pub subject: String,
    pub body: String,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub reply_to: Option<EmailAddress>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub thread_id: Option<ThreadId>,
}

impl OutgoingEmail {
    fn to_payload(&self) -> DraftPayload {
        DraftPayload {
            subject: self.subject.clone(),
            body: self.body.clone(),
            to: participants(&self.to),
            cc: participants(&self.cc),
            bcc: participants(&self.bcc),
            reply_to: self.reply_to.iter().map(participant).collect(),
            in_reply_to: self.in_reply_to.clone(),
            references: self.references.clone(),
            thread_id: self.thread_id.as_ref().map(|t| t.as_str().to_string()),
        }
    }
}

/// Draft recipients carry the address as the name when none is known
fn participant(addr: &EmailAddress) -> Participant {
    Participant {
        name: Some(addr.display_name().to_string()),
        email: Some(addr.address.clone()),
    }
}

fn participants(list: &[EmailAddress]) -> Vec<Participant> {
    list.iter().map(participant).collect()
}

/// `Re: ` prefix unless the subject already carries one
pub fn reply_subject(subject: &str) -> String {
    let has_prefix = subject
        .get(..3)
        .is_some_and(|p| p.eq_ignore_ascii_case("re:"));
    if has_prefix {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    }
}

/// Compose a reply to `original`
pub fn build_reply(original: &EmailMessage, body: impl Into<String>) -> OutgoingEmail {
    OutgoingEmail {
        subject: reply_subject(&original.subject),
        body: body.into(),
        to: original.to.clone(),
        cc: original.cc.clone(),
        bcc: Vec::new(),
        reply_to: Some(original.from.clone()).filter(|f| !f.address.is_empty()),
        in_reply_to: Some(original.id.as_str().to_string()),
        references: Some(original.internet_message_id.clone()).filter(|r| !r.is_empty()),
        thread_id: Some(original.thread_id.clone()),
    }
}

/// Create a draft and send it
pub fn send_email(
    provider: &dyn MailProvider,
    identifier: &str,
    email: &OutgoingEmail,
) -> Result<RawMessage, SendError> {
    let draft = provider
        .create_draft(identifier, &email.to_payload())
        .map_err(SendError::DraftCreate)?;

    let Some(draft_id) = draft.id.filter(|id| !id.is_empty()) else {
        warn!("Draft for {:?} came back without an id, not sending", email.subject);
        return Err(SendError::MissingDraftId);
    };

    let sent = provider
        .send_draft(identifier, &draft_id)
        .map_err(|source| SendError::DraftSend {
            draft_id: draft_id.clone(),
            source,
        })?;

    info!("Sent draft {} ({} recipients)", draft_id, email.to.len());
    Ok(sent)
}

/// Reply to the latest message of a stored thread
pub fn reply_to_thread(
    store: &dyn MailStore,
    provider: &dyn MailProvider,
    identifier: &str,
    account_id: &str,
    thread_id: &ThreadId,
    body: &str,
) -> Result<RawMessage, SendError> {
    let latest = get_reply_details(store, account_id, thread_id)?
        .and_then(|details| details.latest)
        .ok_or_else(|| SendError::NothingToReplyTo(thread_id.as_str().to_string()))?;

    send_email(provider, identifier, &build_reply(&latest, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;

    fn original() -> EmailMessage {
        EmailMessage::builder(MessageId::new("m1"), ThreadId::new("t1"))
            .subject("Meeting notes")
            .internet_message_id("<abc@mail.example.com>")
            .from(EmailAddress::with_name("Alice", "alice@example.com"))
            .to(vec![EmailAddress::new("bob@example.com")])
            .cc(vec![EmailAddress::with_name("Carol", "carol@example.com")])
            .build()
    }

    #[test]
    fn test_reply_subject() {
        assert_eq!(reply_subject("Meeting notes"), "Re: Meeting notes");
        assert_eq!(reply_subject("Re: Meeting notes"), "Re: Meeting notes");
        assert_eq!(reply_subject("RE: shouting"), "RE: shouting");
        assert_eq!(reply_subject(""), "Re: ");
    }

    #[test]
    fn test_build_reply() {
        let reply = build_reply(&original(), "Thanks!");

        assert_eq!(reply.subject, "Re: Meeting notes");
        assert_eq!(reply.body, "Thanks!");
        assert_eq!(reply.to, vec![EmailAddress::new("bob@example.com")]);
        assert_eq!(reply.cc.len(), 1);
        assert_eq!(reply.in_reply_to.as_deref(), Some("m1"));
        assert_eq!(reply.references.as_deref(), Some("<abc@mail.example.com>"));
        assert_eq!(reply.thread_id, Some(ThreadId::new("t1")));
        assert_eq!(
            reply.reply_to,
            Some(EmailAddress::with_name("Alice", "alice@example.com"))
        );
    }

    #[test]
    fn test_reply_without_message_id_has_no_references() {
        let mut msg = original();
        msg.internet_message_id = String::new();
        assert_eq!(build_reply(&msg, "x").references, None);
    }

    #[test]
    fn test_payload_names_default_to_address() {
        let payload = build_reply(&original(), "x").to_payload();

        assert_eq!(payload.to[0].name.as_deref(), Some("bob@example.com"));
        assert_eq!(payload.cc[0].name.as_deref(), Some("Carol"));
        assert_eq!(payload.reply_to[0].email.as_deref(), Some("alice@example.com"));
        assert_eq!(payload.thread_id.as_deref(), Some("t1"));
    }
}
