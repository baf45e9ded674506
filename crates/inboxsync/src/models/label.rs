//! Label classification for canonical messages

use serde::{Deserialize, Serialize};

/// Well-known provider system labels
pub mod labels {
    pub const INBOX: &str = "INBOX";
    pub const SENT: &str = "SENT";
    pub const DRAFT: &str = "DRAFT";
    pub const DRAFTS: &str = "DRAFTS";

    /// Case-insensitive label membership check
    pub fn contains(labels: &[String], name: &str) -> bool {
        labels.iter().any(|l| l.eq_ignore_ascii_case(name))
    }

    pub fn is_inbox(labels: &[String]) -> bool {
        contains(labels, INBOX)
    }

    pub fn is_sent(labels: &[String]) -> bool {
        contains(labels, SENT)
    }

    pub fn is_draft(labels: &[String]) -> bool {
        contains(labels, DRAFT) || contains(labels, DRAFTS)
    }
}

/// Primary classification of a message, used for tab membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailLabel {
    #[default]
    Inbox,
    Sent,
    Draft,
}

impl EmailLabel {
    /// Derive the classification from provider labels.
    ///
    /// Drafts win over sent, sent wins over inbox. Messages carrying none of
    /// the system labels are treated as inbox mail.
    pub fn from_labels(sys_labels: &[String]) -> Self {
        if labels::is_draft(sys_labels) {
            EmailLabel::Draft
        } else if labels::is_sent(sys_labels) {
            EmailLabel::Sent
        } else {
            EmailLabel::Inbox
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailLabel::Inbox => "inbox",
            EmailLabel::Sent => "sent",
            EmailLabel::Draft => "draft",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "sent" => EmailLabel::Sent,
            "draft" | "drafts" => EmailLabel::Draft,
            _ => EmailLabel::Inbox,
        }
    }
}

/// Message sensitivity marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    #[default]
    Normal,
    Private,
    Personal,
    Confidential,
}

impl Sensitivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::Normal => "normal",
            Sensitivity::Private => "private",
            Sensitivity::Personal => "personal",
            Sensitivity::Confidential => "confidential",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "private" => Sensitivity::Private,
            "personal" => Sensitivity::Personal,
            "confidential" => Sensitivity::Confidential,
            _ => Sensitivity::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_email_label_from_labels() {
        assert_eq!(EmailLabel::from_labels(&strings(&["INBOX"])), EmailLabel::Inbox);
        assert_eq!(EmailLabel::from_labels(&strings(&["sent"])), EmailLabel::Sent);
        assert_eq!(EmailLabel::from_labels(&strings(&["DRAFT", "SENT"])), EmailLabel::Draft);
        assert_eq!(EmailLabel::from_labels(&[]), EmailLabel::Inbox);
    }

    #[test]
    fn test_label_membership_is_case_insensitive() {
        let l = strings(&["Inbox", "Drafts"]);
        assert!(labels::is_inbox(&l));
        assert!(labels::is_draft(&l));
        assert!(!labels::is_sent(&l));
    }

    #[test]
    fn test_parse_round_trip() {
        for label in [EmailLabel::Inbox, EmailLabel::Sent, EmailLabel::Draft] {
            assert_eq!(EmailLabel::parse(label.as_str()), label);
        }
        assert_eq!(Sensitivity::parse("Confidential"), Sensitivity::Confidential);
        assert_eq!(Sensitivity::parse("whatever"), Sensitivity::Normal);
    }
}
