//! Account model representing an authorized mailbox connection

use serde::{Deserialize, Serialize};

/// A connected mailbox.
///
/// `id` is the provider grant identifier when one was returned by the
/// authorization exchange. `token` is unique across accounts.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub provider: String,
    pub email_address: String,
    pub name: String,
}

impl Account {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: String::new(),
            token: token.into(),
            provider: "gmail".to_string(),
            email_address: String::new(),
            name: String::new(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email_address = email.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }
}

// Tokens stay out of logs
impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("token", &redact(&self.token))
            .field("provider", &self.provider)
            .field("email_address", &self.email_address)
            .field("name", &self.name)
            .finish()
    }
}

/// Keep the first few characters of a secret for correlation
pub(crate) fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    format!("{prefix}…")
}
