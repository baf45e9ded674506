//! Account registration and access checks

use anyhow::Result;
use chrono::Utc;
use log::info;
use serde::Deserialize;

use crate::models::{Account, redact};
use crate::storage::MailStore;

/// Provider assumed when the authorization exchange does not say
pub const DEFAULT_PROVIDER: &str = "gmail";

/// Result of a completed authorization exchange
#[derive(Clone, Default, Deserialize)]
pub struct AuthorizedGrant {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "grantId")]
    pub grant_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl std::fmt::Debug for AuthorizedGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedGrant")
            .field("access_token", &redact(&self.access_token))
            .field("grant_id", &self.grant_id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("provider", &self.provider)
            .finish()
    }
}

/// Errors from [`authorize_account`]
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("account {0} not found for this user")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Create or refresh the account for an authorization.
///
/// Keyed by token: re-authorizing updates token, email and name of the
/// existing row and keeps its id.
pub fn register_account(
    store: &dyn MailStore,
    grant: AuthorizedGrant,
    user_id: &str,
) -> Result<Account> {
    let id = grant
        .grant_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("nylas_{}", Utc::now().timestamp_millis()));

    let account = Account::new(id, grant.access_token)
        .with_user(user_id)
        .with_email(grant.email.unwrap_or_default())
        .with_name(grant.name.unwrap_or_default())
        .with_provider(
            grant
                .provider
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
        );

    let stored = store.upsert_account(account)?;
    info!("Registered account {} for user {}", stored.id, stored.user_id);
    Ok(stored)
}

/// Load an account, checking that it belongs to `user_id`
pub fn authorize_account(
    store: &dyn MailStore,
    account_id: &str,
    user_id: &str,
) -> Result<Account, AccountError> {
    match store.get_account(account_id)? {
        Some(account) if account.user_id == user_id => Ok(account),
        _ => Err(AccountError::NotFound(account_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryMailStore;

    fn grant(token: &str, grant_id: Option<&str>) -> AuthorizedGrant {
        AuthorizedGrant {
            access_token: token.to_string(),
            grant_id: grant_id.map(str::to_string),
            email: Some("me@example.com".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_register_uses_grant_id() {
        let store = InMemoryMailStore::new();
        let account = register_account(&store, grant("tok", Some("grant-1")), "user-1").unwrap();

        assert_eq!(account.id, "grant-1");
        assert_eq!(account.provider, DEFAULT_PROVIDER);
        assert_eq!(account.email_address, "me@example.com");
    }

    #[test]
    fn test_register_generates_id_without_grant() {
        let store = InMemoryMailStore::new();
        let account = register_account(&store, grant("tok", None), "user-1").unwrap();
        assert!(account.id.starts_with("nylas_"));
    }

    #[test]
    fn test_reauthorization_updates_existing_row() {
        let store = InMemoryMailStore::new();
        register_account(&store, grant("tok", Some("grant-1")), "user-1").unwrap();

        let mut again = grant("tok", None);
        again.name = Some("Me".to_string());
        let account = register_account(&store, again, "user-1").unwrap();

        assert_eq!(account.id, "grant-1");
        assert_eq!(account.name, "Me");
    }

    #[test]
    fn test_authorize_checks_owner() {
        let store = InMemoryMailStore::new();
        register_account(&store, grant("tok", Some("grant-1")), "user-1").unwrap();

        assert!(authorize_account(&store, "grant-1", "user-1").is_ok());
        assert!(matches!(
            authorize_account(&store, "grant-1", "user-2"),
            Err(AccountError::NotFound(_))
        ));
        assert!(authorize_account(&store, "nope", "user-1").is_err());
    }

    #[test]
    fn test_grant_parses_camel_case() {
        let grant: AuthorizedGrant =
            serde_json::from_str(r#"{"accessToken":"secret-token","grantId":"g1"}"#).unwrap();
        assert_eq!(grant.grant_id.as_deref(), Some("g1"));
        assert!(!format!("{:?}", grant).contains("secret-token"));
    }
}
