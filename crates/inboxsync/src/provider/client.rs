//! Provider HTTP client
//!
//! Issues list/get/create/send calls against the grant API.
//! Uses synchronous HTTP (ureq) to stay executor-agnostic.

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::api::{Draft, DraftPayload, Grant, ListEnvelope, ObjectEnvelope, RawMessage, RawThread};
use serde_json::Value;
use super::{Credential, ListQuery, MailProvider, ProviderError};
use crate::config::ProviderConfig;

type HttpResult = Result<ureq::http::Response<ureq::Body>, ureq::Error>;

/// HTTP client bound to one account credential.
///
/// The credential is fixed at construction; each account gets its own client
/// value, so requests never depend on shared mutable state.
pub struct NylasClient {
    agent: ureq::Agent,
    base_url: String,
    credential: Credential,
}

impl NylasClient {
    /// Create a client for one account
    pub fn new(config: &ProviderConfig, credential: Credential) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            base_url: config.api_uri.trim_end_matches('/').to_string(),
            credential,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn grant_url(&self, identifier: &str, path: &str) -> String {
        format!(
            "{}/v3/grants/{}/{}",
            self.base_url,
            urlencoding::encode(identifier),
            path
        )
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.credential.secret())
    }

    fn get_json<T: DeserializeOwned>(&self, operation: &'static str, url: &str) -> Result<T, ProviderError> {
        debug!("GET {} ({})", url, operation);
        let response = self
            .agent
            .get(url)
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .call();
        read_json(operation, response)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        debug!("POST {} ({})", url, operation);
        let response = self
            .agent
            .post(url)
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .send_json(body);
        read_json(operation, response)
    }

    fn post_empty<T: DeserializeOwned>(&self, operation: &'static str, url: &str) -> Result<T, ProviderError> {
        debug!("POST {} ({})", url, operation);
        let response = self
            .agent
            .post(url)
            .header("Authorization", &self.authorization())
            .header("Accept", "application/json")
            .send_empty();
        read_json(operation, response)
    }
}

/// Map a ureq result onto a decoded body or a classified error
fn read_json<T: DeserializeOwned>(operation: &'static str, response: HttpResult) -> Result<T, ProviderError> {
    match response {
        Ok(mut resp) => resp
            .body_mut()
            .read_json::<T>()
            .map_err(|e| ProviderError::Decode {
                operation,
                message: e.to_string(),
            }),
        Err(ureq::Error::StatusCode(status)) => Err(ProviderError::from_status(operation, status)),
        Err(e) => Err(ProviderError::Transport {
            operation,
            message: e.to_string(),
        }),
    }
}

impl MailProvider for NylasClient {
    fn list_messages(&self, identifier: &str, query: &ListQuery) -> Result<Vec<RawMessage>, ProviderError> {
        let url = format!(
            "{}{}",
            self.grant_url(identifier, "messages"),
            query.to_query_string()
        );
        let envelope: ListEnvelope<Value> = self.get_json("list messages", &url)?;
        Ok(envelope.into_messages())
    }

    fn list_threads(&self, identifier: &str, query: &ListQuery) -> Result<Vec<RawThread>, ProviderError> {
        let url = format!(
            "{}{}",
            self.grant_url(identifier, "threads"),
            query.to_query_string()
        );
        let envelope: ListEnvelope<Value> = self.get_json("list threads", &url)?;
        Ok(envelope.into_decoded("thread"))
    }

    fn get_account_info(&self) -> Result<Vec<Grant>, ProviderError> {
        let url = format!("{}/v3/grants", self.base_url);
        let envelope: ListEnvelope<Value> = self.get_json("get account info", &url)?;
        Ok(envelope.into_decoded("grant"))
    }

    fn create_draft(&self, identifier: &str, payload: &DraftPayload) -> Result<Draft, ProviderError> {
        let url = self.grant_url(identifier, "drafts");
        let envelope: ObjectEnvelope<Draft> = self.post_json("create draft", &url, payload)?;
        Ok(envelope.into_inner())
    }

    fn send_draft(&self, identifier: &str, draft_id: &str) -> Result<RawMessage, ProviderError> {
        let url = self.grant_url(
            identifier,
            &format!("drafts/{}", urlencoding::encode(draft_id)),
        );
        let envelope: ObjectEnvelope<RawMessage> = self.post_empty("send draft", &url)?;
        Ok(envelope.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> NylasClient {
        let config = ProviderConfig {
            api_uri: "https://api.example.com/".to_string(),
            timeout_secs: 5,
        };
        NylasClient::new(&config, Credential::new("token"))
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        assert_eq!(client().base_url(), "https://api.example.com");
    }

    #[test]
    fn test_grant_url_encodes_identifier() {
        assert_eq!(
            client().grant_url("grant/1", "messages"),
            "https://api.example.com/v3/grants/grant%2F1/messages"
        );
    }

    #[test]
    fn test_authorization_header() {
        assert_eq!(client().authorization(), "Bearer token");
    }
}
