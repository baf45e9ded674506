//! Provider adapter errors

/// Errors returned by a [`MailProvider`](super::MailProvider)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The bearer credential was rejected; fatal for the whole sync
    #[error("credential rejected by provider (HTTP {status})")]
    InvalidCredential { status: u16 },

    #[error("{operation} failed with HTTP {status}")]
    Status { operation: &'static str, status: u16 },

    #[error("{operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("failed to decode {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl ProviderError {
    /// Whether the error means the account credential is unusable
    pub fn is_credential(&self) -> bool {
        matches!(self, ProviderError::InvalidCredential { .. })
    }

    /// Classify an HTTP status code
    pub fn from_status(operation: &'static str, status: u16) -> Self {
        match status {
            401 | 403 => ProviderError::InvalidCredential { status },
            _ => ProviderError::Status { operation, status },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_statuses_are_credential_errors() {
        assert!(ProviderError::from_status("list messages", 401).is_credential());
        assert!(ProviderError::from_status("list messages", 403).is_credential());
        assert!(!ProviderError::from_status("list messages", 500).is_credential());
        assert!(!ProviderError::from_status("list messages", 429).is_credential());
    }
}
