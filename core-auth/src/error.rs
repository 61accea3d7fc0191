use crate::types::ProviderKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Stored credential for {provider} is corrupted: {reason}")]
    TokenCorrupted {
        provider: ProviderKind,
        reason: String,
    },

    #[error("Failed to serialize credential: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    #[error("{0} is not authenticated")]
    NotAuthenticated(ProviderKind),
}

pub type Result<T> = std::result::Result<T, AuthError>;
