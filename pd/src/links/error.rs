//! Meeting-link error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while generating a meeting link
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Credential not found. Set the {0} environment variable.")]
    MissingCredential(String),

    #[error("Unknown link provider: '{0}'. Supported: mock, http")]
    UnknownProvider(String),
}

impl LinkError {
    /// Check if the generator call itself is worth repeating
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            LinkError::Network(_) => true,
            LinkError::Timeout(_) => true,
            LinkError::InvalidResponse(_) => false,
            LinkError::MissingCredential(_) => false,
            LinkError::UnknownProvider(_) => false,
        }
    }
}
