//! Error types for language model providers
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Connection, timeout or transport failure
    #[error("Network error: {0}")]
    Network(String),
    /// HTTP 429
    #[error("Rate limited: {0}")]
    RateLimited(String),
    /// Any other non-success HTTP status
    #[error("API error ({status}): {message}")]
    Http { status: u16, message: String },
    /// The provider answered but the payload could not be used
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// Missing API key, unknown provider, bad model name
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
    /// The provider does not implement this operation
    #[error("Operation not supported by {0}")]
    Unsupported(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::RateLimited(_) => true,
            ProviderError::Http { status, .. } => *status == 408 || *status >= 500,
            _ => false,
        }
    }

    /// Classify a non-success HTTP response, pulling `error.message` out of
    /// a JSON body when there is one
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.trim().to_string());
        if status == 429 {
            ProviderError::RateLimited(message)
        } else {
            ProviderError::Http { status, message }
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        // Gemini puts the key in the query string
        let err = err.without_url();
        if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                return ProviderError::RateLimited(err.to_string());
            }
            return ProviderError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        if err.is_decode() {
            return ProviderError::InvalidResponse(err.to_string());
        }
        ProviderError::Network(err.to_string())
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;
