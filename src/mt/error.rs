/// Error types for the Machine Translation module
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MtError {
    /// Missing or rejected credentials, bad provider settings
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Transport-level failure (connection refused, timeout, TLS)
    #[error("Network error: {0}")]
    NetworkError(String),
    /// HTTP 429 from the provider
    #[error("Rate limited: {0}")]
    RateLimited(String),
    /// Non-success HTTP status other than 429
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },
    /// The provider answered but the answer was not a usable translation
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// Locale code rejected before any request was made
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
    /// Error during translation phase
    #[error("Translation error: {0}")]
    TranslationError(String),
}

impl MtError {
    /// Build the error matching an HTTP status code.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => MtError::RateLimited(message),
            401 | 403 => MtError::ConfigError(format!("credentials rejected ({}): {}", status, message)),
            _ => MtError::ServerError { status, message },
        }
    }

    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Rate limiting, gateway/server errors (500, 502, 503, 504) and transport
    /// failures are transient; everything else is final.
    pub fn is_transient(&self) -> bool {
        match self {
            MtError::RateLimited(_) | MtError::NetworkError(_) => true,
            MtError::ServerError { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return MtError::from_status(status.as_u16(), err.to_string());
        }
        MtError::NetworkError(err.to_string())
    }
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;
