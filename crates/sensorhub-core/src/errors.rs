use std::time::Duration;

/// Typed errors for the text-generation gateway.
/// None of these are retried; the kind only drives the HTTP mapping and logs.
#[derive(Clone, Debug, thiserror::Error)]
pub enum InsightError {
    #[error("insight provider not configured")]
    NotConfigured,
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl InsightError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::RateLimited { .. } => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::NetworkError(_) => "network_error",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            429 => Self::RateLimited { retry_after: None },
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}
