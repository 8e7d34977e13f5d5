//! Classification of HTTP error statuses into user-facing errors.

use reqwest::StatusCode;

/// HTTP failures reported back to the user with a readable message.
#[derive(Debug, PartialEq, Eq)]
pub enum HttpStatusError {
    /// HTTP 401
    AuthenticationFailed(String),
    /// HTTP 403
    Forbidden(String),
    /// HTTP 404
    NotFound(String),
    /// HTTP 429
    RateLimitExceeded(String),
    /// Other 4xx
    ClientError(String),
    /// 5xx
    ServerError(String),
}

impl std::fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpStatusError::AuthenticationFailed(url) => {
                write!(f, "Authentication failed for {}", url)
            }
            HttpStatusError::Forbidden(url) => {
                write!(f, "Access forbidden: {}. You may need authentication.", url)
            }
            HttpStatusError::NotFound(url) => write!(f, "Not found: {}", url),
            HttpStatusError::RateLimitExceeded(url) => {
                write!(f, "Rate limit exceeded for {}. Try again later.", url)
            }
            HttpStatusError::ClientError(msg) => write!(f, "Request error: {}", msg),
            HttpStatusError::ServerError(msg) => write!(f, "Registry server error: {}", msg),
        }
    }
}

impl std::error::Error for HttpStatusError {}

/// Converts an error produced by `error_for_status()` into an `anyhow::Error`.
/// Known statuses become an `HttpStatusError`; transport errors stay as they are.
pub fn classify_status(error: reqwest::Error) -> anyhow::Error {
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "<unknown url>".to_string());

    let classified = match error.status() {
        Some(StatusCode::UNAUTHORIZED) => HttpStatusError::AuthenticationFailed(url),
        Some(StatusCode::FORBIDDEN) => HttpStatusError::Forbidden(url),
        Some(StatusCode::NOT_FOUND) => HttpStatusError::NotFound(url),
        Some(StatusCode::TOO_MANY_REQUESTS) => HttpStatusError::RateLimitExceeded(url),
        Some(s) if s.is_client_error() => {
            HttpStatusError::ClientError(format!("HTTP {} from {}", s.as_u16(), url))
        }
        Some(s) if s.is_server_error() => {
            HttpStatusError::ServerError(format!("HTTP {} from {}", s.as_u16(), url))
        }
        _ => return anyhow::Error::from(error),
    };

    anyhow::Error::from(classified)
}
