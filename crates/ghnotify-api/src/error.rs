// API errors and the rate-limit classifier the retry layer keys off
use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API rate limit exceeded: {message}")]
    RateLimited { message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// GraphQL answered 200 but with an `errors` array. `kind` is the
    /// `type` GitHub attaches to the first error, when present.
    #[error("GraphQL error: {message}")]
    GraphQl {
        message: String,
        kind: Option<String>,
    },

    #[error("Unexpected response shape: {0}")]
    Schema(String),

    #[error("JSON parsing failed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed after {retries} retries due to rate limiting: {source}")]
    RetriesExhausted {
        retries: u32,
        #[source]
        source: Box<ApiError>,
    },

    #[error("Invalid repository name '{0}', expected owner/name")]
    InvalidRepository(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Coarse failure categories, reported in logs. Only `RateLimit` is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimit,
    Timeout,
    Permission,
    NotFound,
    Network,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Permission => "permission",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Network => "network",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// What a failed repository fetch most likely means, for log lines
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "Rate limit exceeded despite retries - skipping repository",
            ErrorKind::Permission => "Permission denied - repository may be private or deleted",
            ErrorKind::NotFound => "Repository not found - may have been deleted or renamed",
            ErrorKind::Timeout => "Request timeout - network may be slow or unstable",
            ErrorKind::Network => "Network failure - could not reach GitHub",
            ErrorKind::Unknown => "Failed to fetch stars for repository",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "you have exceeded",
    "abuse detection",
    "secondary rate limit",
];

/// Classify an error.
///
/// Structured signals (variant, status code, GraphQL error type) win;
/// anything else falls through to [`classify_message`].
pub fn classify(err: &ApiError) -> ErrorKind {
    match err {
        ApiError::RateLimited { .. } | ApiError::RetriesExhausted { .. } => ErrorKind::RateLimit,
        ApiError::Timeout(_) => ErrorKind::Timeout,
        ApiError::Unauthorized => ErrorKind::Permission,
        ApiError::NotFound(_) => ErrorKind::NotFound,
        ApiError::Http { status, message } => match *status {
            429 => ErrorKind::RateLimit,
            // GitHub reports secondary rate limits as 403
            401 | 403 if is_rate_limit_message(message) => ErrorKind::RateLimit,
            401 | 403 => ErrorKind::Permission,
            404 => ErrorKind::NotFound,
            408 | 504 => ErrorKind::Timeout,
            _ => classify_message(message),
        },
        ApiError::GraphQl { message, kind } => match kind.as_deref() {
            Some("RATE_LIMITED") => ErrorKind::RateLimit,
            Some("NOT_FOUND") => ErrorKind::NotFound,
            Some("FORBIDDEN") => ErrorKind::Permission,
            _ => classify_message(message),
        },
        ApiError::Network(e) if e.is_timeout() => ErrorKind::Timeout,
        ApiError::Network(_) => ErrorKind::Network,
        other => classify_message(&other.to_string()),
    }
}

/// Best-effort substring heuristic over an error message
pub fn classify_message(message: &str) -> ErrorKind {
    let msg = message.to_lowercase();

    if is_rate_limit_message(&msg) {
        return ErrorKind::RateLimit;
    }

    if msg.contains("timeout") || msg.contains("timed out") || msg.contains("deadline exceeded") {
        return ErrorKind::Timeout;
    }

    if msg.contains("forbidden")
        || msg.contains("unauthorized")
        || msg.contains("permission denied")
        || msg.contains("403")
    {
        return ErrorKind::Permission;
    }

    if msg.contains("not found") || msg.contains("404") || msg.contains("could not resolve") {
        return ErrorKind::NotFound;
    }

    if msg.contains("connection refused") || msg.contains("no such host") || msg.contains("network") {
        return ErrorKind::Network;
    }

    ErrorKind::Unknown
}

fn is_rate_limit_message(message: &str) -> bool {
    let msg = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| msg.contains(marker))
}
