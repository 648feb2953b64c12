/// Shared error type used across all Warden crates.
///
/// `kind()` maps each variant onto the external error-kind vocabulary used at
/// API boundaries (run submission, tool results, provider calls). Kinds are
/// stable identifiers; variants carry the detail.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("memory store: {0}")]
    Memory(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("config: {0}")]
    Config(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("canceled: {0}")]
    Canceled(String),

    #[error("dropped: {0}")]
    Dropped(String),

    #[error("queue full: {0}")]
    QueueFull(String),

    #[error("{0}")]
    Other(String),
}

/// Stable error-kind vocabulary surfaced to callers across run submission,
/// tool results, and provider calls. A given [`Error`] maps to exactly one
/// kind; the kind is what policy decisions (retry, backoff, surfacing to the
/// caller) are made on, not the variant itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    RateLimited,
    Canceled,
    Dropped,
    QueueFull,
    Timeout,
    Provider,
    StoreTransient,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) | Error::ToolNotFound(_) => ErrorKind::NotFound,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::RateLimited(_) => ErrorKind::RateLimited,
            Error::Canceled(_) => ErrorKind::Canceled,
            Error::Dropped(_) => ErrorKind::Dropped,
            Error::QueueFull(_) => ErrorKind::QueueFull,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Provider { .. } => ErrorKind::Provider,
            Error::Memory(_) | Error::Io(_) => ErrorKind::StoreTransient,
            Error::Json(_) | Error::Http(_) | Error::Config(_) | Error::Other(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_maps_to_provider_kind() {
        let err = Error::Provider {
            provider: "openai-compat".into(),
            message: "503".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Provider);
    }

    #[test]
    fn queue_full_maps_to_queue_full_kind() {
        let err = Error::QueueFull("lane full".into());
        assert_eq!(err.kind(), ErrorKind::QueueFull);
    }
}
