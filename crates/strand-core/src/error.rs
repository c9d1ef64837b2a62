use thiserror::Error;

/// Top-level error type for Strand.
#[derive(Error, Debug)]
pub enum StrandError {
    #[error("Unauthorized: not allowed to {verb} {resource}")]
    Unauthorized { verb: String, resource: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Schema and storage are inconsistent: {0}")]
    Inconsistent(String),

    #[error("Operation canceled: {0}")]
    Canceled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable classification of a [`StrandError`], for callers that map errors to
/// status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    ValidationFailed,
    BackendUnavailable,
    Backend,
    Inconsistent,
    Canceled,
    Config,
    Internal,
}

impl StrandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::Backend(_) => ErrorKind::Backend,
            Self::Inconsistent(_) => ErrorKind::Inconsistent,
            Self::Canceled(_) => ErrorKind::Canceled,
            Self::Config(_) => ErrorKind::Config,
            Self::Serialization(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    pub fn unauthorized(verb: &str, resource: &str) -> Self {
        Self::Unauthorized {
            verb: verb.to_string(),
            resource: resource.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StrandError>;
