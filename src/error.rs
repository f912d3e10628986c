use thiserror::Error;

/// A form value that failed parsing or range checks. The message is shown to
/// the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum DashError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("network error: {0}")]
    Transport(String),
    #[error("HTTP error! Status: {status}")]
    Http { status: u16 },
    #[error("Failed to load page: {status} {reason}")]
    Fragment { status: u16, reason: String },
    #[error("{0}")]
    Backend(String),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("unknown page: {0}")]
    UnknownPage(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse grouping used when reporting a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Backend,
}

impl DashError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashError::Validation(_) => ErrorKind::Validation,
            DashError::Transport(_)
            | DashError::Http { .. }
            | DashError::Fragment { .. }
            | DashError::Io(_) => {
                ErrorKind::Transport
            }
            DashError::Backend(_) | DashError::Decode(_) | DashError::UnknownPage(_) => {
                ErrorKind::Backend
            }
        }
    }

    /// Whether repeating the same idempotent request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DashError::Transport(_) => true,
            DashError::Http { status } => crate::retry::is_retryable_http_error(*status),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DashError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => DashError::Http { status: status.as_u16() },
            None if err.is_decode() => DashError::Decode(err.to_string()),
            None => DashError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DashError {
    fn from(err: serde_json::Error) -> Self {
        DashError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for DashError {
    fn from(err: url::ParseError) -> Self {
        DashError::Transport(format!("bad url: {}", err))
    }
}
