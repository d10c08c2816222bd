use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport failure that survived every retry attempt.
    #[error("Request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Path escapes {}: {}", root.display(), relative)]
    PathEscape { root: PathBuf, relative: String },
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// True for errors caused by bad operator input rather than runtime failures.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Config(_) | Error::InvalidInput(_))
    }
}
