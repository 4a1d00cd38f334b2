// Error types for setup and usage failures. Action failures never surface here;
// they are normalized into an ActionOutcome by the invoker.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Page URL has no host: {0}")]
    MissingHost(String),

    #[error("Unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("HTTP client initialization failed: {0}")]
    HttpClient(String),

    #[error("Logging initialization failed: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Controller channel closed")]
    ChannelClosed,
}

impl ActionError {
    pub fn invalid_url(url: &str, err: impl std::fmt::Display) -> Self {
        ActionError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;
