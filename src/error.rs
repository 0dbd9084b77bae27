use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, MatcherError>;

/// Run-level failures. Anything in here aborts a pipeline run or a request.
#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Invalid input format: {0}")]
    InvalidFormat(String),

    #[error("Provider login failed: {0}")]
    ProviderLoginFailed(String),

    #[error("Failed to write output: {0}")]
    WriteFailed(String),

    #[error("Processing already in progress")]
    ConcurrentStartRejected,

    #[error("Cannot replace input while processing is in progress")]
    InputBusy,

    #[error("LinkedIn credentials missing: set LINKEDIN_EMAIL and LINKEDIN_PASSWORD")]
    MissingCredentials,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Per-identity lookup failures. The pipeline records these on the row and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("blocked with HTTP {0}")]
    Blocked(u16),

    #[error("unexpected page content: {0}")]
    Parse(String),

    #[error("no authenticated session")]
    NotLoggedIn,

    #[error("{0}")]
    Other(String),
}
