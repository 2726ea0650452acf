//! Error types for the fetch, parse, push and orchestration stages.

use thiserror::Error;

/// Upstream fetch failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
    #[error("failed to make request: {0}")]
    Network(#[source] reqwest::Error),
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("fetch cancelled")]
    Cancelled,
}

/// The payload could not be read as an XML document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("payload is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("failed to parse XML: {0}")]
    Malformed(#[from] roxmltree::Error),
}

/// Push failure.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to marshal push request: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid push URL: {0}")]
    InvalidUrl(String),
    #[error("failed to send request: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Loki returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to write dry-run output: {0}")]
    Output(#[from] std::io::Error),
}

/// Setup-time validation failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API key is required")]
    MissingApiKey,
    #[error("at least one line reference is required")]
    NoLineRefs,
    #[error("polling interval must be greater than zero")]
    ZeroInterval,
    #[error("push credentials cannot be used as an HTTP header")]
    InvalidCredentials,
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch bus data for line {line_ref}: {source}")]
    FetchFailed { line_ref: String, source: FetchError },
    #[error("failed to parse bus data for line {line_ref}: {source}")]
    ParseFailed { line_ref: String, source: ParseError },
    #[error("failed to dispatch bus data for line {line_ref}: {source}")]
    SendFailed { line_ref: String, source: SendError },
    #[error("task for line {line_ref} did not complete: {message}")]
    TaskFailed { line_ref: String, message: String },
    #[error(transparent)]
    ValidationFailed(#[from] ConfigError),
    #[error("all {} lines failed: [{}]", .0.len(), join(.0))]
    AllLinesFailed(Vec<PipelineError>),
}

impl PipelineError {
    /// Stable name used as the `kind` field in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::FetchFailed { .. } => "fetch_failed",
            PipelineError::ParseFailed { .. } => "parse_failed",
            PipelineError::SendFailed { .. } => "send_failed",
            PipelineError::TaskFailed { .. } => "task_failed",
            PipelineError::ValidationFailed(_) => "validation_failed",
            PipelineError::AllLinesFailed(_) => "all_lines_failed",
        }
    }

    pub fn line_ref(&self) -> Option<&str> {
        match self {
            PipelineError::FetchFailed { line_ref, .. }
            | PipelineError::ParseFailed { line_ref, .. }
            | PipelineError::SendFailed { line_ref, .. }
            | PipelineError::TaskFailed { line_ref, .. } => Some(line_ref),
            _ => None,
        }
    }
}

fn join(errors: &[PipelineError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
