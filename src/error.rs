use thiserror::Error;

/// Failures that end a single assist invocation. Each one is surfaced to the
/// user and none is retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssistError {
    #[error("{0}")]
    Config(String),

    #[error("API request timed out after {seconds} seconds.")]
    Timeout { seconds: u64 },

    #[error("API Call Failed: API Error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse result from API.")]
    MalformedResponse,

    #[error("API Call Failed: {0}")]
    Network(String),

    #[error("Failed to copy to clipboard: {0}")]
    Clipboard(String),

    #[error("Failed to deliver result: {0}")]
    Delivery(String),
}

/// Persistent storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage holds invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage file {0} is not a key/value object")]
    NotAnObject(String),

    #[error("history writer has stopped")]
    Closed,
}
