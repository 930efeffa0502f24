use std::time::Duration;

use thiserror::Error;

/// Failure raised by a [`Transport`](crate::traits::Transport) while performing one request.
///
/// HTTP status codes are never transport errors: a 404 or 503 is a
/// successful fetch that reaches the handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within its timeout.
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Connection could not be established (refused, DNS, reset).
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Malformed response or failure while reading the body.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The transport refused to issue the request at all.
    ///
    /// Retried like any other failure; the variant only labels the cause.
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Application-wide error types for trawler.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Every transport attempt for a task failed.
    #[error("Fetching {key} failed after {attempts} attempt(s): {source}")]
    Transport {
        key: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// A request or response middleware rejected the task.
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// The task handler failed while processing a response.
    #[error("Handler error: {0}")]
    Handler(String),

    /// A pipeline stage rejected an item.
    #[error("Pipeline stage '{stage}' failed: {message}")]
    Pipeline { stage: String, message: String },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// The crawl run was cancelled before the task finished.
    #[error("Crawl cancelled")]
    Cancelled,
}

impl CrawlError {
    /// Shorthand for handler code: `CrawlError::handler("missing title")`.
    pub fn handler(message: impl Into<String>) -> Self {
        CrawlError::Handler(message.into())
    }

    /// Shorthand for stage code reporting a rejected item.
    pub fn pipeline(stage: impl Into<String>, message: impl Into<String>) -> Self {
        CrawlError::Pipeline {
            stage: stage.into(),
            message: message.into(),
        }
    }
}
