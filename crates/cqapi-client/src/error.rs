//! Error types for the HTTP client.

use cqapi_query::QueryError;
use cqapi_translate::TranslateError;
use thiserror::Error;

/// Errors loading a [`ClientConfig`](crate::ClientConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid YAML for this shape.
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A mandatory setting is absent from file and environment.
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    /// A setting has a value that cannot be used.
    #[error("Invalid value for {key}: {value}")]
    InvalidSetting {
        /// Setting name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Errors talking to the query service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error status.
    #[error("{status} for url {url}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested url.
        url: String,
        /// Response body.
        body: String,
    },

    /// A response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A response lacked an expected field.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The query ended in state `FAILED`.
    #[error("Query {0} failed")]
    QueryFailed(String),

    /// The query is in state `NEW` and was never run.
    #[error("Query {0} is still in state NEW")]
    QueryStillNew(String),

    /// The query was still running when the poll budget ran out.
    #[error("Query {query_id} still running after {polls} polls")]
    PollLimitReached {
        /// Polled query.
        query_id: String,
        /// Number of polls made.
        polls: usize,
    },

    /// Error from the query model.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Invalid client configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for TranslateError {
    fn from(err: ClientError) -> Self {
        TranslateError::Connection(Box::new(err))
    }
}
