//! Error types shared across the workspace.

use thiserror::Error;

/// Failure to obtain a status document from a host session.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("status command failed: {0}")]
    CommandFailed(String),

    #[error("failed to parse status document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("status source io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid host address '{0}'")]
    InvalidHost(String),

    #[error("session is closed")]
    Closed,
}

/// An error paired with the host it was observed on.
///
/// Carried inside error rows and returned as the terminal result of a
/// run, so it owns a rendered message rather than the original error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NodeError {
    pub host: String,
    pub message: String,
}

impl NodeError {
    pub fn new(host: impl Into<String>, err: &dyn std::error::Error) -> Self {
        Self {
            host: host.into(),
            message: err.to_string(),
        }
    }

    pub fn from_message(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            message: message.into(),
        }
    }
}

/// The active column set could not be established.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("lock statistics are not supported by {host} (server version '{version}')")]
    LocksUnsupported { host: String, version: String },
}
