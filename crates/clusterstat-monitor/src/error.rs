use clusterstat_core::{NodeError, SchemaError, SourceError};
use thiserror::Error;

/// Terminal result of a monitoring run, or a failure to register a host.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The very first observation of the run was an error, so no baseline
    /// was ever established.
    #[error("error contacting {}: {}", .0.host, .0.message)]
    FirstContact(NodeError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("failed to open session to {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: SourceError,
    },

    #[error("output stream is closed")]
    OutputClosed,
}
