use crate::error::SourceError;
use crate::status::ServerStatus;

/// Abstraction over how status documents are fetched (mongosh, a driver,
/// canned fixtures in tests).
///
/// Defined here as a synchronous trait; callers on an async runtime run
/// it on a blocking thread.
pub trait StatusSource: Send + Sync {
    /// Open a dedicated, direct (non-discovering) session to one host.
    fn open(&self, host: &str) -> Result<Box<dyn StatusSession>, SourceError>;
}

/// A session bound to exactly one host.
pub trait StatusSession: Send + Sync {
    /// Fetch a fresh status document. Must not apply a client-side read
    /// timeout: a loaded server may legitimately take longer than the
    /// polling interval to answer.
    fn server_status(&self) -> Result<ServerStatus, SourceError>;

    /// Release the underlying connection. Later calls to `server_status`
    /// fail with [`SourceError::Closed`].
    fn close(&self) {}
}

impl<T: StatusSource + ?Sized> StatusSource for &T {
    fn open(&self, host: &str) -> Result<Box<dyn StatusSession>, SourceError> {
        (**self).open(host)
    }
}

impl<T: StatusSource + ?Sized> StatusSource for std::sync::Arc<T> {
    fn open(&self, host: &str) -> Result<Box<dyn StatusSession>, SourceError> {
        (**self).open(host)
    }
}
