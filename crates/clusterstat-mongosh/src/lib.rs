//! clusterstat-mongosh: IO boundary to live servers.
//! Runs `mongosh` once per poll and parses the serverStatus document.

pub mod executor;
pub mod session;

pub use executor::{MongoshExecutor, MongoshRunner};
pub use session::{ConnectionOptions, MongoshSession, MongoshSource, SERVER_STATUS_SCRIPT};
