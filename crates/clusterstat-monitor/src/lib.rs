//! clusterstat-monitor: the concurrent half of clusterstat.
//!
//! One polling task per host feeds a cluster monitor, which decides when
//! rows are rendered and pushed to the output stream. `MonitorStat` owns
//! the pollers, the chosen cluster monitor and the shared cancellation
//! token.

pub mod cluster;
pub mod error;
pub mod node;
pub mod output;
pub mod stat;

pub use cluster::{AsyncClusterMonitor, ClusterMonitor, SyncClusterMonitor};
pub use error::MonitorError;
pub use node::NodePoller;
pub use output::{OUTPUT_BUFFER, OutputStream};
pub use stat::{MonitorConfig, MonitorStat};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a previous holder panicked.
/// None of the guarded state can be left half-updated by a panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
