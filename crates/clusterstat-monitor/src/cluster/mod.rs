//! Cluster monitors: collect results from every node poller and decide
//! when and what to write to the output stream.
//!
//! Two strategies share one contract. `SyncClusterMonitor` renders one row
//! per poll of a single host, in order. `AsyncClusterMonitor` keeps the
//! latest row per host and renders a snapshot of all of them on its own
//! ticker, so a stalled host never holds up the others.

mod async_monitor;
mod sync_monitor;

pub use async_monitor::AsyncClusterMonitor;
pub use sync_monitor::SyncClusterMonitor;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use clusterstat_core::{NodeError, SchemaError, ServerStatus, StatConsumer, StatLine};
use tokio_util::sync::CancellationToken;

use crate::error::MonitorError;
use crate::lock;
use crate::output::OutputStream;

#[async_trait]
pub trait ClusterMonitor: Send + Sync {
    /// Hand one poll result to the monitor. Waits for the monitor to accept
    /// it unless cancellation fires first.
    async fn update(&self, report: Result<ServerStatus, NodeError>);

    /// Run until a row or time limit is reached, cancellation, or a fatal
    /// error. The only place output is produced. Always closes the output
    /// stream before returning.
    async fn monitor(&self, interval: Duration) -> Result<(), MonitorError>;

    /// Next rendered batch, or `None` once the stream is closed and drained.
    async fn next_message(&self) -> Option<String>;

    /// Restart row counting and the elapsed-time budget.
    fn reset(&self);
}

/// State both strategies share: the consumer, the output stream and the
/// run budget.
pub(crate) struct MonitorState {
    consumer: Mutex<StatConsumer>,
    output: OutputStream,
    cancel: CancellationToken,
    started: Mutex<Instant>,
    duration: Option<Duration>,
}

impl MonitorState {
    pub(crate) fn new(
        consumer: StatConsumer,
        duration: Option<Duration>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            consumer: Mutex::new(consumer),
            output: OutputStream::new(),
            cancel,
            started: Mutex::new(Instant::now()),
            duration,
        }
    }

    pub(crate) fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn consume(&self, stat: ServerStatus) -> Result<Option<StatLine>, SchemaError> {
        lock(&self.consumer).update(stat)
    }

    /// Render `lines` as one batch and queue it. Returns whether the
    /// formatter will accept no more rows.
    pub(crate) async fn emit(&self, lines: &[StatLine]) -> Result<bool, MonitorError> {
        let (text, finished) = lock(&self.consumer).format_lines(lines);
        self.output.send(text, &self.cancel).await?;
        Ok(finished)
    }

    pub(crate) fn restart_clock(&self) {
        *lock(&self.started) = Instant::now();
    }

    pub(crate) fn timed_out(&self) -> bool {
        self.duration
            .is_some_and(|limit| lock(&self.started).elapsed() > limit)
    }

    pub(crate) fn reset(&self) {
        self.restart_clock();
        lock(&self.consumer).reset();
    }

    pub(crate) fn close(&self) {
        if self.output.close() {
            tracing::debug!("output stream closed");
        }
    }

    pub(crate) async fn next_message(&self) -> Option<String> {
        self.output.next_message().await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for the monitor tests.

    use chrono::{Duration as ChronoDuration, Local};
    use clusterstat_core::{Flags, GridFormatter, ReaderConfig, ServerStatus, StatConsumer};

    pub fn consumer(max_rows: u64, flags: Flags) -> StatConsumer {
        StatConsumer::new(
            flags,
            &[],
            ReaderConfig::default(),
            Box::new(GridFormatter::new(max_rows, true)),
        )
        .unwrap()
    }

    pub fn sample(host: &str, tick: i64) -> ServerStatus {
        let json = format!(
            r#"{{"host": "{host}", "connections": {{"current": {tick}}}, "opcounters": {{"insert": {}}}}}"#,
            tick * 10
        );
        let mut stat = ServerStatus::from_json(&json).unwrap();
        stat.sample_time = Local::now() + ChronoDuration::seconds(tick);
        stat
    }
}
