use std::time::Duration;

use async_trait::async_trait;
use clusterstat_core::{NodeError, ServerStatus, StatConsumer, StatLine};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ClusterMonitor, MonitorState};
use crate::error::MonitorError;

type Report = Result<ServerStatus, NodeError>;

/// Strict single-host monitor: one rendered row per poll, in poll order.
///
/// Successes and errors share one single-slot channel, so results are
/// handled exactly in the order the poller produced them and the poller
/// cannot run more than one result ahead of the monitor.
pub struct SyncClusterMonitor {
    state: MonitorState,
    reports_tx: mpsc::Sender<Report>,
    reports: tokio::sync::Mutex<mpsc::Receiver<Report>>,
}

impl SyncClusterMonitor {
    pub fn new(
        consumer: StatConsumer,
        duration: Option<Duration>,
        cancel: CancellationToken,
    ) -> Self {
        let (reports_tx, reports) = mpsc::channel(1);
        Self {
            state: MonitorState::new(consumer, duration, cancel),
            reports_tx,
            reports: tokio::sync::Mutex::new(reports),
        }
    }

    fn fail(&self, err: MonitorError) -> Result<(), MonitorError> {
        error!(error = %err, "monitor stopped");
        self.state.close();
        Err(err)
    }
}

#[async_trait]
impl ClusterMonitor for SyncClusterMonitor {
    async fn update(&self, report: Report) {
        let cancel = self.state.cancel();
        let delivered = tokio::select! {
            sent = self.reports_tx.send(report) => sent.is_ok(),
            _ = cancel.cancelled() => true,
        };
        if !delivered {
            debug!("monitor no longer receiving");
        }
    }

    async fn monitor(&self, _interval: Duration) -> Result<(), MonitorError> {
        let mut reports = self.reports.lock().await;
        let cancel = self.state.cancel().clone();
        let mut received = false;
        self.state.restart_clock();
        info!("single-host monitor started");

        loop {
            let report = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("monitor cancelled");
                    self.state.close();
                    return Ok(());
                }
                Some(report) = reports.recv() => report,
            };

            let line = match report {
                Ok(stat) => {
                    received = true;
                    match self.state.consume(stat) {
                        Ok(Some(line)) => line,
                        Ok(None) => continue,
                        Err(e) => return self.fail(e.into()),
                    }
                }
                Err(err) if !received => {
                    let line = StatLine::from_error(err.clone());
                    if let Err(e) = self.state.emit(&[line]).await {
                        debug!(error = %e, "error row dropped");
                    }
                    return self.fail(MonitorError::FirstContact(err));
                }
                Err(err) => {
                    warn!(host = %err.host, error = %err, "poll failed");
                    StatLine::from_error(err)
                }
            };

            let finished = match self.state.emit(&[line]).await {
                Ok(finished) => finished,
                Err(e) => return self.fail(e),
            };
            if finished || self.state.timed_out() {
                info!(finished, "monitor reached its limit");
                self.state.close();
                return Ok(());
            }
        }
    }

    async fn next_message(&self) -> Option<String> {
        self.state.next_message().await
    }

    fn reset(&self) {
        self.state.reset();
    }
}
