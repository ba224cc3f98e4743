use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clusterstat_core::{NodeError, ServerStatus, StatConsumer, StatLine};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ClusterMonitor, MonitorState};
use crate::error::MonitorError;
use crate::lock;

struct Receivers {
    stats: mpsc::Receiver<ServerStatus>,
    errors: mpsc::Receiver<NodeError>,
}

/// Latest row per host, keyed by dialed address.
type LastLines = Arc<Mutex<BTreeMap<String, StatLine>>>;

/// Best-effort multi-host monitor.
///
/// Results from every host update a shared "latest row" map as they arrive;
/// a separate ticker renders whatever the map holds. A host that stops
/// answering keeps its last row (or an error row) without delaying others.
pub struct AsyncClusterMonitor {
    state: Arc<MonitorState>,
    stats_tx: mpsc::Sender<ServerStatus>,
    errors_tx: mpsc::Sender<NodeError>,
    receivers: Arc<tokio::sync::Mutex<Receivers>>,
    last_lines: LastLines,
}

impl AsyncClusterMonitor {
    /// `capacity` is the per-channel buffer, normally the number of hosts.
    pub fn new(
        consumer: StatConsumer,
        capacity: usize,
        duration: Option<Duration>,
        cancel: CancellationToken,
    ) -> Self {
        let capacity = capacity.max(1);
        let (stats_tx, stats) = mpsc::channel(capacity);
        let (errors_tx, errors) = mpsc::channel(capacity);
        Self {
            state: Arc::new(MonitorState::new(consumer, duration, cancel)),
            stats_tx,
            errors_tx,
            receivers: Arc::new(tokio::sync::Mutex::new(Receivers { stats, errors })),
            last_lines: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Render every known row as one batch. Returns whether the formatter
    /// is finished; an empty map renders nothing.
    async fn print_snapshot(&self) -> Result<bool, MonitorError> {
        let lines: Vec<StatLine> = lock(&self.last_lines).values().cloned().collect();
        if lines.is_empty() {
            debug!("no rows yet, skipping snapshot");
            return Ok(false);
        }
        self.state.emit(&lines).await
    }

    /// Wait for the first result from any host. An error here ends the run.
    async fn await_first_result(&self) -> Result<bool, MonitorError> {
        let mut receivers = self.receivers.lock().await;
        let Receivers { stats, errors } = &mut *receivers;
        let cancel = self.state.cancel();
        tokio::select! {
            _ = cancel.cancelled() => Ok(false),
            Some(stat) = stats.recv() => {
                record_stat(&self.state, &self.last_lines, stat)?;
                Ok(true)
            }
            Some(first) = errors.recv() => {
                let mut pending = vec![first.clone()];
                while let Ok(err) = errors.try_recv() {
                    pending.push(err);
                }
                {
                    let mut last = lock(&self.last_lines);
                    for err in pending {
                        warn!(host = %err.host, error = %err, "first poll failed");
                        last.insert(err.host.clone(), StatLine::from_error(err));
                    }
                }
                if let Err(e) = self.print_snapshot().await {
                    debug!(error = %e, "error batch dropped");
                }
                Err(MonitorError::FirstContact(first))
            }
        }
    }

    async fn run_ticker(
        &self,
        interval: Duration,
        receiver: &mut tokio::task::JoinHandle<Result<(), MonitorError>>,
    ) -> Result<(), MonitorError> {
        let cancel = self.state.cancel();
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("monitor cancelled");
                    return Ok(());
                }
                joined = &mut *receiver => {
                    return match joined {
                        Ok(result) => result,
                        Err(e) => {
                            error!(error = %e, "result receiver stopped");
                            Ok(())
                        }
                    };
                }
                _ = ticker.tick() => {
                    if self.state.timed_out() || self.print_snapshot().await? {
                        info!("monitor reached its limit");
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn record_stat(
    state: &MonitorState,
    last_lines: &LastLines,
    stat: ServerStatus,
) -> Result<(), MonitorError> {
    if let Some(line) = state.consume(stat)? {
        lock(last_lines).insert(line.host.clone(), line);
    }
    Ok(())
}

/// Fold every incoming result into the latest-row map until cancelled.
async fn receive_results(
    state: Arc<MonitorState>,
    receivers: Arc<tokio::sync::Mutex<Receivers>>,
    last_lines: LastLines,
) -> Result<(), MonitorError> {
    let mut receivers = receivers.lock().await;
    let Receivers { stats, errors } = &mut *receivers;
    let cancel = state.cancel().clone();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            Some(stat) = stats.recv() => record_stat(&state, &last_lines, stat)?,
            Some(err) = errors.recv() => {
                warn!(host = %err.host, error = %err, "poll failed");
                lock(&last_lines).insert(err.host.clone(), StatLine::from_error(err));
            }
        }
    }
}

#[async_trait]
impl ClusterMonitor for AsyncClusterMonitor {
    async fn update(&self, report: Result<ServerStatus, NodeError>) {
        let cancel = self.state.cancel();
        let delivered = match report {
            Ok(stat) => tokio::select! {
                sent = self.stats_tx.send(stat) => sent.is_ok(),
                _ = cancel.cancelled() => true,
            },
            Err(err) => tokio::select! {
                sent = self.errors_tx.send(err) => sent.is_ok(),
                _ = cancel.cancelled() => true,
            },
        };
        if !delivered {
            debug!("monitor no longer receiving");
        }
    }

    async fn monitor(&self, interval: Duration) -> Result<(), MonitorError> {
        self.state.restart_clock();
        info!("multi-host monitor started");

        match self.await_first_result().await {
            Ok(true) => {}
            Ok(false) => {
                self.state.close();
                return Ok(());
            }
            Err(e) => {
                error!(error = %e, "monitor stopped");
                self.state.close();
                return Err(e);
            }
        }

        let mut receiver = tokio::spawn(receive_results(
            Arc::clone(&self.state),
            Arc::clone(&self.receivers),
            Arc::clone(&self.last_lines),
        ));
        let result = self.run_ticker(interval, &mut receiver).await;
        receiver.abort();
        if let Err(e) = &result {
            error!(error = %e, "monitor stopped");
        }
        self.state.close();
        result
    }

    async fn next_message(&self) -> Option<String> {
        self.state.next_message().await
    }

    fn reset(&self) {
        self.state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::testing::{consumer, sample};
    use clusterstat_core::Flags;

    const WAIT: Duration = Duration::from_secs(2);
    const TICK: Duration = Duration::from_millis(20);

    fn monitor(hosts: usize, max_rows: u64) -> Arc<AsyncClusterMonitor> {
        Arc::new(AsyncClusterMonitor::new(
            consumer(max_rows, Flags::ALWAYS | Flags::HOSTS),
            hosts,
            None,
            CancellationToken::new(),
        ))
    }

    fn spawn_monitor(
        cluster: &Arc<AsyncClusterMonitor>,
    ) -> tokio::task::JoinHandle<Result<(), MonitorError>> {
        let cluster = Arc::clone(cluster);
        tokio::spawn(async move { cluster.monitor(TICK).await })
    }

    async fn next(cluster: &AsyncClusterMonitor) -> Option<String> {
        tokio::time::timeout(WAIT, cluster.next_message())
            .await
            .expect("message or close within the wait")
    }

    #[tokio::test]
    async fn silent_host_does_not_block_snapshot() {
        let cluster = monitor(3, 0);
        let runner = spawn_monitor(&cluster);
        for tick in 0..2 {
            cluster.update(Ok(sample("a:27017", tick))).await;
            cluster.update(Ok(sample("b:27017", tick))).await;
        }
        // c:27017 never reports.

        let mut snapshot = String::new();
        while !(snapshot.contains("a:27017") && snapshot.contains("b:27017")) {
            snapshot = next(&cluster).await.expect("stream open");
        }
        assert!(!snapshot.contains("c:27017"));

        cluster.state.cancel().cancel();
        let result = tokio::time::timeout(WAIT, runner).await.unwrap().unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn later_host_error_is_not_fatal() {
        let cluster = monitor(3, 0);
        let runner = spawn_monitor(&cluster);
        cluster.update(Ok(sample("h1:27017", 0))).await;
        cluster.update(Ok(sample("h3:27017", 0))).await;
        // Let the monitor take a success as its first result.
        tokio::time::sleep(TICK / 4).await;
        cluster
            .update(Err(NodeError::from_message("h2:27017", "connection refused")))
            .await;
        cluster.update(Ok(sample("h1:27017", 1))).await;
        cluster.update(Ok(sample("h3:27017", 1))).await;

        let mut snapshot = String::new();
        while !(snapshot.contains("h1:27017")
            && snapshot.contains("h2:27017")
            && snapshot.contains("h3:27017"))
        {
            snapshot = next(&cluster).await.expect("stream open");
        }
        let h2_row = snapshot
            .lines()
            .find(|l| l.contains("h2:27017"))
            .unwrap();
        assert!(h2_row.contains("connection refused"));
        let h1_row = snapshot
            .lines()
            .find(|l| l.contains("h1:27017"))
            .unwrap();
        assert!(!h1_row.contains("refused"));
        assert!(!runner.is_finished());

        cluster.state.cancel().cancel();
        assert!(tokio::time::timeout(WAIT, runner).await.unwrap().unwrap().is_ok());
    }

    #[tokio::test]
    async fn first_result_error_drains_pending_and_fails() {
        let cluster = monitor(3, 0);
        cluster
            .update(Err(NodeError::from_message("h1:27017", "connection refused")))
            .await;
        cluster
            .update(Err(NodeError::from_message("h2:27017", "no route to host")))
            .await;
        let result = tokio::time::timeout(WAIT, cluster.monitor(TICK)).await.unwrap();
        match result {
            Err(MonitorError::FirstContact(err)) => assert_eq!(err.host, "h1:27017"),
            other => panic!("expected first-contact error, got {other:?}"),
        }

        let batch = next(&cluster).await.expect("error batch");
        assert!(batch.contains("connection refused"));
        assert!(batch.contains("no route to host"));
        assert_eq!(next(&cluster).await, None);
    }

    #[tokio::test]
    async fn row_limit_ends_run() {
        let cluster = monitor(2, 2);
        let runner = spawn_monitor(&cluster);
        let feeder = {
            let cluster = Arc::clone(&cluster);
            tokio::spawn(async move {
                for tick in 0.. {
                    cluster.update(Ok(sample("a:27017", tick))).await;
                    cluster.update(Ok(sample("b:27017", tick))).await;
                    tokio::time::sleep(TICK / 2).await;
                }
            })
        };

        let mut batches = 0;
        while next(&cluster).await.is_some() {
            batches += 1;
        }
        assert_eq!(batches, 2);
        assert!(tokio::time::timeout(WAIT, runner).await.unwrap().unwrap().is_ok());
        feeder.abort();
    }

    #[tokio::test]
    async fn cancel_before_first_result_closes_cleanly() {
        let cluster = monitor(2, 0);
        let runner = spawn_monitor(&cluster);
        tokio::time::sleep(TICK).await;
        cluster.state.cancel().cancel();
        assert!(tokio::time::timeout(WAIT, runner).await.unwrap().unwrap().is_ok());
        assert_eq!(next(&cluster).await, None);
    }

    #[tokio::test]
    async fn snapshot_is_sorted_by_host() {
        let cluster = monitor(2, 0);
        let runner = spawn_monitor(&cluster);
        for tick in 0..2 {
            cluster.update(Ok(sample("z:27017", tick))).await;
            cluster.update(Ok(sample("m:27017", tick))).await;
        }
        let mut snapshot = String::new();
        while !(snapshot.contains("z:27017") && snapshot.contains("m:27017")) {
            snapshot = next(&cluster).await.expect("stream open");
        }
        let m = snapshot.find("m:27017").unwrap();
        let z = snapshot.find("z:27017").unwrap();
        assert!(m < z);
        cluster.state.cancel().cancel();
        assert!(tokio::time::timeout(WAIT, runner).await.unwrap().unwrap().is_ok());
    }

    #[tokio::test]
    async fn time_budget_ends_run() {
        let cluster = Arc::new(AsyncClusterMonitor::new(
            consumer(0, Flags::ALWAYS | Flags::HOSTS),
            2,
            Some(TICK * 3),
            CancellationToken::new(),
        ));
        let runner = spawn_monitor(&cluster);
        let feeder = {
            let cluster = Arc::clone(&cluster);
            tokio::spawn(async move {
                for tick in 0.. {
                    cluster.update(Ok(sample("a:27017", tick))).await;
                    cluster.update(Ok(sample("b:27017", tick))).await;
                    tokio::time::sleep(TICK / 2).await;
                }
            })
        };

        let mut batches = 0;
        while next(&cluster).await.is_some() {
            batches += 1;
        }
        // No row limit: only the time budget can have closed the stream.
        assert!(batches >= 1);
        let result = tokio::time::timeout(WAIT, runner).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert!(!cluster.state.cancel().is_cancelled());
        feeder.abort();
    }
}
