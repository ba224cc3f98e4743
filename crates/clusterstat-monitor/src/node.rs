//! Per-host polling task.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use clusterstat_core::{NodeError, ServerStatus, StatusSession};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cluster::ClusterMonitor;
use crate::lock;

/// Polls one host over its own session on a fixed interval.
pub struct NodePoller {
    /// Address as dialed; the reporting key for every sample.
    host: String,
    /// Name the server reported for itself on the last successful poll.
    alias: Mutex<Option<String>>,
    session: Arc<dyn StatusSession>,
    cancel: CancellationToken,
}

impl NodePoller {
    pub fn new(
        host: impl Into<String>,
        session: Box<dyn StatusSession>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            host: host.into(),
            alias: Mutex::new(None),
            session: Arc::from(session),
            cancel,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn alias(&self) -> Option<String> {
        lock(&self.alias).clone()
    }

    /// Fetch one sample. The session call blocks, so it runs on the
    /// blocking pool.
    pub async fn poll(&self) -> Result<ServerStatus, NodeError> {
        let session = Arc::clone(&self.session);
        let fetched = tokio::task::spawn_blocking(move || session.server_status()).await;
        match fetched {
            Ok(Ok(mut stat)) => {
                let reported = std::mem::replace(&mut stat.host, self.host.clone());
                *lock(&self.alias) = Some(reported);
                stat.sample_time = Local::now();
                Ok(stat)
            }
            Ok(Err(e)) => Err(NodeError::new(&self.host, &e)),
            Err(e) => Err(NodeError::new(&self.host, &e)),
        }
    }

    /// Poll every `interval` and hand each result to `cluster` until
    /// cancelled. The first poll happens one interval after start.
    pub async fn watch(self: Arc<Self>, interval: Duration, cluster: Arc<dyn ClusterMonitor>) {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(host = %self.host, "poller started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = tokio::select! {
                        report = self.poll() => report,
                        _ = self.cancel.cancelled() => break,
                    };
                    if let Err(e) = &report {
                        warn!(host = %self.host, error = %e, "poll failed");
                    }
                    cluster.update(report).await;
                }
            }
        }
        debug!(host = %self.host, "poller stopped");
    }

    /// Release the session. Safe to call more than once.
    pub fn close(&self) {
        self.session.close();
    }
}
