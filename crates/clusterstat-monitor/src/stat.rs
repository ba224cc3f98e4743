//! MonitorStat: owns the node pollers, the cluster monitor and the shared
//! cancellation token.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clusterstat_core::{
    Flags, OutputMode, ReaderConfig, StatConsumer, StatusSource, new_formatter,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cluster::{AsyncClusterMonitor, ClusterMonitor, SyncClusterMonitor};
use crate::error::MonitorError;
use crate::lock;
use crate::node::NodePoller;

/// Time allowed for in-flight hand-offs to observe cancellation before
/// sessions are released.
const STOP_GRACE: Duration = Duration::from_millis(100);

/// Settings for one monitoring run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub hosts: Vec<String>,
    pub interval: Duration,
    /// Maximum number of rendered batches; 0 means unlimited.
    pub row_count: u64,
    /// Maximum run time; `None` means unlimited.
    pub duration: Option<Duration>,
    pub output: OutputMode,
    pub all: bool,
    pub locks: bool,
    /// Explicit column list. Non-empty disables column inference.
    pub columns: Vec<String>,
    pub no_headers: bool,
    pub human_readable: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost:27017".to_string()],
            interval: Duration::from_secs(1),
            row_count: 0,
            duration: None,
            output: OutputMode::Grid,
            all: false,
            locks: false,
            columns: Vec::new(),
            no_headers: false,
            human_readable: true,
        }
    }
}

impl MonitorConfig {
    pub fn is_cluster(&self) -> bool {
        self.hosts.len() > 1
    }

    /// Capability flags requested up front. Inference adds engine and
    /// replica flags from the first sample.
    pub fn flags(&self) -> Flags {
        if !self.columns.is_empty() {
            return Flags::NONE;
        }
        let mut flags = Flags::ALWAYS;
        if self.is_cluster() {
            flags |= Flags::HOSTS;
        }
        if self.all {
            flags |= Flags::ALL;
        }
        if self.locks {
            flags |= Flags::LOCKS;
        }
        flags
    }

    fn consumer(&self) -> Result<StatConsumer, MonitorError> {
        let reader_config = ReaderConfig {
            human_readable: self.human_readable,
            time_format: self.output.time_format().to_string(),
        };
        let formatter = new_formatter(self.output, self.row_count, !self.no_headers);
        Ok(StatConsumer::new(
            self.flags(),
            &self.columns,
            reader_config,
            formatter,
        )?)
    }
}

pub struct MonitorStat {
    config: MonitorConfig,
    source: Arc<dyn StatusSource>,
    cluster: Arc<dyn ClusterMonitor>,
    /// Pollers by normalized dialed address.
    nodes: Mutex<HashMap<String, Arc<NodePoller>>>,
    cancel: CancellationToken,
}

impl MonitorStat {
    pub fn new(config: MonitorConfig, source: Arc<dyn StatusSource>) -> Result<Self, MonitorError> {
        Self::with_cancel(config, source, CancellationToken::new())
    }

    /// Build with an explicit cancellation token shared by every poller
    /// and the cluster monitor.
    pub fn with_cancel(
        config: MonitorConfig,
        source: Arc<dyn StatusSource>,
        cancel: CancellationToken,
    ) -> Result<Self, MonitorError> {
        let consumer = config.consumer()?;
        let cluster: Arc<dyn ClusterMonitor> = if config.is_cluster() {
            Arc::new(AsyncClusterMonitor::new(
                consumer,
                config.hosts.len(),
                config.duration,
                cancel.clone(),
            ))
        } else {
            Arc::new(SyncClusterMonitor::new(
                consumer,
                config.duration,
                cancel.clone(),
            ))
        };
        Ok(Self {
            config,
            source,
            cluster,
            nodes: Mutex::new(HashMap::new()),
            cancel,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Start polling `address` unless it is already polled, either under
    /// that address or under the name an existing poller's server reports
    /// for itself. A `shard/` prefix is ignored.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add_node(&self, address: &str) -> Result<(), MonitorError> {
        let host = normalize_host(address);
        let mut nodes = lock(&self.nodes);
        if nodes.contains_key(host)
            || nodes.values().any(|n| n.alias().as_deref() == Some(host))
        {
            debug!(host = %host, "host already monitored");
            return Ok(());
        }

        let session = self.source.open(host).map_err(|source| MonitorError::Connect {
            host: host.to_string(),
            source,
        })?;
        let node = Arc::new(NodePoller::new(host, session, self.cancel.clone()));
        nodes.insert(host.to_string(), Arc::clone(&node));
        tokio::spawn(node.watch(self.config.interval, Arc::clone(&self.cluster)));
        info!(host = %host, "host added");
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        lock(&self.nodes).len()
    }

    /// Run the cluster monitor to completion.
    pub async fn run(&self) -> Result<(), MonitorError> {
        info!(
            hosts = self.node_count(),
            interval_ms = self.config.interval.as_millis() as u64,
            "monitor starting"
        );
        self.cluster.monitor(self.config.interval).await
    }

    /// Restart row counting and the time budget. Hosts stay connected.
    pub fn reset(&self) {
        self.cluster.reset();
    }

    pub async fn next_message(&self) -> Option<String> {
        self.cluster.next_message().await
    }

    /// Cancel every task, give pending hand-offs a moment to observe it,
    /// then release all sessions.
    pub async fn stop(&self) {
        self.cancel.cancel();
        tokio::time::sleep(STOP_GRACE).await;
        let nodes: Vec<Arc<NodePoller>> = lock(&self.nodes).values().cloned().collect();
        for node in nodes {
            node.close();
        }
        info!("monitor stopped");
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Strip a `shardName/` prefix from a discovered address.
fn normalize_host(address: &str) -> &str {
    address.rsplit('/').next().unwrap_or(address).trim()
}
