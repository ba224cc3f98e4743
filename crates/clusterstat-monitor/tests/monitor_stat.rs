//! End-to-end runs of MonitorStat against in-memory status sources.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clusterstat_core::{SchemaError, ServerStatus, SourceError, StatusSession, StatusSource};
use clusterstat_monitor::{MonitorConfig, MonitorError, MonitorStat};

const WAIT: Duration = Duration::from_secs(5);
const INTERVAL: Duration = Duration::from_millis(20);

#[derive(Clone, Copy)]
enum Behavior {
    /// Answer with an advancing document reporting this name for itself.
    Healthy(&'static str),
    /// Fail every poll with this message.
    Failing(&'static str),
    /// Block until the session is closed.
    Silent,
}

struct FakeSession {
    behavior: Behavior,
    tick: AtomicI64,
    closed: Arc<AtomicBool>,
}

impl StatusSession for FakeSession {
    fn server_status(&self) -> Result<ServerStatus, SourceError> {
        match self.behavior {
            Behavior::Healthy(reported) => {
                let tick = self.tick.fetch_add(1, Ordering::SeqCst);
                let json = format!(
                    r#"{{"host": "{reported}", "connections": {{"current": {tick}}},
                        "opcounters": {{"insert": {}}}, "storageEngine": {{"name": "wiredTiger"}}}}"#,
                    tick * 5
                );
                Ok(ServerStatus::from_json(&json)?)
            }
            Behavior::Failing(msg) => Err(SourceError::CommandFailed(msg.to_string())),
            Behavior::Silent => {
                while !self.closed.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(SourceError::Closed)
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeSource {
    behaviors: HashMap<&'static str, Behavior>,
    opened: AtomicUsize,
    closed: Mutex<Vec<Arc<AtomicBool>>>,
}

impl FakeSource {
    fn with(hosts: &[(&'static str, Behavior)]) -> Arc<Self> {
        Arc::new(Self {
            behaviors: hosts.iter().copied().collect(),
            ..Self::default()
        })
    }

    fn all_closed(&self) -> bool {
        self.closed.lock().unwrap().iter().all(|c| c.load(Ordering::SeqCst))
    }
}

impl StatusSource for FakeSource {
    fn open(&self, host: &str) -> Result<Box<dyn StatusSession>, SourceError> {
        let behavior = *self
            .behaviors
            .get(host)
            .ok_or_else(|| SourceError::InvalidHost(host.to_string()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        let closed = Arc::new(AtomicBool::new(false));
        self.closed.lock().unwrap().push(Arc::clone(&closed));
        Ok(Box::new(FakeSession {
            behavior,
            tick: AtomicI64::new(0),
            closed,
        }))
    }
}

fn config(hosts: &[&str], row_count: u64) -> MonitorConfig {
    MonitorConfig {
        hosts: hosts.iter().map(|h| h.to_string()).collect(),
        interval: INTERVAL,
        row_count,
        ..MonitorConfig::default()
    }
}

/// Start every configured host, run to completion and collect the output.
async fn run_to_end(stat: Arc<MonitorStat>) -> (Vec<String>, Result<(), MonitorError>) {
    for host in stat.config().hosts.clone() {
        stat.add_node(&host).unwrap();
    }
    let runner = {
        let stat = Arc::clone(&stat);
        tokio::spawn(async move { stat.run().await })
    };
    let mut messages = Vec::new();
    while let Some(msg) = tokio::time::timeout(WAIT, stat.next_message())
        .await
        .expect("stream should close")
    {
        messages.push(msg);
    }
    let result = tokio::time::timeout(WAIT, runner).await.unwrap().unwrap();
    stat.stop().await;
    (messages, result)
}

#[tokio::test]
async fn single_host_row_limit() {
    let source = FakeSource::with(&[("h1:27017", Behavior::Healthy("h1:27017"))]);
    let stat = Arc::new(MonitorStat::new(config(&["h1:27017"], 3), source.clone()).unwrap());
    let (messages, result) = run_to_end(stat).await;

    assert!(result.is_ok());
    assert_eq!(messages.len(), 3);
    assert!(messages[0].lines().next().unwrap().contains("insert"));
    assert!(source.all_closed());
}

#[tokio::test]
async fn single_host_refused_first_poll() {
    let source = FakeSource::with(&[("h1:27017", Behavior::Failing("connection refused"))]);
    let stat = Arc::new(MonitorStat::new(config(&["h1:27017"], 0), source).unwrap());
    let (messages, result) = run_to_end(stat).await;

    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("h1:27017"));
    assert!(messages[0].contains("connection refused"));
    match result {
        Err(MonitorError::FirstContact(err)) => {
            assert_eq!(err.host, "h1:27017");
            assert!(err.message.contains("connection refused"));
        }
        other => panic!("expected first-contact error, got {other:?}"),
    }
}

#[tokio::test]
async fn silent_host_does_not_stall_cluster() {
    let source = FakeSource::with(&[
        ("a:27017", Behavior::Healthy("a:27017")),
        ("b:27017", Behavior::Healthy("b:27017")),
        ("c:27017", Behavior::Silent),
    ]);
    let stat = Arc::new(
        MonitorStat::new(config(&["a:27017", "b:27017", "c:27017"], 4), source.clone()).unwrap(),
    );
    let (messages, result) = run_to_end(stat).await;

    assert!(result.is_ok());
    assert_eq!(messages.len(), 4);
    let last = messages.last().unwrap();
    assert!(last.contains("a:27017"));
    assert!(last.contains("b:27017"));
    assert!(!last.contains("c:27017"));
    assert!(source.all_closed());
}

#[tokio::test]
async fn locks_without_lock_stats_fails_run() {
    for hosts in [&["h1:27017"][..], &["h1:27017", "h2:27017"][..]] {
        let source = FakeSource::with(&[
            ("h1:27017", Behavior::Healthy("h1:27017")),
            ("h2:27017", Behavior::Healthy("h2:27017")),
        ]);
        let config = MonitorConfig {
            locks: true,
            ..config(hosts, 0)
        };
        let stat = Arc::new(MonitorStat::new(config, source).unwrap());
        let (messages, result) = run_to_end(stat).await;

        assert!(messages.is_empty(), "{} hosts: {messages:?}", hosts.len());
        match result {
            Err(MonitorError::Schema(SchemaError::LocksUnsupported { host, .. })) => {
                assert!(hosts.contains(&host.as_str()));
            }
            other => panic!("{} hosts: expected locks schema error, got {other:?}", hosts.len()),
        }
    }
}

#[tokio::test]
async fn duplicate_and_aliased_hosts_poll_once() {
    let source = FakeSource::with(&[
        ("10.0.0.1:27017", Behavior::Healthy("h1:27017")),
        ("h1:27017", Behavior::Healthy("h1:27017")),
    ]);
    let stat = MonitorStat::new(config(&["10.0.0.1:27017", "h2:27017"], 0), source.clone())
        .unwrap();

    stat.add_node("10.0.0.1:27017").unwrap();
    stat.add_node("rs0/10.0.0.1:27017").unwrap();
    assert_eq!(stat.node_count(), 1);

    // Wait for a poll so the server's self-reported name is known.
    tokio::time::sleep(INTERVAL * 3).await;
    stat.add_node("h1:27017").unwrap();
    assert_eq!(stat.node_count(), 1);
    assert_eq!(source.opened.load(Ordering::SeqCst), 1);

    stat.stop().await;
}

#[tokio::test]
async fn unreachable_host_fails_to_register() {
    let source = FakeSource::with(&[]);
    let stat = MonitorStat::new(config(&["h1:27017"], 0), source).unwrap();
    let err = stat.add_node("h1:27017").unwrap_err();
    assert!(matches!(err, MonitorError::Connect { ref host, .. } if host == "h1:27017"));
    assert_eq!(stat.node_count(), 0);
}

#[tokio::test]
async fn stop_ends_an_unlimited_run() {
    let source = FakeSource::with(&[("h1:27017", Behavior::Healthy("h1:27017"))]);
    let stat = Arc::new(MonitorStat::new(config(&["h1:27017"], 0), source.clone()).unwrap());
    stat.add_node("h1:27017").unwrap();
    let runner = {
        let stat = Arc::clone(&stat);
        tokio::spawn(async move { stat.run().await })
    };

    let first = tokio::time::timeout(WAIT, stat.next_message()).await.unwrap();
    assert!(first.is_some());
    stat.stop().await;

    let result = tokio::time::timeout(WAIT, runner).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert!(source.all_closed());
    // Whatever was queued drains, then the stream ends.
    while tokio::time::timeout(WAIT, stat.next_message())
        .await
        .unwrap()
        .is_some()
    {}
}

#[tokio::test]
async fn reset_restarts_row_count() {
    let source = FakeSource::with(&[("h1:27017", Behavior::Healthy("h1:27017"))]);
    let stat = Arc::new(MonitorStat::new(config(&["h1:27017"], 2), source).unwrap());
    stat.add_node("h1:27017").unwrap();
    let runner = {
        let stat = Arc::clone(&stat);
        tokio::spawn(async move { stat.run().await })
    };

    let first = tokio::time::timeout(WAIT, stat.next_message()).await.unwrap();
    assert!(first.is_some());
    stat.reset();

    let mut rest = 0;
    while tokio::time::timeout(WAIT, stat.next_message())
        .await
        .unwrap()
        .is_some()
    {
        rest += 1;
    }
    assert_eq!(rest, 2, "two more rows after reset");
    assert!(tokio::time::timeout(WAIT, runner).await.unwrap().unwrap().is_ok());
    stat.stop().await;
}
