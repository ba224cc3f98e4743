//! clusterstat: live per-interval throughput monitor for MongoDB hosts.
//! Polls every host through mongosh and prints one batch per interval.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clusterstat_mongosh::{MongoshExecutor, MongoshSource};
use clusterstat_monitor::MonitorStat;

mod cli;
mod config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // stdout carries rows only
    let filter = std::env::var("CLUSTERSTAT_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = config::StatConfig::resolve(&args)?;
    tracing::debug!(monitor = ?config.monitor, mongosh = %config.mongosh_bin, "configuration resolved");

    let source = Arc::new(MongoshSource::new(
        MongoshExecutor::new(config.mongosh_bin.clone()),
        config.connection.clone(),
    ));
    let stat = Arc::new(
        MonitorStat::new(config.monitor.clone(), source).context("invalid column configuration")?,
    );
    for host in &config.monitor.hosts {
        stat.add_node(host)
            .with_context(|| format!("failed to add host {host}"))?;
    }

    let runner = {
        let stat = Arc::clone(&stat);
        tokio::spawn(async move { stat.run().await })
    };
    let interrupt = {
        let stat = Arc::clone(&stat);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, stopping");
                stat.stop().await;
            }
        })
    };

    while let Some(message) = stat.next_message().await {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(message.as_bytes()).and_then(|()| stdout.flush()) {
            tracing::debug!(error = %e, "stdout closed, stopping");
            stat.cancel_token().cancel();
            break;
        }
    }

    let result = runner.await.context("monitor task failed")?;
    interrupt.abort();
    stat.stop().await;
    result.context("monitoring stopped")?;
    Ok(())
}
