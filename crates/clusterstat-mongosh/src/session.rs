//! Per-host status sessions backed by mongosh.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clusterstat_core::{ServerStatus, SourceError, StatusSession, StatusSource};

use crate::executor::{MongoshExecutor, MongoshRunner};

/// Script evaluated on every poll. `recordStats: 0` skips the per-database
/// record section, which is large and unused.
pub const SERVER_STATUS_SCRIPT: &str =
    "EJSON.stringify(db.adminCommand({serverStatus: 1, recordStats: 0}), {relaxed: true})";

/// Connection settings copied into every per-host session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub username: Option<String>,
    /// Passed to mongosh as `--password`, so it shows up in the process
    /// list of the local machine while a poll runs. Leave unset and rely on
    /// a mongosh config or x509 auth where that matters.
    pub password: Option<String>,
    pub auth_source: Option<String>,
    pub app_name: Option<String>,
}

/// Opens one direct session per host.
pub struct MongoshSource {
    runner: Arc<dyn MongoshRunner>,
    options: ConnectionOptions,
}

impl MongoshSource {
    pub fn new(executor: MongoshExecutor, options: ConnectionOptions) -> Self {
        Self::with_runner(Arc::new(executor), options)
    }

    pub fn with_runner(runner: Arc<dyn MongoshRunner>, options: ConnectionOptions) -> Self {
        Self { runner, options }
    }
}

impl StatusSource for MongoshSource {
    fn open(&self, host: &str) -> Result<Box<dyn StatusSession>, SourceError> {
        let host = host.trim();
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(SourceError::InvalidHost(host.to_string()));
        }
        tracing::debug!(host = %host, "opening mongosh session");
        Ok(Box::new(MongoshSession {
            host: host.to_string(),
            args: build_args(host, &self.options),
            runner: Arc::clone(&self.runner),
            closed: AtomicBool::new(false),
        }))
    }
}

/// A session bound to one host.
pub struct MongoshSession {
    host: String,
    args: Vec<String>,
    runner: Arc<dyn MongoshRunner>,
    closed: AtomicBool,
}

impl MongoshSession {
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl StatusSession for MongoshSession {
    fn server_status(&self) -> Result<ServerStatus, SourceError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SourceError::Closed);
        }
        let stdout = self.runner.run(&self.args)?;
        let status = ServerStatus::from_json(stdout.trim())?;
        Ok(status)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(host = %self.host, "mongosh session closed");
        }
    }
}

/// Connection URI for a direct connection with no socket timeout. Direct
/// mode disables the driver's own replica-set discovery so each session
/// only ever talks to the host it was opened for.
fn connection_uri(host: &str, options: &ConnectionOptions) -> String {
    let mut uri = format!("mongodb://{host}/?directConnection=true&socketTimeoutMS=0");
    if let Some(app) = options.app_name.as_deref() {
        uri.push_str("&appName=");
        uri.push_str(&encode_query_value(app));
    }
    uri
}

/// Percent-encode everything outside the URI unreserved set.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn build_args(host: &str, options: &ConnectionOptions) -> Vec<String> {
    let mut args = vec![
        "--quiet".to_string(),
        "--norc".to_string(),
        connection_uri(host, options),
    ];
    if let Some(user) = options.username.as_deref() {
        args.extend(["--username".to_string(), user.to_string()]);
    }
    if let Some(password) = options.password.as_deref() {
        args.extend(["--password".to_string(), password.to_string()]);
    }
    if let Some(source) = options.auth_source.as_deref() {
        args.extend(["--authenticationDatabase".to_string(), source.to_string()]);
    }
    args.extend(["--eval".to_string(), SERVER_STATUS_SCRIPT.to_string()]);
    args
}
