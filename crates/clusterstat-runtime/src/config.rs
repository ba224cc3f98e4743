//! Run configuration: built-in defaults, then an optional TOML file, then
//! command-line flags.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use clusterstat_core::OutputMode;
use clusterstat_mongosh::ConnectionOptions;
use clusterstat_monitor::MonitorConfig;
use serde::Deserialize;

use crate::cli::Cli;

const DEFAULT_MONGOSH: &str = "mongosh";

/// Shape of the `--config` file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub hosts: Option<Vec<String>>,
    pub interval_ms: Option<u64>,
    pub row_count: Option<u64>,
    pub duration_secs: Option<u64>,
    pub output: Option<OutputMode>,
    pub all: Option<bool>,
    pub locks: Option<bool>,
    pub columns: Option<Vec<String>>,
    pub no_headers: Option<bool>,
    pub human_readable: Option<bool>,
    pub connection: ConnectionSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSection {
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_source: Option<String>,
    pub app_name: Option<String>,
    pub mongosh: Option<String>,
}

impl FileConfig {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatConfig {
    pub monitor: MonitorConfig,
    pub connection: ConnectionOptions,
    pub mongosh_bin: String,
}

impl StatConfig {
    /// Resolve from the command line, reading `--config` if given.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::from_layers(file, cli)
    }

    pub fn from_layers(file: FileConfig, cli: &Cli) -> anyhow::Result<Self> {
        let defaults = MonitorConfig::default();
        let (cli_hosts, sleep_secs) = cli.hosts_and_sleep();

        let hosts = if !cli_hosts.is_empty() {
            cli_hosts
        } else {
            file.hosts.filter(|h| !h.is_empty()).unwrap_or(defaults.hosts)
        };

        let interval = match cli.interval.or(sleep_secs) {
            Some(secs) => Duration::from_secs(secs),
            None => file
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
        };
        if interval.is_zero() {
            bail!("interval must be greater than zero");
        }

        let output = if cli.json {
            OutputMode::Json
        } else {
            file.output.unwrap_or(defaults.output)
        };

        let columns = if !cli.columns.is_empty() {
            cli.columns.clone()
        } else {
            file.columns.unwrap_or_default()
        };

        let monitor = MonitorConfig {
            hosts,
            interval,
            row_count: cli.row_count.or(file.row_count).unwrap_or(defaults.row_count),
            duration: cli
                .duration
                .or(file.duration_secs)
                .map(Duration::from_secs),
            output,
            all: cli.all || file.all.unwrap_or(defaults.all),
            locks: cli.locks || file.locks.unwrap_or(defaults.locks),
            columns,
            no_headers: cli.no_headers || file.no_headers.unwrap_or(defaults.no_headers),
            human_readable: cli
                .human_readable
                .or(file.human_readable)
                .unwrap_or(defaults.human_readable),
        };

        let conn = file.connection;
        let connection = ConnectionOptions {
            username: cli.username.clone().or(conn.username),
            password: cli.password.clone().or(conn.password),
            auth_source: cli.auth_source.clone().or(conn.auth_source),
            app_name: cli
                .app_name
                .clone()
                .or(conn.app_name)
                .or_else(|| Some("clusterstat".to_string())),
        };
        let mongosh_bin = cli
            .mongosh
            .clone()
            .or(conn.mongosh)
            .unwrap_or_else(|| DEFAULT_MONGOSH.to_string());

        Ok(Self {
            monitor,
            connection,
            mongosh_bin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["clusterstat"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let config = StatConfig::from_layers(FileConfig::default(), &Cli::default()).unwrap();
        assert_eq!(config.monitor, MonitorConfig::default());
        assert_eq!(config.mongosh_bin, "mongosh");
        assert_eq!(config.connection.app_name.as_deref(), Some("clusterstat"));
    }

    #[test]
    fn file_values_apply() {
        let file = FileConfig::from_toml(
            r#"
            hosts = ["a:27017", "b:27017"]
            interval_ms = 500
            row_count = 20
            duration_secs = 60
            output = "json"
            columns = ["insert", "conn"]

            [connection]
            username = "monitor"
            auth_source = "admin"
            mongosh = "/opt/mongosh/bin/mongosh"
            "#,
        )
        .unwrap();
        let config = StatConfig::from_layers(file, &Cli::default()).unwrap();
        assert_eq!(config.monitor.hosts, vec!["a:27017", "b:27017"]);
        assert_eq!(config.monitor.interval, Duration::from_millis(500));
        assert_eq!(config.monitor.row_count, 20);
        assert_eq!(config.monitor.duration, Some(Duration::from_secs(60)));
        assert_eq!(config.monitor.output, OutputMode::Json);
        assert_eq!(config.monitor.columns, vec!["insert", "conn"]);
        assert_eq!(config.connection.username.as_deref(), Some("monitor"));
        assert_eq!(config.mongosh_bin, "/opt/mongosh/bin/mongosh");
    }

    #[test]
    fn flags_override_file() {
        let file = FileConfig::from_toml(
            r#"
            hosts = ["a:27017"]
            interval_ms = 500
            row_count = 20
            human_readable = true
            "#,
        )
        .unwrap();
        let config = StatConfig::from_layers(
            file,
            &cli(&["h9:27017", "2", "-n", "3", "--humanReadable=false"]),
        )
        .unwrap();
        assert_eq!(config.monitor.hosts, vec!["h9:27017"]);
        assert_eq!(config.monitor.interval, Duration::from_secs(2));
        assert_eq!(config.monitor.row_count, 3);
        assert!(!config.monitor.human_readable);
    }

    #[test]
    fn zero_interval_rejected() {
        let err = StatConfig::from_layers(FileConfig::default(), &cli(&["--interval", "0"]))
            .unwrap_err();
        assert!(err.to_string().contains("interval"));
    }

    #[test]
    fn unknown_file_key_rejected() {
        assert!(FileConfig::from_toml("rowcount = 3").is_err());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "hosts = [\"db1:27017\"]\nlocks = true").unwrap();
        let cli = cli(&["--config", file.path().to_str().unwrap()]);
        let config = StatConfig::resolve(&cli).unwrap();
        assert_eq!(config.monitor.hosts, vec!["db1:27017"]);
        assert!(config.monitor.locks);
    }

    #[test]
    fn missing_file_names_path() {
        let cli = cli(&["--config", "/nonexistent/clusterstat.toml"]);
        let err = StatConfig::resolve(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/clusterstat.toml"));
    }
}
