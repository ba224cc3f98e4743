//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(
    name = "clusterstat",
    version,
    about = "Live per-interval throughput and resource monitor for MongoDB"
)]
pub struct Cli {
    /// Hosts to monitor (host:port or shard/host:port). A trailing bare
    /// number is taken as the interval in seconds.
    pub hosts: Vec<String>,

    /// Additional host to monitor (repeatable)
    #[arg(long = "host", value_name = "HOST")]
    pub extra_hosts: Vec<String>,

    /// Seconds between polls
    #[arg(long)]
    pub interval: Option<u64>,

    /// Stop after this many batches (0 = unlimited)
    #[arg(short = 'n', long = "rowcount")]
    pub row_count: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    pub duration: Option<u64>,

    /// Print one JSON object per batch instead of a table
    #[arg(long)]
    pub json: bool,

    /// Show every column relevant to the detected storage engine
    #[arg(long)]
    pub all: bool,

    /// Show lock-wait columns
    #[arg(long)]
    pub locks: bool,

    /// Comma-separated list of columns; disables column inference
    #[arg(short = 'o', long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Never print the header row
    #[arg(long = "noheaders")]
    pub no_headers: bool,

    /// Scale byte counts (`--humanReadable=false` prints raw numbers)
    #[arg(
        long = "humanReadable",
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    pub human_readable: Option<bool>,

    #[arg(short = 'u', long, env = "CLUSTERSTAT_USERNAME")]
    pub username: Option<String>,

    #[arg(short = 'p', long, env = "CLUSTERSTAT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database holding the user's credentials
    #[arg(long = "authenticationDatabase")]
    pub auth_source: Option<String>,

    /// Application name reported to the server
    #[arg(long = "appName")]
    pub app_name: Option<String>,

    /// Path to the mongosh binary
    #[arg(long)]
    pub mongosh: Option<String>,

    /// TOML config file; command-line flags override its values
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Hosts from positionals and `--host`, with a trailing numeric
    /// positional split off as the interval in seconds.
    pub fn hosts_and_sleep(&self) -> (Vec<String>, Option<u64>) {
        let mut positionals = self.hosts.clone();
        let sleep = match positionals.last().map(|s| s.parse::<u64>()) {
            Some(Ok(secs)) => {
                positionals.pop();
                Some(secs)
            }
            _ => None,
        };
        positionals.extend(self.extra_hosts.iter().cloned());
        (positionals, sleep)
    }
}
