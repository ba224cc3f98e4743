//! Stat lines: the rendered delta between two consecutive samples of one host.

use std::collections::HashMap;

use crate::error::NodeError;
use crate::fields::{Delta, descriptor};
use crate::status::ServerStatus;

pub const GRID_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const JSON_TIME_FORMAT: &str = "%H:%M:%S";

/// Settings that affect how individual values are rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Scale byte and megabyte amounts (`1.5k`, `2.0G`) instead of raw numbers.
    pub human_readable: bool,
    /// chrono format string for the `time` column.
    pub time_format: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            human_readable: true,
            time_format: GRID_TIME_FORMAT.to_string(),
        }
    }
}

/// One output row. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatLine {
    /// Dialed address of the host this row describes.
    pub host: String,
    /// Rendered value per column key. Always contains `host`.
    pub fields: HashMap<String, String>,
    pub error: Option<NodeError>,
}

impl StatLine {
    /// Render every column in `headers` from the `(old, new)` pair.
    /// Unknown keys are skipped; headers are validated when the schema is built.
    pub fn new(
        old: &ServerStatus,
        new: &ServerStatus,
        headers: &[&'static str],
        config: &ReaderConfig,
    ) -> Self {
        let delta = Delta::new(old, new, config);
        let mut fields: HashMap<String, String> = headers
            .iter()
            .filter_map(|key| descriptor(key))
            .map(|desc| (desc.key.to_string(), desc.render(&delta)))
            .collect();
        fields.insert("host".to_string(), new.host.clone());
        Self {
            host: new.host.clone(),
            fields,
            error: None,
        }
    }

    /// An error row for the host the error was observed on.
    pub fn from_error(err: NodeError) -> Self {
        let mut fields = HashMap::new();
        fields.insert("host".to_string(), err.host.clone());
        Self {
            host: err.host.clone(),
            fields,
            error: Some(err),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
