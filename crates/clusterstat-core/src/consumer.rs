//! Delta consumer: turns consecutive samples of the same host into stat lines.
//!
//! Keeps the most recent sample per host as the baseline for the next diff,
//! and locks in the active column set from the first successful sample of
//! the run. A host's very first sample only establishes its baseline.

use std::collections::HashMap;

use crate::error::SchemaError;
use crate::fields::{active_keys, descriptor};
use crate::flags::Flags;
use crate::format::LineFormatter;
use crate::line::{ReaderConfig, StatLine};
use crate::status::ServerStatus;

pub struct StatConsumer {
    formatter: Box<dyn LineFormatter>,
    reader_config: ReaderConfig,
    /// Baseline per host. Key = dialed host address.
    old_stats: HashMap<String, ServerStatus>,
    headers: Vec<&'static str>,
    custom_headers: Vec<&'static str>,
    flags: Flags,
    schema_locked: bool,
}

impl StatConsumer {
    /// Create a consumer with no baselines.
    ///
    /// With empty `flags` the column set is exactly `custom_headers` and no
    /// inference happens. Otherwise `custom_headers` are appended after the
    /// inferred columns.
    pub fn new(
        flags: Flags,
        custom_headers: &[String],
        reader_config: ReaderConfig,
        formatter: Box<dyn LineFormatter>,
    ) -> Result<Self, SchemaError> {
        let custom_headers = custom_headers
            .iter()
            .map(|key| {
                descriptor(key)
                    .map(|d| d.key)
                    .ok_or_else(|| SchemaError::UnknownField(key.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let schema_locked = flags.is_empty();
        let headers = if schema_locked {
            custom_headers.clone()
        } else {
            Vec::new()
        };

        Ok(Self {
            formatter,
            reader_config,
            old_stats: HashMap::new(),
            headers,
            custom_headers,
            flags,
            schema_locked,
        })
    }

    /// Record `new` as the host's baseline and return the line against the
    /// previous baseline, if there was one.
    pub fn update(&mut self, new: ServerStatus) -> Result<Option<StatLine>, SchemaError> {
        if !self.schema_locked {
            self.infer_schema(&new)?;
        }

        let line = self
            .old_stats
            .get(&new.host)
            .map(|old| StatLine::new(old, &new, &self.headers, &self.reader_config));
        self.old_stats.insert(new.host.clone(), new);
        Ok(line)
    }

    /// Derive capability flags from the first successful sample and fix the
    /// ordered column list for the rest of the run.
    fn infer_schema(&mut self, stat: &ServerStatus) -> Result<(), SchemaError> {
        if self.flags.contains(Flags::LOCKS) && !stat.has_lock_acquire_stats() {
            return Err(SchemaError::LocksUnsupported {
                host: stat.host.clone(),
                version: stat.version.clone(),
            });
        }

        if stat.is_mmap() {
            self.flags |= Flags::MMAP;
        } else if stat.is_wired_tiger() {
            self.flags |= Flags::WT;
        }
        if stat.is_repl_set() {
            self.flags |= Flags::REPL;
        }

        let mut headers = active_keys(self.flags);
        for &key in &self.custom_headers {
            if !headers.contains(&key) {
                headers.push(key);
            }
        }
        self.headers = headers;
        self.schema_locked = true;
        Ok(())
    }

    /// Render a batch and report whether the formatter is now finished.
    pub fn format_lines(&mut self, lines: &[StatLine]) -> (String, bool) {
        let text = self.formatter.format_lines(lines, &self.headers);
        (text, self.formatter.is_finished())
    }

    /// Restart row counting. Baselines and the column set are kept.
    pub fn reset(&mut self) {
        self.formatter.reset_count();
    }

    pub fn headers(&self) -> &[&'static str] {
        &self.headers
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn is_schema_locked(&self) -> bool {
        self.schema_locked
    }

    pub fn has_baseline(&self, host: &str) -> bool {
        self.old_stats.contains_key(host)
    }
}
