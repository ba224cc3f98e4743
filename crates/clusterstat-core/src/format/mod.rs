//! Formatter contract and the two built-in formatters.

mod grid;
mod json;

pub use grid::GridFormatter;
pub use json::JsonFormatter;

use serde::{Deserialize, Serialize};

use crate::line::{GRID_TIME_FORMAT, JSON_TIME_FORMAT, StatLine};

/// Renders batches of stat lines and tracks the row limit.
pub trait LineFormatter: Send {
    /// Render one batch. Each call counts as one row against the limit.
    fn format_lines(&mut self, lines: &[StatLine], headers: &[&'static str]) -> String;

    /// True once the formatter will accept no more rows.
    fn is_finished(&self) -> bool;

    /// Restart row counting.
    fn reset_count(&mut self);
}

/// Row-count bookkeeping shared by the built-in formatters.
/// `max_rows == 0` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowLimit {
    max_rows: u64,
    row_count: u64,
}

impl RowLimit {
    pub fn new(max_rows: u64) -> Self {
        Self {
            max_rows,
            row_count: 0,
        }
    }

    pub fn increment(&mut self) {
        self.row_count += 1;
    }

    pub fn reset(&mut self) {
        self.row_count = 0;
    }

    pub fn count(&self) -> u64 {
        self.row_count
    }

    pub fn is_finished(&self) -> bool {
        self.max_rows > 0 && self.row_count >= self.max_rows
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Grid,
    Json,
}

impl OutputMode {
    pub fn time_format(self) -> &'static str {
        match self {
            OutputMode::Grid => GRID_TIME_FORMAT,
            OutputMode::Json => JSON_TIME_FORMAT,
        }
    }
}

/// Build the formatter for `mode`.
pub fn new_formatter(mode: OutputMode, max_rows: u64, include_header: bool) -> Box<dyn LineFormatter> {
    match mode {
        OutputMode::Grid => Box::new(GridFormatter::new(max_rows, include_header)),
        OutputMode::Json => Box::new(JsonFormatter::new(max_rows)),
    }
}
