//! One JSON object per batch, keyed by host.

use serde_json::{Map, Value};

use crate::format::{LineFormatter, RowLimit};
use crate::line::StatLine;

pub struct JsonFormatter {
    limit: RowLimit,
}

impl JsonFormatter {
    pub fn new(max_rows: u64) -> Self {
        Self {
            limit: RowLimit::new(max_rows),
        }
    }
}

impl LineFormatter for JsonFormatter {
    fn format_lines(&mut self, lines: &[StatLine], headers: &[&'static str]) -> String {
        let mut batch = Map::new();
        for line in lines {
            let mut entry = Map::new();
            match &line.error {
                Some(err) => {
                    entry.insert("error".to_string(), Value::String(err.to_string()));
                }
                None => {
                    for key in headers {
                        if let Some(value) = line.get(key) {
                            entry.insert((*key).to_string(), Value::String(value.to_string()));
                        }
                    }
                }
            }
            batch.insert(line.host.clone(), Value::Object(entry));
        }

        self.limit.increment();
        let mut out = Value::Object(batch).to_string();
        out.push('\n');
        out
    }

    fn is_finished(&self) -> bool {
        self.limit.is_finished()
    }

    fn reset_count(&mut self) {
        self.limit.reset();
    }
}
