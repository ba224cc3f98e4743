//! Right-aligned columnar output.

use crate::format::{LineFormatter, RowLimit};
use crate::line::StatLine;

/// Header is repeated every this many batches.
const HEADER_EVERY: u64 = 10;

pub struct GridFormatter {
    limit: RowLimit,
    include_header: bool,
}

impl GridFormatter {
    pub fn new(max_rows: u64, include_header: bool) -> Self {
        Self {
            limit: RowLimit::new(max_rows),
            include_header,
        }
    }

    fn wants_header(&self, batch_len: usize) -> bool {
        self.include_header && (self.limit.count() % HEADER_EVERY == 0 || batch_len > 1)
    }
}

impl LineFormatter for GridFormatter {
    fn format_lines(&mut self, lines: &[StatLine], headers: &[&'static str]) -> String {
        let widths: Vec<usize> = headers
            .iter()
            .map(|key| {
                lines
                    .iter()
                    .filter(|line| !line.is_error())
                    .filter_map(|line| line.get(key))
                    .map(str::len)
                    .fold(key.len(), usize::max)
            })
            .collect();

        let mut out = String::new();
        if !headers.is_empty() && self.wants_header(lines.len()) {
            push_row(&mut out, headers.iter().copied(), &widths);
        }

        for line in lines {
            match &line.error {
                Some(err) => {
                    out.push_str(&line.host);
                    out.push(' ');
                    out.push_str(&err.to_string());
                    out.push('\n');
                }
                None => {
                    let values = headers.iter().map(|key| line.get(key).unwrap_or(""));
                    push_row(&mut out, values, &widths);
                }
            }
        }

        self.limit.increment();
        out
    }

    fn is_finished(&self) -> bool {
        self.limit.is_finished()
    }

    fn reset_count(&mut self) {
        self.limit.reset();
    }
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let row: Vec<String> = cells
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:>width$}"))
        .collect();
    out.push_str(&row.join(" "));
    out.push('\n');
}
