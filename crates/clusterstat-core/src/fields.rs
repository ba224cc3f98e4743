//! Output field descriptors.
//!
//! The column set is a runtime list of tagged descriptors: each one names a
//! column, the capability flags it requires, and how to render it from a
//! pair of consecutive samples. Which descriptors are active is decided once
//! per run from the first successful sample (see `StatConsumer`).

use crate::flags::Flags;
use crate::line::ReaderConfig;
use crate::status::{OpcountStats, QueueStats, ReadWriteCounts, ServerStatus};

/// Two consecutive samples of one host plus rendering settings.
pub struct Delta<'a> {
    pub old: &'a ServerStatus,
    pub new: &'a ServerStatus,
    pub config: &'a ReaderConfig,
    /// Seconds between the two samples' capture times.
    pub elapsed_secs: f64,
}

impl<'a> Delta<'a> {
    pub fn new(old: &'a ServerStatus, new: &'a ServerStatus, config: &'a ReaderConfig) -> Self {
        let elapsed = new.sample_time.signed_duration_since(old.sample_time);
        Self {
            old,
            new,
            config,
            elapsed_secs: elapsed.num_milliseconds() as f64 / 1000.0,
        }
    }

    /// Per-second rate of a monotonically increasing counter. A counter that
    /// went backwards (server restart) reports zero.
    fn rate(&self, select: impl Fn(&ServerStatus) -> Option<i64>) -> i64 {
        let diff = self.diff(select);
        if self.elapsed_secs <= 0.0 {
            return diff;
        }
        (diff as f64 / self.elapsed_secs).round() as i64
    }

    fn diff(&self, select: impl Fn(&ServerStatus) -> Option<i64>) -> i64 {
        match (select(self.old), select(self.new)) {
            (Some(old), Some(new)) if new >= old => new - old,
            _ => 0,
        }
    }
}

/// One output column.
pub struct FieldDescriptor {
    pub key: &'static str,
    /// Every flag here must be present in the run's flag set.
    pub flags: Flags,
    render: fn(&Delta<'_>) -> String,
}

impl FieldDescriptor {
    pub fn render(&self, delta: &Delta<'_>) -> String {
        (self.render)(delta)
    }

    pub fn is_active(&self, flags: Flags) -> bool {
        flags.contains(self.flags)
    }
}

impl std::fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("key", &self.key)
            .field("flags", &self.flags)
            .finish()
    }
}

const ALWAYS: Flags = Flags::ALWAYS;
const ALWAYS_WT: Flags = Flags::ALWAYS.union(Flags::WT);
const ALWAYS_MMAP: Flags = Flags::ALWAYS.union(Flags::MMAP);
const ALL_MMAP: Flags = Flags::ALL.union(Flags::MMAP);

/// Every known column, in display order.
pub static FIELD_DESCRIPTORS: &[FieldDescriptor] = &[
    FieldDescriptor { key: "host", flags: Flags::HOSTS, render: render_host },
    FieldDescriptor { key: "insert", flags: ALWAYS, render: render_insert },
    FieldDescriptor { key: "query", flags: ALWAYS, render: render_query },
    FieldDescriptor { key: "update", flags: ALWAYS, render: render_update },
    FieldDescriptor { key: "delete", flags: ALWAYS, render: render_delete },
    FieldDescriptor { key: "getmore", flags: ALWAYS, render: render_getmore },
    FieldDescriptor { key: "command", flags: ALWAYS, render: render_command },
    FieldDescriptor { key: "dirty", flags: ALWAYS_WT, render: render_dirty },
    FieldDescriptor { key: "used", flags: ALWAYS_WT, render: render_used },
    FieldDescriptor { key: "flushes", flags: ALWAYS, render: render_flushes },
    FieldDescriptor { key: "mapped", flags: ALWAYS_MMAP, render: render_mapped },
    FieldDescriptor { key: "vsize", flags: ALWAYS, render: render_vsize },
    FieldDescriptor { key: "res", flags: ALWAYS, render: render_res },
    FieldDescriptor { key: "nonmapped", flags: ALL_MMAP, render: render_nonmapped },
    FieldDescriptor { key: "faults", flags: ALWAYS_MMAP, render: render_faults },
    FieldDescriptor { key: "lrw", flags: Flags::LOCKS, render: render_lock_wait_ratio },
    FieldDescriptor { key: "lrwt", flags: Flags::LOCKS, render: render_lock_wait_time },
    FieldDescriptor { key: "qrw", flags: ALWAYS, render: render_queued },
    FieldDescriptor { key: "arw", flags: ALWAYS, render: render_active },
    FieldDescriptor { key: "net_in", flags: ALWAYS, render: render_net_in },
    FieldDescriptor { key: "net_out", flags: ALWAYS, render: render_net_out },
    FieldDescriptor { key: "conn", flags: ALWAYS, render: render_conn },
    FieldDescriptor { key: "set", flags: Flags::REPL, render: render_set },
    FieldDescriptor { key: "repl", flags: Flags::REPL, render: render_repl },
    FieldDescriptor { key: "time", flags: ALWAYS, render: render_time },
];

/// Look up a descriptor by column key.
pub fn descriptor(key: &str) -> Option<&'static FieldDescriptor> {
    FIELD_DESCRIPTORS.iter().find(|d| d.key == key)
}

/// Ordered keys of every descriptor active under `flags`.
pub fn active_keys(flags: Flags) -> Vec<&'static str> {
    FIELD_DESCRIPTORS
        .iter()
        .filter(|d| d.is_active(flags))
        .map(|d| d.key)
        .collect()
}

// ------------------------------------------------------------------
// Renderers
// ------------------------------------------------------------------

fn render_host(d: &Delta<'_>) -> String {
    d.new.host.clone()
}

fn op_counter(d: &Delta<'_>, select: fn(&OpcountStats) -> i64) -> String {
    let is_secondary = d.new.repl.as_ref().is_some_and(|r| r.secondary);
    if is_secondary {
        let replicated = d.rate(|s| s.opcounters_repl.as_ref().map(select));
        format!("*{replicated}")
    } else {
        d.rate(|s| s.opcounters.as_ref().map(select)).to_string()
    }
}

fn render_insert(d: &Delta<'_>) -> String {
    op_counter(d, |o| o.insert)
}

fn render_query(d: &Delta<'_>) -> String {
    op_counter(d, |o| o.query)
}

fn render_update(d: &Delta<'_>) -> String {
    op_counter(d, |o| o.update)
}

fn render_delete(d: &Delta<'_>) -> String {
    op_counter(d, |o| o.delete)
}

fn render_getmore(d: &Delta<'_>) -> String {
    op_counter(d, |o| o.getmore)
}

fn render_command(d: &Delta<'_>) -> String {
    let local = d.rate(|s| s.opcounters.as_ref().map(|o| o.command));
    let replicated = d.rate(|s| s.opcounters_repl.as_ref().map(|o| o.command));
    format!("{local}|{replicated}")
}

fn cache_percent(d: &Delta<'_>, select: fn(&crate::status::CacheStats) -> i64) -> String {
    let percent = d
        .new
        .wired_tiger
        .as_ref()
        .filter(|wt| wt.cache.max_bytes_configured > 0)
        .map(|wt| select(&wt.cache) as f64 * 100.0 / wt.cache.max_bytes_configured as f64)
        .unwrap_or(0.0);
    format!("{percent:.1}%")
}

fn render_dirty(d: &Delta<'_>) -> String {
    cache_percent(d, |c| c.tracked_dirty_bytes)
}

fn render_used(d: &Delta<'_>) -> String {
    cache_percent(d, |c| c.current_cached_bytes)
}

fn render_flushes(d: &Delta<'_>) -> String {
    let flushes = if d.new.is_wired_tiger() {
        d.diff(|s| s.wired_tiger.as_ref().map(|wt| wt.transaction.checkpoints))
    } else {
        d.diff(|s| s.background_flushing.as_ref().map(|f| f.flushes))
    };
    flushes.to_string()
}

fn mem_amount(d: &Delta<'_>, megabytes: Option<i64>) -> String {
    match megabytes {
        Some(mb) => format_megabytes(mb, d.config.human_readable),
        None => "n/a".to_string(),
    }
}

fn render_mapped(d: &Delta<'_>) -> String {
    mem_amount(d, d.new.mem.as_ref().map(|m| m.mapped))
}

fn render_vsize(d: &Delta<'_>) -> String {
    mem_amount(d, d.new.mem.as_ref().map(|m| m.r#virtual))
}

fn render_res(d: &Delta<'_>) -> String {
    mem_amount(d, d.new.mem.as_ref().map(|m| m.resident))
}

fn render_nonmapped(d: &Delta<'_>) -> String {
    mem_amount(
        d,
        d.new
            .mem
            .as_ref()
            .map(|m| (m.r#virtual - m.mapped_with_journal).max(0)),
    )
}

fn render_faults(d: &Delta<'_>) -> String {
    if d.new.extra_info.as_ref().and_then(|e| e.page_faults).is_none() {
        return "n/a".to_string();
    }
    d.rate(|s| s.extra_info.as_ref().and_then(|e| e.page_faults))
        .to_string()
}

/// Sum a read/write counter over every lock resource.
fn lock_totals(
    status: &ServerStatus,
    select: fn(&crate::status::LockStats) -> Option<&ReadWriteCounts>,
) -> Option<(i64, i64)> {
    let locks = status.locks.as_ref()?;
    let mut totals = None;
    for stats in locks.values() {
        if let Some(counts) = select(stats) {
            let (r, w) = totals.unwrap_or((0, 0));
            totals = Some((r + counts.reads(), w + counts.writes()));
        }
    }
    totals
}

fn lock_diff(
    d: &Delta<'_>,
    select: fn(&crate::status::LockStats) -> Option<&ReadWriteCounts>,
) -> (i64, i64) {
    let reads = d.diff(|s| lock_totals(s, select).map(|(r, _)| r));
    let writes = d.diff(|s| lock_totals(s, select).map(|(_, w)| w));
    (reads, writes)
}

fn ratio(numerator: i64, denominator: i64, scale: f64) -> f64 {
    if denominator <= 0 {
        0.0
    } else {
        numerator as f64 * scale / denominator as f64
    }
}

fn render_lock_wait_ratio(d: &Delta<'_>) -> String {
    let (acq_r, acq_w) = lock_diff(d, |l| l.acquire_count.as_ref());
    let (wait_r, wait_w) = lock_diff(d, |l| l.acquire_wait_count.as_ref());
    format!(
        "{:.1}%|{:.1}%",
        ratio(wait_r, acq_r, 100.0),
        ratio(wait_w, acq_w, 100.0)
    )
}

fn render_lock_wait_time(d: &Delta<'_>) -> String {
    let (wait_r, wait_w) = lock_diff(d, |l| l.acquire_wait_count.as_ref());
    let (micros_r, micros_w) = lock_diff(d, |l| l.time_acquiring_micros.as_ref());
    format!(
        "{}|{}",
        ratio(micros_r, wait_r, 1.0).round() as i64,
        ratio(micros_w, wait_w, 1.0).round() as i64
    )
}

fn readers_writers(queue: Option<&QueueStats>) -> String {
    match queue {
        Some(q) => format!("{}|{}", q.readers, q.writers),
        None => "0|0".to_string(),
    }
}

fn render_queued(d: &Delta<'_>) -> String {
    readers_writers(d.new.global_lock.as_ref().and_then(|g| g.current_queue.as_ref()))
}

fn render_active(d: &Delta<'_>) -> String {
    readers_writers(d.new.global_lock.as_ref().and_then(|g| g.active_clients.as_ref()))
}

fn render_net_in(d: &Delta<'_>) -> String {
    let rate = d.rate(|s| s.network.as_ref().map(|n| n.bytes_in));
    format_bytes(rate, d.config.human_readable)
}

fn render_net_out(d: &Delta<'_>) -> String {
    let rate = d.rate(|s| s.network.as_ref().map(|n| n.bytes_out));
    format_bytes(rate, d.config.human_readable)
}

fn render_conn(d: &Delta<'_>) -> String {
    d.new
        .connections
        .as_ref()
        .map_or(0, |c| c.current)
        .to_string()
}

fn render_set(d: &Delta<'_>) -> String {
    d.new
        .repl
        .as_ref()
        .map(|r| r.set_name.clone())
        .unwrap_or_default()
}

fn render_repl(d: &Delta<'_>) -> String {
    if d.new.is_mongos() {
        return "RTR".to_string();
    }
    let Some(repl) = d.new.repl.as_ref() else {
        return String::new();
    };
    let role = if repl.ismaster {
        "PRI"
    } else if repl.secondary {
        "SEC"
    } else if repl.arbiter_only {
        "ARB"
    } else if !repl.set_name.is_empty() {
        "REC"
    } else {
        ""
    };
    role.to_string()
}

fn render_time(d: &Delta<'_>) -> String {
    d.new.sample_time.format(&d.config.time_format).to_string()
}

// ------------------------------------------------------------------
// Number formatting
// ------------------------------------------------------------------

/// Scale a byte count with decimal units: `512b`, `1.5k`, `20.3m`, `1.1g`.
pub fn format_bytes(bytes: i64, human_readable: bool) -> String {
    if !human_readable {
        return bytes.to_string();
    }
    let b = bytes as f64;
    if bytes < 1_000 {
        format!("{bytes}b")
    } else if bytes < 1_000_000 {
        format!("{:.1}k", b / 1e3)
    } else if bytes < 1_000_000_000 {
        format!("{:.1}m", b / 1e6)
    } else {
        format!("{:.1}g", b / 1e9)
    }
}

/// Scale a megabyte amount with binary units: `512M`, `1.5G`, `2.0T`.
pub fn format_megabytes(mb: i64, human_readable: bool) -> String {
    if !human_readable {
        return mb.to_string();
    }
    let m = mb as f64;
    if mb < 1024 {
        format!("{mb}M")
    } else if mb < 1024 * 1024 {
        format!("{:.1}G", m / 1024.0)
    } else {
        format!("{:.1}T", m / (1024.0 * 1024.0))
    }
}
