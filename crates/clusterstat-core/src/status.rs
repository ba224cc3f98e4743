//! Raw status document for one host at one point in time.
//!
//! Only the sections the field descriptors read are modelled; everything
//! else in the server's reply is ignored. Every section is optional so a
//! reply from an older server, an arbiter, or a router still parses.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One point-in-time status snapshot from a monitored host.
///
/// `host` is rewritten by the poller to the dialed address; the server's
/// self-reported name is kept separately by the poller as an alias.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    /// Local capture time, stamped by the poller on receipt.
    #[serde(skip, default = "Local::now")]
    pub sample_time: DateTime<Local>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub process: String,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub uptime: i64,
    pub mem: Option<MemStats>,
    pub connections: Option<ConnectionStats>,
    #[serde(rename = "extra_info")]
    pub extra_info: Option<ExtraInfo>,
    pub global_lock: Option<GlobalLockStats>,
    pub locks: Option<HashMap<String, LockStats>>,
    pub network: Option<NetworkStats>,
    pub opcounters: Option<OpcountStats>,
    pub opcounters_repl: Option<OpcountStats>,
    pub repl: Option<ReplStatus>,
    pub storage_engine: Option<StorageEngine>,
    pub wired_tiger: Option<WiredTiger>,
    pub background_flushing: Option<FlushStats>,
}

impl ServerStatus {
    /// Parse a status document from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn storage_engine_name(&self) -> Option<&str> {
        self.storage_engine.as_ref().map(|e| e.name.as_str())
    }

    /// MMAPv1, either named explicitly or implied by a pre-3.0 reply
    /// that carries background flushing but no storage engine section.
    pub fn is_mmap(&self) -> bool {
        match self.storage_engine_name() {
            Some(name) => name == "mmapv1",
            None => self.background_flushing.is_some(),
        }
    }

    pub fn is_wired_tiger(&self) -> bool {
        self.storage_engine_name() == Some("wiredTiger")
    }

    pub fn is_repl_set(&self) -> bool {
        self.repl.as_ref().is_some_and(|r| !r.set_name.is_empty())
    }

    pub fn is_mongos(&self) -> bool {
        self.process.ends_with("mongos")
    }

    /// Lock acquisition counters are only reported by 3.0+ servers.
    pub fn has_lock_acquire_stats(&self) -> bool {
        self.locks
            .as_ref()
            .is_some_and(|locks| locks.values().any(|l| l.acquire_count.is_some()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemStats {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub bits: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub resident: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub r#virtual: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub mapped: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub mapped_with_journal: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStats {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub current: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub available: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub total_created: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtraInfo {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub page_faults: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalLockStats {
    pub current_queue: Option<QueueStats>,
    pub active_clients: Option<QueueStats>,
}

/// Readers/writers counts, shared by `currentQueue` and `activeClients`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub total: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub readers: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub writers: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStats {
    pub acquire_count: Option<ReadWriteCounts>,
    pub acquire_wait_count: Option<ReadWriteCounts>,
    pub time_acquiring_micros: Option<ReadWriteCounts>,
}

/// Intent-shared/intent-exclusive (`r`/`w`) and shared/exclusive (`R`/`W`) counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadWriteCounts {
    #[serde(rename = "R", default, deserialize_with = "lenient::i64")]
    pub read: i64,
    #[serde(rename = "W", default, deserialize_with = "lenient::i64")]
    pub write: i64,
    #[serde(rename = "r", default, deserialize_with = "lenient::i64")]
    pub intent_read: i64,
    #[serde(rename = "w", default, deserialize_with = "lenient::i64")]
    pub intent_write: i64,
}

impl ReadWriteCounts {
    pub fn reads(&self) -> i64 {
        self.read + self.intent_read
    }

    pub fn writes(&self) -> i64 {
        self.write + self.intent_write
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub bytes_in: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub bytes_out: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub num_requests: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpcountStats {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub insert: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub query: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub update: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub delete: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub getmore: i64,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub command: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplStatus {
    #[serde(default)]
    pub set_name: String,
    #[serde(default, alias = "isWritablePrimary")]
    pub ismaster: bool,
    #[serde(default)]
    pub secondary: bool,
    #[serde(default)]
    pub arbiter_only: bool,
    #[serde(default)]
    pub primary: String,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub me: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageEngine {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WiredTiger {
    #[serde(default)]
    pub cache: CacheStats,
    #[serde(default)]
    pub transaction: TransactionStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    #[serde(
        rename = "tracked dirty bytes in the cache",
        default,
        deserialize_with = "lenient::i64"
    )]
    pub tracked_dirty_bytes: i64,
    #[serde(
        rename = "bytes currently in the cache",
        default,
        deserialize_with = "lenient::i64"
    )]
    pub current_cached_bytes: i64,
    #[serde(
        rename = "maximum bytes configured",
        default,
        deserialize_with = "lenient::i64"
    )]
    pub max_bytes_configured: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionStats {
    #[serde(
        rename = "transaction checkpoints",
        default,
        deserialize_with = "lenient::i64"
    )]
    pub checkpoints: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlushStats {
    #[serde(default, deserialize_with = "lenient::i64")]
    pub flushes: i64,
    #[serde(rename = "total_ms", default, deserialize_with = "lenient::i64")]
    pub total_ms: i64,
}

/// Numeric fields arrive as plain integers, doubles, or extended-JSON
/// wrappers (`{"$numberLong": "42"}`) depending on server version and
/// shell settings. All of them collapse to `i64`.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        Ok(opt_i64(d)?.unwrap_or(0))
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(from_value(&value))
    }

    fn from_value(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_u64().map(|u| u.min(i64::MAX as u64) as i64))
                .or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.parse::<f64>().ok().map(|f| f as i64),
            Value::Object(map) => ["$numberLong", "$numberInt", "$numberDouble"]
                .iter()
                .find_map(|key| map.get(*key))
                .and_then(from_value),
            _ => None,
        }
    }
}
