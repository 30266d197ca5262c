use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Module id the configuration service assigns to a tenant group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    #[serde(rename = "confKey", alias = "key")]
    pub key: String,
    #[serde(rename = "confValue", default)]
    pub value: String,
}

/// One configured instance of the integration for a customer or environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantGroup {
    #[serde(rename = "moduleId", alias = "moduleID")]
    pub id: GroupId,
    pub group_name: String,
    #[serde(default)]
    pub configurations: Vec<ConfigEntry>,
}

impl TenantGroup {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.configurations
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.trim())
    }

    /// First entry that keeps this group from being synced: either a blank
    /// value or one of `required` missing altogether.
    pub fn missing_entry<'a>(&'a self, required: &[&'a str]) -> Option<&'a str> {
        if let Some(blank) = self
            .configurations
            .iter()
            .find(|entry| entry.value.trim().is_empty())
        {
            return Some(blank.key.as_str());
        }

        required
            .iter()
            .copied()
            .find(|key| self.get(key).map_or(true, str::is_empty))
    }
}

/// Per-cycle answer from the configuration service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfig {
    pub module_active: bool,
    #[serde(default)]
    pub configuration_groups: Vec<TenantGroup>,
}

/// Half-open `[start, end)` range of UTC instants a cycle is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    /// Smallest step `DateTime<Utc>` can represent.
    pub fn epsilon() -> Duration {
        Duration::nanoseconds(1)
    }

    /// Clamps `end` so a window never runs backwards.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Inclusive upper bound, for vendor APIs that filter with `<=`.
    pub fn last_instant(&self) -> DateTime<Utc> {
        if self.is_empty() {
            self.start
        } else {
            self.end - Self::epsilon()
        }
    }

    /// Start of the window that follows this one. An empty window hands
    /// its start on unchanged.
    pub fn next_start(&self) -> DateTime<Utc> {
        self.end
    }
}

impl std::fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Opaque vendor continuation token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(String);

impl Checkpoint {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub occurred_at: DateTime<Utc>,
    pub body: serde_json::Value,
}

impl LogRecord {
    pub fn new(occurred_at: DateTime<Utc>, body: serde_json::Value) -> Self {
        Self { occurred_at, body }
    }

    /// Plain-text bodies go out verbatim, structured ones as compact JSON.
    pub fn to_line(&self) -> String {
        match &self.body {
            serde_json::Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

/// Records produced for one group by one fetch. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLogBatch {
    pub group_id: GroupId,
    pub source: String,
    pub log_type: String,
    records: Arc<[LogRecord]>,
}

impl NormalizedLogBatch {
    pub fn new(group: &TenantGroup, log_type: &str, records: Vec<LogRecord>) -> Self {
        Self {
            group_id: group.id,
            source: group.group_name.clone(),
            log_type: log_type.to_string(),
            records: records.into(),
        }
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest_event(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.occurred_at).max()
    }
}

/// What an adapter hands back from one fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub batch: NormalizedLogBatch,
    /// `None` leaves the stored checkpoint untouched.
    pub checkpoint: Option<Checkpoint>,
}
