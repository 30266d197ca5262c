//! In-memory collaborators for driving the scheduler in tests.

use crate::forwarder::LogForwarder;
use crate::model::{
    Checkpoint, ConfigEntry, FetchOutcome, GroupId, LogRecord, ModuleConfig, NormalizedLogBatch,
    SyncWindow, TenantGroup,
};
use crate::panel::ConfigurationSource;
use crate::probe::ConnectivityProbe;
use crate::vendor::{FetchStrategy, VendorAdapter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logsync_core::config::SchedulerConfig;
use logsync_core::{Error, Result};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const TOKEN_KEY: &str = "api_token";

pub fn settings() -> SchedulerConfig {
    SchedulerConfig {
        interval_secs: 300,
        group_timeout_secs: 120,
        notice_cooldown_secs: 3600,
    }
}

pub fn group(id: i64, name: &str) -> TenantGroup {
    TenantGroup {
        id: GroupId(id),
        group_name: name.to_string(),
        configurations: vec![ConfigEntry {
            key: TOKEN_KEY.to_string(),
            value: format!("token-{}", id),
        }],
    }
}

pub fn unconfigured_group(id: i64, name: &str) -> TenantGroup {
    let mut g = group(id, name);
    g.configurations[0].value = String::new();
    g
}

pub fn active(groups: Vec<TenantGroup>) -> ModuleConfig {
    ModuleConfig {
        module_active: true,
        configuration_groups: groups,
    }
}

pub fn record_ids(batch: &NormalizedLogBatch) -> Vec<String> {
    batch
        .records()
        .iter()
        .map(|r| r.body["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

pub enum Scripted {
    Config(ModuleConfig),
    Unavailable,
    Failed,
}

/// Plays back scripted answers, then repeats the last configuration.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<ModuleConfig>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Mutex::new(ModuleConfig::default()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(config: ModuleConfig) -> Self {
        Self::new(vec![Scripted::Config(config)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigurationSource for ScriptedSource {
    async fn module_config(&self) -> Result<ModuleConfig> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Config(config)) => {
                *self.fallback.lock().unwrap() = config.clone();
                Ok(config)
            }
            Some(Scripted::Unavailable) => Err(Error::BackendUnavailable("html page".into())),
            Some(Scripted::Failed) => Err(Error::Internal("scripted failure".into())),
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }

    fn module_name(&self) -> &str {
        "FIXTURE"
    }
}

#[derive(Debug, Clone)]
pub struct FetchCall {
    pub group: GroupId,
    pub window: SyncWindow,
    pub checkpoint: Option<Checkpoint>,
    pub started: tokio::time::Instant,
    pub finished: tokio::time::Instant,
}

/// Vendor stand-in. In window mode it serves `events` that fall inside the
/// window; in cursor mode it serves `pages` keyed by incoming checkpoint.
pub struct FixtureAdapter {
    strategy: FetchStrategy,
    events: Vec<(DateTime<Utc>, String)>,
    pages: HashMap<Option<String>, (Vec<String>, String)>,
    failing: HashSet<GroupId>,
    delays: HashMap<GroupId, Duration>,
    calls: Mutex<Vec<FetchCall>>,
}

impl FixtureAdapter {
    pub fn window_only(events: Vec<(DateTime<Utc>, &str)>) -> Self {
        Self {
            strategy: FetchStrategy::WindowOnly,
            events: events.into_iter().map(|(ts, id)| (ts, id.to_string())).collect(),
            pages: HashMap::new(),
            failing: HashSet::new(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `pages`: (incoming checkpoint, records, outgoing checkpoint).
    pub fn cursor(pages: Vec<(Option<&str>, Vec<&str>, &str)>) -> Self {
        let mut adapter = Self::window_only(Vec::new());
        adapter.strategy = FetchStrategy::CursorContinued;
        adapter.pages = pages
            .into_iter()
            .map(|(from, ids, next)| {
                (
                    from.map(str::to_string),
                    (ids.into_iter().map(str::to_string).collect(), next.to_string()),
                )
            })
            .collect();
        adapter
    }

    pub fn failing_for(mut self, group: i64) -> Self {
        self.failing.insert(GroupId(group));
        self
    }

    pub fn slow_for(mut self, group: i64, delay: Duration) -> Self {
        self.delays.insert(GroupId(group), delay);
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VendorAdapter for FixtureAdapter {
    async fn fetch(
        &self,
        window: &SyncWindow,
        checkpoint: Option<&Checkpoint>,
        group: &TenantGroup,
    ) -> Result<FetchOutcome> {
        let started = tokio::time::Instant::now();
        if let Some(delay) = self.delays.get(&group.id) {
            tokio::time::sleep(*delay).await;
        }
        self.calls.lock().unwrap().push(FetchCall {
            group: group.id,
            window: *window,
            checkpoint: checkpoint.cloned(),
            started,
            finished: tokio::time::Instant::now(),
        });

        if self.failing.contains(&group.id) {
            return Err(Error::auth("fixture", "credentials rejected"));
        }

        let (records, next) = match self.strategy {
            FetchStrategy::WindowOnly => {
                let records = self
                    .events
                    .iter()
                    .filter(|(ts, _)| window.contains(*ts))
                    .map(|(ts, id)| LogRecord::new(*ts, json!({ "id": id })))
                    .collect();
                (records, None)
            }
            FetchStrategy::CursorContinued => {
                let key = checkpoint.map(|c| c.as_str().to_string());
                let (ids, next) = self
                    .pages
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| (Vec::new(), key.clone().unwrap_or_default()));
                let records = ids
                    .into_iter()
                    .map(|id| LogRecord::new(window.start, json!({ "id": id })))
                    .collect();
                (records, Some(Checkpoint::new(next)))
            }
        };

        Ok(FetchOutcome {
            batch: NormalizedLogBatch::new(group, "fixture", records),
            checkpoint: next,
        })
    }

    fn vendor_id(&self) -> &str {
        "fixture"
    }

    fn log_type(&self) -> &str {
        "fixture"
    }

    fn strategy(&self) -> FetchStrategy {
        self.strategy
    }

    fn required_keys(&self) -> &[&'static str] {
        &[TOKEN_KEY]
    }
}

#[derive(Default)]
pub struct RecordingForwarder {
    sent: Mutex<Vec<NormalizedLogBatch>>,
    fail: bool,
}

impl RecordingForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<NormalizedLogBatch> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogForwarder for RecordingForwarder {
    async fn send(&self, batch: &NormalizedLogBatch) -> Result<()> {
        if self.fail {
            return Err(Error::Forward("ingestion endpoint answered 503".into()));
        }
        self.sent.lock().unwrap().push(batch.clone());
        Ok(())
    }
}

pub struct DownProbe {
    pub checks: AtomicUsize,
}

#[async_trait]
impl ConnectivityProbe for DownProbe {
    async fn check(&self) -> Result<()> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Err(Error::Timeout(5))
    }
}

/// One HTTP/1.1 request as it arrived on the wire.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Binds a local listener that answers exactly one request with `status`
/// and `reply`, handing back what the client sent.
pub async fn respond_once(
    status: u16,
    reply: &'static str,
) -> (String, tokio::task::JoinHandle<CapturedRequest>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let head_len = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the request head");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_len]).to_string();
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next().unwrap_or_default().split(' ');
        let method = request_line.next().unwrap_or_default().to_string();
        let target = request_line.next().unwrap_or_default().to_string();
        let headers: HashMap<String, String> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();

        let content_length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < head_len + content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the request body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&buf[head_len..head_len + content_length]).to_string();

        let response = format!(
            "HTTP/1.1 {} Fixture\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            reply.len(),
            reply
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();

        CapturedRequest {
            method,
            target,
            headers,
            body,
        }
    });

    (base_url, handle)
}
