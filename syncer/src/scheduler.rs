use crate::checkpoint::CheckpointStore;
use crate::forwarder::LogForwarder;
use crate::model::{SyncWindow, TenantGroup};
use crate::panel::ConfigurationSource;
use crate::probe::ConnectivityProbe;
use crate::vendor::{FetchStrategy, VendorAdapter};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use logsync_core::config::SchedulerConfig;
use logsync_core::telemetry::{
    CYCLES_TOTAL, CYCLE_DURATION_MS, FORWARD_FAILURES_TOTAL, GROUP_FAILURES_TOTAL,
    PROBE_FAILURES_TOTAL, RECORDS_FORWARDED_TOTAL,
};
use logsync_core::throttle::{BACKEND_UNAVAILABLE, GROUP_NOT_CONFIGURED};
use logsync_core::{record_metric, Condition, Error, LogThrottle, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleSummary),
    /// Configuration backend unreachable; window kept.
    ConfigUnavailable,
    /// Configuration fetch failed otherwise; window kept.
    ConfigFailed,
    /// Integration switched off; window kept.
    Disabled,
}

impl CycleOutcome {
    pub fn advances_window(&self) -> bool {
        matches!(self, CycleOutcome::Completed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Completed(_) => "completed",
            CycleOutcome::ConfigUnavailable => "config_unavailable",
            CycleOutcome::ConfigFailed => "config_failed",
            CycleOutcome::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub synced: usize,
    pub failed: usize,
    pub not_configured: usize,
    pub records: usize,
    pub forward_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub window: SyncWindow,
    pub outcome: CycleOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupOutcome {
    Synced { records: usize },
    /// Fetched and checkpointed, but the batch was dropped.
    ForwardFailed { records: usize },
}

/// Drives poll cycles for one integration.
pub struct Scheduler {
    adapter: Arc<dyn VendorAdapter>,
    source: Arc<dyn ConfigurationSource>,
    forwarder: Arc<dyn LogForwarder>,
    checkpoints: Arc<dyn CheckpointStore>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    throttle: LogThrottle,
    interval: Duration,
    group_timeout: Duration,
    next_start: DateTime<Utc>,
}

impl Scheduler {
    pub fn new(
        adapter: Arc<dyn VendorAdapter>,
        source: Arc<dyn ConfigurationSource>,
        forwarder: Arc<dyn LogForwarder>,
        checkpoints: Arc<dyn CheckpointStore>,
        settings: &SchedulerConfig,
    ) -> Self {
        let interval = settings.interval();
        let lookback = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero());

        Self {
            adapter,
            source,
            forwarder,
            checkpoints,
            probe: None,
            throttle: LogThrottle::new(settings.notice_cooldown()),
            interval,
            group_timeout: settings.group_timeout(),
            next_start: Utc::now() - lookback,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Overrides where the first window starts.
    #[cfg(test)]
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.next_start = start;
        self
    }

    #[cfg(test)]
    pub fn next_start(&self) -> DateTime<Utc> {
        self.next_start
    }

    /// Ticks until Ctrl-C. Ticks missed while a cycle overruns are dropped,
    /// never replayed.
    #[instrument(skip(self), fields(vendor = %self.adapter.vendor_id()))]
    pub async fn run(mut self) -> Result<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            start = %self.next_start,
            "Starting sync scheduler"
        );

        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    if let Err(e) = signal {
                        error!(error = %e, "Failed to listen for shutdown signal");
                    }
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }

                _ = ticker.tick() => {
                    let report = self.run_cycle(Utc::now()).await;
                    debug!(
                        window = %report.window,
                        outcome = ?report.outcome,
                        advanced = report.outcome.advances_window(),
                        "Cycle finished"
                    );
                }
            }
        }

        Ok(())
    }

    /// Runs one cycle covering `[next_start, now)`.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        let started = Instant::now();
        let window = SyncWindow::new(self.next_start, now);
        self.throttle.prune();

        if let Some(probe) = &self.probe {
            if let Err(e) = probe.check().await {
                error!(error = %e, "External connection failure detected");
                record_metric!(counter, PROBE_FAILURES_TOTAL, 1, "vendor" = self.adapter.vendor_id().to_string());
            }
        }

        info!(start = %window.start, end = %window.end, "Syncing logs");

        let outcome = match self.source.module_config().await {
            Err(e) if e.is_backend_unavailable() => {
                let condition = Condition::new(BACKEND_UNAVAILABLE, self.source.module_name());
                if self.throttle.allow(&condition) {
                    info!(
                        module = self.source.module_name(),
                        error = %e,
                        "Configuration backend is not available"
                    );
                }
                CycleOutcome::ConfigUnavailable
            }
            Err(e) => {
                error!(module = self.source.module_name(), error = %e, "Failed to get module configuration");
                CycleOutcome::ConfigFailed
            }
            Ok(config) if !config.module_active => {
                debug!(module = self.source.module_name(), "Integration is disabled");
                CycleOutcome::Disabled
            }
            Ok(config) => {
                CycleOutcome::Completed(self.dispatch(window, config.configuration_groups).await)
            }
        };

        if let CycleOutcome::Completed(summary) = &outcome {
            self.next_start = window.next_start();
            info!(
                start = %window.start,
                end = %window.end,
                synced = summary.synced,
                failed = summary.failed,
                not_configured = summary.not_configured,
                records = summary.records,
                forward_failures = summary.forward_failures,
                "Sync completed"
            );
        }

        record_metric!(counter, CYCLES_TOTAL, 1, "outcome" = outcome.label());
        record_metric!(
            histogram,
            CYCLE_DURATION_MS,
            started.elapsed().as_millis() as f64,
            "vendor" = self.adapter.vendor_id().to_string()
        );

        CycleReport { window, outcome }
    }

    /// One task per configured group, joined before returning.
    async fn dispatch(&self, window: SyncWindow, groups: Vec<TenantGroup>) -> CycleSummary {
        let mut summary = CycleSummary::default();
        let mut seen = HashSet::new();
        let mut tasks = Vec::new();
        let required = self.adapter.required_keys();

        for group in groups {
            if !seen.insert(group.id) {
                warn!(group = %group.group_name, id = %group.id, "Duplicate group id in configuration, skipping");
                continue;
            }

            if let Some(key) = group.missing_entry(required) {
                let condition = Condition::new(GROUP_NOT_CONFIGURED, group.group_name.as_str());
                if self.throttle.allow(&condition) {
                    info!(group = %group.group_name, entry = key, "Integration not configured yet for group");
                }
                summary.not_configured += 1;
                continue;
            }

            let task = GroupTask {
                adapter: Arc::clone(&self.adapter),
                checkpoints: Arc::clone(&self.checkpoints),
                forwarder: Arc::clone(&self.forwarder),
                timeout: self.group_timeout,
            };
            let name = group.group_name.clone();
            let id = group.id;
            tasks.push((id, name, tokio::spawn(task.run(window, group))));
        }

        let (labels, handles): (Vec<_>, Vec<_>) = tasks
            .into_iter()
            .map(|(id, name, handle)| ((id, name), handle))
            .unzip();

        for ((id, name), joined) in labels.into_iter().zip(join_all(handles).await) {
            let result = joined
                .map_err(|e| Error::Internal(format!("group task panicked: {}", e)))
                .and_then(|r| r);

            match result {
                Ok(GroupOutcome::Synced { records }) => {
                    summary.synced += 1;
                    summary.records += records;
                }
                Ok(GroupOutcome::ForwardFailed { records }) => {
                    summary.synced += 1;
                    summary.records += records;
                    summary.forward_failures += 1;
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        group = %name,
                        id = %id,
                        start = %window.start,
                        end = %window.end,
                        error = %e,
                        "Failed to sync group, its events for this window may be lost"
                    );
                    record_metric!(counter, GROUP_FAILURES_TOTAL, 1, "vendor" = self.adapter.vendor_id().to_string());
                }
            }
        }

        summary
    }
}

/// Everything one group's task needs, detached from the scheduler.
struct GroupTask {
    adapter: Arc<dyn VendorAdapter>,
    checkpoints: Arc<dyn CheckpointStore>,
    forwarder: Arc<dyn LogForwarder>,
    timeout: Duration,
}

impl GroupTask {
    /// Fetch, then checkpoint, then forward.
    async fn run(self, window: SyncWindow, group: TenantGroup) -> Result<GroupOutcome> {
        let checkpoint = match self.adapter.strategy() {
            FetchStrategy::CursorContinued => self.checkpoints.get(group.id),
            FetchStrategy::WindowOnly => None,
        };

        let fetched = tokio::time::timeout(
            self.timeout,
            self.adapter.fetch(&window, checkpoint.as_ref(), &group),
        )
        .await
        .map_err(|_| Error::Timeout(self.timeout.as_secs()))??;

        if let Some(next) = fetched.checkpoint {
            self.checkpoints.set(group.id, next);
        }

        let batch = fetched.batch;
        let records = batch.len();
        if batch.is_empty() {
            debug!(group = %group.group_name, "No new events");
            return Ok(GroupOutcome::Synced { records });
        }

        let vendor = self.adapter.vendor_id().to_string();
        match self.forwarder.send(&batch).await {
            Ok(()) => {
                debug!(
                    group = %group.group_name,
                    records,
                    latest = ?batch.latest_event(),
                    "Forwarded batch"
                );
                record_metric!(counter, RECORDS_FORWARDED_TOTAL, records as u64, "vendor" = vendor);
                Ok(GroupOutcome::Synced { records })
            }
            Err(e) => {
                error!(group = %group.group_name, records, error = %e, "Failed to forward batch, dropping it");
                record_metric!(counter, FORWARD_FAILURES_TOTAL, 1, "vendor" = vendor);
                Ok(GroupOutcome::ForwardFailed { records })
            }
        }
    }
}
