use crate::checkpoint::MemoryCheckpointStore;
use crate::forwarder::HttpForwarder;
use crate::panel::PanelClient;
use crate::probe::HttpProbe;
use crate::scheduler::Scheduler;
use crate::vendor::build_adapter;
use logsync_core::backoff::retry_with_backoff;
use logsync_core::{Config, Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

pub struct App {
    scheduler: Scheduler,
}

impl App {
    #[instrument(skip(config), fields(vendor = %config.vendor.kind))]
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing application");

        let panel = Arc::new(PanelClient::new(
            config.panel_base_url(),
            config.panel.internal_key.clone(),
            config.vendor.kind.module_name(),
            Duration::from_secs(config.panel.request_timeout_secs),
        )?);

        let connection_key = match config.forwarder.connection_key.clone() {
            Some(key) if !key.trim().is_empty() => key,
            _ => {
                info!("Requesting connection key from panel");
                retry_with_backoff(
                    || panel.connection_key(),
                    Error::is_retryable,
                    config.forwarder.max_retries,
                    config.forwarder.retry_base_delay_ms,
                    "connection_key",
                )
                .await?
            }
        };

        let forwarder = HttpForwarder::new(
            config.forwarder.url.clone(),
            connection_key,
            Duration::from_secs(config.forwarder.timeout_secs),
        )?;

        let probe = HttpProbe::new(
            config.probe_url(),
            Duration::from_secs(config.vendor.request_timeout_secs.min(30)),
        )?;

        let adapter = build_adapter(&config.vendor)?;
        info!(
            vendor = adapter.vendor_id(),
            log_type = adapter.log_type(),
            strategy = ?adapter.strategy(),
            module = config.vendor.kind.module_name(),
            "Vendor adapter ready"
        );

        let scheduler = Scheduler::new(
            adapter,
            panel,
            Arc::new(forwarder),
            Arc::new(MemoryCheckpointStore::new()),
            &config.scheduler,
        )
        .with_probe(Arc::new(probe));

        Ok(Self { scheduler })
    }

    pub async fn run(self) -> Result<()> {
        self.scheduler.run().await
    }
}
