use crate::model::NormalizedLogBatch;
use async_trait::async_trait;
use logsync_core::{Error, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

pub const LOG_SEPARATOR: &str = "<utm-log-separator>";
pub const CONNECTION_KEY_HEADER: &str = "Utm-Connection-Key";
pub const LOG_TYPE_HEADER: &str = "Utm-Log-Type";
pub const LOG_SOURCE_HEADER: &str = "Utm-Log-Source";

/// Relays batches to the central ingestion pipeline.
///
/// One attempt per batch. Callers log and drop on error.
#[async_trait]
pub trait LogForwarder: Send + Sync {
    async fn send(&self, batch: &NormalizedLogBatch) -> Result<()>;
}

pub struct HttpForwarder {
    client: Client,
    url: String,
    connection_key: String,
}

impl HttpForwarder {
    pub fn new(url: String, connection_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url,
            connection_key,
        })
    }
}

/// Joins record lines in batch order with the gateway's separator.
pub fn encode_batch(batch: &NormalizedLogBatch) -> String {
    batch
        .records()
        .iter()
        .map(|record| record.to_line())
        .collect::<Vec<_>>()
        .join(LOG_SEPARATOR)
}

#[async_trait]
impl LogForwarder for HttpForwarder {
    #[instrument(skip(self, batch), fields(source = %batch.source, log_type = %batch.log_type, records = batch.len()))]
    async fn send(&self, batch: &NormalizedLogBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(&self.url)
            .header(CONNECTION_KEY_HEADER, &self.connection_key)
            .header(LOG_TYPE_HEADER, &batch.log_type)
            .header(LOG_SOURCE_HEADER, &batch.source)
            .body(encode_batch(batch))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Forward(format!(
                "ingestion endpoint answered {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        debug!("Batch accepted");
        Ok(())
    }
}
