use crate::model::ModuleConfig;
use async_trait::async_trait;
use logsync_core::{Error, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

pub const INTERNAL_KEY_HEADER: &str = "Utm-Internal-Key";

/// Where the tenant group list for this integration comes from.
#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    async fn module_config(&self) -> Result<ModuleConfig>;

    fn module_name(&self) -> &str;
}

/// Client for the panel's configuration service.
pub struct PanelClient {
    client: Client,
    base_url: String,
    internal_key: String,
    module: String,
}

impl PanelClient {
    pub fn new(
        base_url: String,
        internal_key: String,
        module: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            internal_key,
            module: module.to_string(),
        })
    }

    /// Shared key the ingestion gateway expects on forwarded batches.
    #[instrument(skip(self))]
    pub async fn connection_key(&self) -> Result<String> {
        let url = format!("{}/api/federation-service/token", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(INTERNAL_KEY_HEADER, &self.internal_key)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let key = body.trim().trim_matches('"').to_string();
        if key.is_empty() {
            return Err(Error::BackendUnavailable(
                "panel returned an empty connection key".into(),
            ));
        }

        Ok(key)
    }
}

#[async_trait]
impl ConfigurationSource for PanelClient {
    #[instrument(skip(self), fields(module = %self.module))]
    async fn module_config(&self) -> Result<ModuleConfig> {
        let url = format!(
            "{}/api/utm-modules/module-details-decrypted",
            self.base_url
        );
        let response = self
            .client
            .get(&url)
            .query(&[("nameShort", self.module.as_str())])
            .header(INTERNAL_KEY_HEADER, &self.internal_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Configuration response");

        parse_module_config(status, &body)
    }

    fn module_name(&self) -> &str {
        &self.module
    }
}

fn is_placeholder(body: &str) -> bool {
    body.is_empty() || body.starts_with('<')
}

/// Classifies a configuration response.
///
/// Rejected credentials are an error whatever the body. Otherwise empty or
/// markup bodies come from a proxy standing in for a backend that is down.
/// Any other non-success answer, or a body that fails to decode, is a real
/// error.
pub fn parse_module_config(status: StatusCode, body: &str) -> Result<ModuleConfig> {
    let trimmed = body.trim_start();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::auth(
            "panel",
            format!("configuration service answered {}, check the internal key", status),
        ));
    }

    if is_placeholder(trimmed) {
        return Err(Error::BackendUnavailable(if trimmed.is_empty() {
            format!("empty response with status {}", status)
        } else {
            format!("received an HTML page with status {}", status)
        }));
    }

    if !status.is_success() {
        return Err(Error::Internal(format!(
            "configuration service answered {}: {}",
            status,
            trimmed.chars().take(200).collect::<String>()
        )));
    }

    Ok(serde_json::from_str(trimmed)?)
}
