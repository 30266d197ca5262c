use async_trait::async_trait;
use logsync_core::Result;
use reqwest::Client;
use std::time::Duration;

/// Cheap reachability check run at the top of every cycle.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn check(&self) -> Result<()>;
}

pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    /// Any HTTP answer proves the route is up, whatever its status.
    async fn check(&self) -> Result<()> {
        self.client.head(&self.url).send().await?;
        Ok(())
    }
}
