use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub panel: PanelConfig,
    pub forwarder: ForwarderConfig,
    pub scheduler: SchedulerConfig,
    pub vendor: VendorConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PanelConfig {
    pub host: String,
    pub internal_key: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwarderConfig {
    pub url: String,
    pub connection_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub group_timeout_secs: u64,
    pub notice_cooldown_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VendorConfig {
    pub kind: VendorKind,
    pub probe_url: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorKind {
    Aws,
    Office365,
    Sophos,
}

impl VendorKind {
    /// Module name the configuration service files this integration under.
    pub fn module_name(&self) -> &'static str {
        match self {
            VendorKind::Aws => "AWS_IAM_USER",
            VendorKind::Office365 => "O365",
            VendorKind::Sophos => "SOPHOS",
        }
    }

    pub fn default_probe_url(&self) -> &'static str {
        match self {
            VendorKind::Aws => "https://sts.amazonaws.com",
            VendorKind::Office365 => "https://manage.office.com",
            VendorKind::Sophos => "https://api.central.sophos.com",
        }
    }
}

impl std::fmt::Display for VendorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VendorKind::Aws => write!(f, "aws"),
            VendorKind::Office365 => write!(f, "office365"),
            VendorKind::Sophos => write!(f, "sophos"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        // Load default configuration
        builder = builder.add_source(config::Config::try_from(&Config::default())?);

        // Layer on config file if it exists
        if Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        // Layer on environment variables (LOGSYNC_ prefix)
        builder = builder.add_source(
            Environment::with_prefix("LOGSYNC")
                .separator("__")
                .try_parsing(true),
        );

        // Deployment-wide variable names shared with the other backend services
        builder = builder
            .set_override_option("panel.internal_key", std::env::var("INTERNAL_KEY").ok())?
            .set_override_option("panel.host", std::env::var("PANEL_SERV_NAME").ok())?;

        let settings: Config = builder.build()?.try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.panel.internal_key.trim().is_empty() || self.panel.host.trim().is_empty() {
            return Err(ConfigError::Message(
                "internal key or panel host is not set".into(),
            ));
        }

        if self.forwarder.url.trim().is_empty() {
            return Err(ConfigError::Message("forwarder.url is required".into()));
        }

        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Message(
                "scheduler.interval_secs must be greater than 0".into(),
            ));
        }

        if self.scheduler.group_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "scheduler.group_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Panel base URL; bare service names get a plain http scheme.
    pub fn panel_base_url(&self) -> String {
        let host = self.panel.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        }
    }

    pub fn probe_url(&self) -> String {
        self.vendor
            .probe_url
            .clone()
            .unwrap_or_else(|| self.vendor.kind.default_probe_url().to_string())
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn group_timeout(&self) -> Duration {
        Duration::from_secs(self.group_timeout_secs)
    }

    pub fn notice_cooldown(&self) -> Duration {
        Duration::from_secs(self.notice_cooldown_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            panel: PanelConfig {
                host: String::new(),
                internal_key: String::new(),
                request_timeout_secs: 30,
            },
            forwarder: ForwarderConfig {
                url: "http://log-auth-proxy:8080/v1/logs".to_string(),
                connection_key: None,
                timeout_secs: 30,
                max_retries: 10,
                retry_base_delay_ms: 1000,
            },
            scheduler: SchedulerConfig {
                interval_secs: 300,
                group_timeout_secs: 240,
                notice_cooldown_secs: 1800,
            },
            vendor: VendorConfig {
                kind: VendorKind::Sophos,
                probe_url: None,
                request_timeout_secs: 60,
            },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
                log_format: LogFormat::Json,
                metrics_enabled: true,
                metrics_port: 9090,
            },
        }
    }
}
