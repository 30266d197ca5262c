use crate::config::{LogFormat, TelemetryConfig};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const CYCLES_TOTAL: &str = "logsync_cycles_total";
pub const CYCLE_DURATION_MS: &str = "logsync_cycle_duration_ms";
pub const GROUP_FAILURES_TOTAL: &str = "logsync_group_failures_total";
pub const RECORDS_FORWARDED_TOTAL: &str = "logsync_records_forwarded_total";
pub const FORWARD_FAILURES_TOTAL: &str = "logsync_forward_failures_total";
pub const PROBE_FAILURES_TOTAL: &str = "logsync_probe_failures_total";

pub fn init(config: &TelemetryConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    if config.metrics_enabled {
        let addr: SocketAddr = ([0, 0, 0, 0], config.metrics_port).into();
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        describe_metrics();

        tracing::info!(port = config.metrics_port, "Metrics endpoint listening");
    }

    Ok(())
}

fn describe_metrics() {
    describe_counter!(CYCLES_TOTAL, "Sync cycles by outcome");
    describe_histogram!(
        CYCLE_DURATION_MS,
        Unit::Milliseconds,
        "Wall time of a full sync cycle"
    );
    describe_counter!(GROUP_FAILURES_TOTAL, "Tenant group fetches that failed");
    describe_counter!(
        RECORDS_FORWARDED_TOTAL,
        "Records accepted by the ingestion endpoint"
    );
    describe_counter!(FORWARD_FAILURES_TOTAL, "Batches dropped on forward failure");
    describe_counter!(PROBE_FAILURES_TOTAL, "Failed connectivity probes");
}

pub fn shutdown() {
    tracing::info!("Shutting down telemetry");
}

#[macro_export]
macro_rules! record_metric {
    (counter, $name:expr, $value:expr, $($label:tt = $label_value:expr),*) => {
        metrics::counter!($name, $($label => $label_value),*).increment($value);
    };
    (histogram, $name:expr, $value:expr, $($label:tt = $label_value:expr),*) => {
        metrics::histogram!($name, $($label => $label_value),*).record($value);
    };
}
