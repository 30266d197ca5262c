mod app;
mod checkpoint;
mod forwarder;
mod model;
mod panel;
mod probe;
mod scheduler;
mod vendor;

#[cfg(test)]
mod test_utils;

use logsync_core::{telemetry, Config};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            // Telemetry is configured from this file, so stderr is all there is.
            eprintln!("Fatal error: failed to load config: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!(error = %e, "Fatal error");
        process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    telemetry::init(&config.telemetry)?;

    info!(vendor = %config.vendor.kind, "Starting log sync");

    let app = app::App::new(config).await?;
    app.run().await?;

    telemetry::shutdown();
    Ok(())
}
