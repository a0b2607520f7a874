mod bootstrap;

use anyhow::Result;
use musicshare_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use musicshare_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let mut app = bootstrap::bootstrap_with_config(config)?;
    app.sheets.authorize().await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        channels = app.config.slack.channels.len(),
        "music share bot starting"
    );

    tokio::select! {
        result = app.poll_loop.run() => {
            result?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "music share bot stopping"
            );
        }
    }

    Ok(())
}
