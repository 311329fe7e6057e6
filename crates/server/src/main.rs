mod bootstrap;
mod health;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use pinbot_core::config::{AppConfig, LoadOptions};
use tokio::task::JoinError;
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use pinbot_core::config::LogFormat::*;
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

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config);

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.gateway_status.clone(),
    )
    .await?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        handlers = app.dispatcher.handler_count(),
        "pinbot-server started"
    );

    let runner = Arc::clone(&app.runner);
    let mut gateway = tokio::spawn(async move { runner.start().await });

    let stopped_early = tokio::select! {
        joined = &mut gateway => {
            log_runner_exit(joined);
            true
        }
        signal = wait_for_shutdown() => {
            signal?;
            false
        }
    };

    if stopped_early {
        // Health keeps reporting degraded until the operator stops the process.
        wait_for_shutdown().await?;
    } else {
        info!(event_name = "system.server.stopping", correlation_id = "shutdown", "pinbot-server stopping");
        app.runner.shutdown();

        let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
        match tokio::time::timeout(grace, &mut gateway).await {
            Ok(joined) => log_runner_exit(joined),
            Err(_) => {
                warn!(
                    event_name = "system.server.shutdown_timeout",
                    correlation_id = "shutdown",
                    grace_secs = grace.as_secs(),
                    "gateway runner did not stop in time; aborting"
                );
                gateway.abort();
            }
        }
    }

    info!(event_name = "system.server.stopped", correlation_id = "shutdown", "pinbot-server stopped");
    Ok(())
}

fn log_runner_exit(joined: Result<Result<()>, JoinError>) {
    match joined {
        Ok(Ok(())) => {
            info!(event_name = "system.gateway.stopped", correlation_id = "shutdown", "gateway runner stopped")
        }
        Ok(Err(error)) => warn!(
            event_name = "system.gateway.failed",
            correlation_id = "shutdown",
            error = %error,
            "gateway runner returned an error"
        ),
        Err(error) => warn!(
            event_name = "system.gateway.panicked",
            correlation_id = "shutdown",
            error = %error,
            "gateway runner task failed"
        ),
    }
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
