use std::sync::Arc;

use pinbot_core::config::{AppConfig, ConfigError, LoadOptions};
use pinbot_discord::{
    events::{default_dispatcher, EventDispatcher},
    gateway::{GatewayRunner, GatewayStatus, GatewayTransport, ReconnectPolicy},
    platform::PlatformClient,
    serenity_adapter::{SerenityGatewayTransport, SerenityPlatform},
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub dispatcher: Arc<EventDispatcher>,
    pub runner: Arc<GatewayRunner>,
    pub gateway_status: GatewayStatus,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    Ok(bootstrap_with_config(config))
}

pub fn bootstrap_with_config(config: AppConfig) -> Application {
    let platform = Arc::new(SerenityPlatform::new(&config.discord.token));
    let transport = Arc::new(SerenityGatewayTransport::new(config.discord.token.clone()));
    assemble(config, platform, transport)
}

pub fn assemble(
    config: AppConfig,
    platform: Arc<dyn PlatformClient>,
    transport: Arc<dyn GatewayTransport>,
) -> Application {
    let dispatcher = Arc::new(default_dispatcher(platform));
    let runner = Arc::new(GatewayRunner::new(
        transport,
        Arc::clone(&dispatcher),
        ReconnectPolicy::from(&config.gateway),
    ));
    let gateway_status = runner.status();

    info!(
        event_name = "system.bootstrap.assembled",
        correlation_id = "bootstrap",
        handlers = dispatcher.handler_count(),
        max_retries = config.gateway.max_retries,
        "gateway runner assembled"
    );

    Application { config, dispatcher, runner, gateway_status }
}
