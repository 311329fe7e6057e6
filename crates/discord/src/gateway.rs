use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use pinbot_core::config::{AppConfig, GatewayConfig};
use thiserror::Error;
use tokio::{sync::watch, task::JoinSet};
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, GatewayEnvelope, HandlerResult};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gateway failed to connect: {0}")]
    Connect(String),
    #[error("gateway read failed: {0}")]
    Receive(String),
    #[error("gateway disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&AppConfig::default().gateway)
    }
}

impl From<&GatewayConfig> for ReconnectPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the session closed cleanly.
    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
        }
    }
}

/// Shared view of the gateway connection, read by the health endpoint.
#[derive(Clone, Debug, Default)]
pub struct GatewayStatus {
    state: Arc<AtomicU8>,
}

impl GatewayStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn set(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
    status: GatewayStatus,
    shutdown_tx: watch::Sender<bool>,
}

enum PumpExit {
    Closed,
    Shutdown,
}

struct SessionFailure {
    error: TransportError,
    connected: bool,
}

impl SessionFailure {
    fn before_connect(error: TransportError) -> Self {
        Self { error, connected: false }
    }

    fn after_connect(error: TransportError) -> Self {
        Self { error, connected: true }
    }
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: Arc<EventDispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            transport,
            dispatcher,
            reconnect_policy,
            status: GatewayStatus::new(),
            shutdown_tx,
        }
    }

    pub fn status(&self) -> GatewayStatus {
        self.status.clone()
    }

    /// Asks a running [`GatewayRunner::start`] to disconnect and return.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Runs the gateway session, reconnecting with backoff. Returns `Ok` when the
    /// session closes, when shutdown is requested, or once retries run out.
    ///
    /// The retry budget counts consecutive failures only: a session that reached
    /// `Connected` resets it, so `max_retries` bounds each outage separately.
    pub async fn start(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut attempt: u32 = 0;

        while !*shutdown_rx.borrow() {
            match self.connect_and_pump(attempt, &mut shutdown_rx).await {
                Ok(PumpExit::Closed) | Ok(PumpExit::Shutdown) => break,
                Err(failure) => {
                    self.status.set(ConnectionState::Disconnected);
                    if failure.connected {
                        attempt = 0;
                    }
                    warn!(
                        event_name = "gateway.transport.failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        was_connected = failure.connected,
                        error = %failure.error,
                        "gateway transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            event_name = "gateway.transport.retries_exhausted",
                            max_retries = self.reconnect_policy.max_retries,
                            "gateway retries exhausted; continuing process without crash"
                        );
                        break;
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    attempt += 1;
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = shutdown_rx.changed() => {}
                        }
                    }
                }
            }
        }

        self.status.set(ConnectionState::Disconnected);
        Ok(())
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<PumpExit, SessionFailure> {
        info!(event_name = "gateway.transport.connecting", attempt, "opening gateway connection");
        self.status.set(ConnectionState::Connecting);
        self.transport.connect().await.map_err(SessionFailure::before_connect)?;
        self.status.set(ConnectionState::Connected);
        info!(event_name = "gateway.transport.connected", attempt, "gateway connected");

        let mut in_flight = JoinSet::new();
        let exit = self.pump(attempt, shutdown_rx, &mut in_flight).await;

        // Dropping the set would abort handlers mid-request.
        while let Some(joined) = in_flight.join_next().await {
            log_join_failure(joined);
        }

        let exit = exit.map_err(SessionFailure::after_connect)?;
        self.transport.disconnect().await.map_err(SessionFailure::after_connect)?;
        Ok(exit)
    }

    async fn pump(
        &self,
        attempt: u32,
        shutdown_rx: &mut watch::Receiver<bool>,
        in_flight: &mut JoinSet<()>,
    ) -> Result<PumpExit, TransportError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!(event_name = "gateway.transport.shutdown", attempt, "gateway shutdown requested");
                    return Ok(PumpExit::Shutdown);
                }
                next = self.transport.next_envelope() => next?,
            };

            let Some(envelope) = next else {
                info!(event_name = "gateway.transport.closed", attempt, "gateway stream closed");
                return Ok(PumpExit::Closed);
            };

            info!(
                event_name = "ingress.gateway.event_received",
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.event_id,
                "received gateway event"
            );

            while let Some(joined) = in_flight.try_join_next() {
                log_join_failure(joined);
            }

            let dispatcher = Arc::clone(&self.dispatcher);
            in_flight.spawn(async move {
                dispatch_envelope(&dispatcher, envelope).await;
            });
        }
    }
}

async fn dispatch_envelope(dispatcher: &EventDispatcher, envelope: GatewayEnvelope) {
    let context = EventContext { correlation_id: envelope.event_id.clone() };
    match dispatcher.dispatch(&envelope, &context).await {
        Ok(HandlerResult::Ignored) => {}
        Ok(result) => debug!(
            event_name = "ingress.gateway.event_handled",
            correlation_id = %context.correlation_id,
            result = ?result,
            "gateway event handled"
        ),
        Err(error) => warn!(
            event_name = "ingress.gateway.dispatch_failed",
            correlation_id = %context.correlation_id,
            error = %error,
            "event dispatch failed; continuing gateway loop"
        ),
    }
}

fn log_join_failure(joined: Result<(), tokio::task::JoinError>) {
    if let Err(error) = joined {
        warn!(
            event_name = "ingress.gateway.handler_panicked",
            error = %error,
            "event handler task did not complete"
        );
    }
}
