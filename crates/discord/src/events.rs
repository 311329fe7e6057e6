use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use pinbot_core::policy::{
    Decision, DeterministicPinPolicy, PinPolicy, ReactionChangeEvent, ReactionChangeKind,
    ReactionEmoji,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    executor::{ExecutionError, ExecutionOutcome, PolicyExecutor},
    platform::{resolve_message, ChannelId, GuildId, MessageId, PlatformClient, UserId},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayEnvelope {
    pub event_id: String,
    pub event: GatewayEvent,
}

impl GatewayEnvelope {
    pub fn new(event: GatewayEvent) -> Self {
        Self { event_id: uuid::Uuid::new_v4().to_string(), event }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    Ready(ReadyEvent),
    ReactionAdded(RawReactionEvent),
    ReactionRemoved(RawReactionEvent),
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn event_type(&self) -> GatewayEventType {
        match self {
            Self::Ready(_) => GatewayEventType::Ready,
            Self::ReactionAdded(_) => GatewayEventType::ReactionAdded,
            Self::ReactionRemoved(_) => GatewayEventType::ReactionRemoved,
            Self::Unsupported { .. } => GatewayEventType::Unsupported,
        }
    }

    pub fn reaction(&self) -> Option<&RawReactionEvent> {
        match self {
            Self::ReactionAdded(event) | Self::ReactionRemoved(event) => Some(event),
            Self::Ready(_) | Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    Ready,
    ReactionAdded,
    ReactionRemoved,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadyEvent {
    pub user_name: String,
    pub guild_count: usize,
}

/// Raw identifiers of a reaction change as delivered by the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawReactionEvent {
    pub emoji: String,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub user_id: Option<UserId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Applied { decision: Decision, outcome: ExecutionOutcome },
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> GatewayEventType;
    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<GatewayEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher(platform: Arc<dyn PlatformClient>) -> EventDispatcher {
    let service = Arc::new(PinPolicyService::new(platform));
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(ReadyHandler);
    dispatcher.register(ReactionAddedHandler::new(Arc::clone(&service)));
    dispatcher.register(ReactionRemovedHandler::new(service));
    dispatcher
}

/// Resolves the reacted message, evaluates the pin policy against its live
/// state and executes the resulting decision.
pub struct PinPolicyService {
    platform: Arc<dyn PlatformClient>,
    policy: Arc<dyn PinPolicy>,
    executor: PolicyExecutor,
}

impl PinPolicyService {
    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self::with_policy(platform, Arc::new(DeterministicPinPolicy))
    }

    pub fn with_policy(platform: Arc<dyn PlatformClient>, policy: Arc<dyn PinPolicy>) -> Self {
        Self { platform, policy, executor: PolicyExecutor::new() }
    }

    pub async fn apply(
        &self,
        kind: ReactionChangeKind,
        event: &RawReactionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let correlation_id = ctx.correlation_id.as_str();
        let emoji = ReactionEmoji::from_literal(&event.emoji);

        info!(
            event_name = "policy.reaction.received",
            correlation_id,
            change = ?kind,
            emoji = %event.emoji,
            guild_id = ?event.guild_id.map(|id| id.0),
            channel_id = %event.channel_id,
            message_id = %event.message_id,
            user_id = ?event.user_id.map(|id| id.0),
            "reaction changed on message"
        );

        if !is_evaluated(kind, emoji) {
            debug!(
                event_name = "policy.reaction.ignored",
                correlation_id,
                change = ?kind,
                emoji = %event.emoji,
                "emoji does not drive the pin policy"
            );
            return Ok(HandlerResult::Ignored);
        }

        let target = match resolve_message(
            self.platform.as_ref(),
            event.guild_id,
            event.channel_id,
            event.message_id,
        )
        .await
        {
            Ok(target) => target,
            Err(error) => {
                warn!(
                    event_name = "policy.reaction.resolution_failed",
                    correlation_id,
                    channel_id = %event.channel_id,
                    message_id = %event.message_id,
                    error = %error,
                    "could not resolve reacted message; skipping event"
                );
                return Ok(HandlerResult::Ignored);
            }
        };

        let state = target.state();
        let decision = self.policy.evaluate(&ReactionChangeEvent { emoji, kind }, &state);

        info!(
            event_name = "policy.reaction.evaluated",
            correlation_id,
            channel_id = %event.channel_id,
            message_id = %event.message_id,
            container_kind = target.container.kind().label(),
            pinned = state.pinned,
            pushpins = state.tally.pushpins(),
            thumbs_down = state.tally.thumbs_down(),
            decision = decision.label(),
            "pin policy evaluated"
        );

        if decision.is_noop() {
            return Ok(HandlerResult::Processed);
        }

        let outcome = self.executor.execute(decision, &target, correlation_id).await?;
        Ok(HandlerResult::Applied { decision, outcome })
    }
}

// Only pushpin removal matters on the removed path.
fn is_evaluated(kind: ReactionChangeKind, emoji: ReactionEmoji) -> bool {
    match kind {
        ReactionChangeKind::Added => emoji.is_recognized(),
        ReactionChangeKind::Removed => emoji == ReactionEmoji::Pushpin,
    }
}

pub struct ReactionAddedHandler {
    service: Arc<PinPolicyService>,
}

impl ReactionAddedHandler {
    pub fn new(service: Arc<PinPolicyService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for ReactionAddedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::ReactionAdded
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ReactionAdded(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.apply(ReactionChangeKind::Added, event, ctx).await
    }
}

pub struct ReactionRemovedHandler {
    service: Arc<PinPolicyService>,
}

impl ReactionRemovedHandler {
    pub fn new(service: Arc<PinPolicyService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for ReactionRemovedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::ReactionRemoved
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ReactionRemoved(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.apply(ReactionChangeKind::Removed, event, ctx).await
    }
}

pub struct ReadyHandler;

#[async_trait]
impl EventHandler for ReadyHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::Ready
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::Ready(ready) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        info!(
            event_name = "gateway.ready",
            correlation_id = %ctx.correlation_id,
            user_name = %ready.user_name,
            guild_count = ready.guild_count,
            "logged in as {}",
            ready.user_name
        );
        Ok(HandlerResult::Processed)
    }
}
