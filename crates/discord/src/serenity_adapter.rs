//! Discord implementation of the platform and gateway seams, backed by serenity.

use std::sync::Arc;

use async_trait::async_trait;
use pinbot_core::policy::ReactionTally;
use secrecy::{ExposeSecret, SecretString};
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    client::{Client, Context, EventHandler as SerenityEventHandler},
    gateway::ShardManager,
    http::{Http, HttpError},
    model::{
        channel::{Channel, ChannelType, Reaction},
        gateway::{GatewayIntents, Ready},
        id::{ChannelId as SerenityChannelId, MessageId as SerenityMessageId},
    },
};
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        Mutex,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    events::{GatewayEnvelope, GatewayEvent, RawReactionEvent, ReadyEvent},
    gateway::{GatewayTransport, TransportError},
    notifications::Notification,
    platform::{
        jump_link, ChannelId, ContainerKind, GuildId, MessageContainer, MessageHandle, MessageId,
        PlatformClient, PlatformError, ResolutionError, UserId,
    },
};

pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGE_REACTIONS
}

pub struct SerenityPlatform {
    http: Arc<Http>,
}

impl SerenityPlatform {
    pub fn new(token: &SecretString) -> Self {
        Self::from_http(Arc::new(Http::new(token.expose_secret())))
    }

    pub fn from_http(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PlatformClient for SerenityPlatform {
    async fn resolve_container(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn MessageContainer>, ResolutionError> {
        if channel_id.0 == 0 {
            return Err(ResolutionError::ChannelNotFound { channel_id });
        }

        let channel = match SerenityChannelId::new(channel_id.0).to_channel(&*self.http).await {
            Ok(channel) => channel,
            Err(error) => {
                return Err(match classify(&error) {
                    PlatformError::NotFound(_) => ResolutionError::ChannelNotFound { channel_id },
                    other => ResolutionError::Platform(other),
                });
            }
        };

        let Channel::Guild(channel) = channel else {
            return Err(ResolutionError::WrongChannelType {
                channel_id,
                kind: "private".to_owned(),
            });
        };

        let Some(kind) = container_kind(channel.kind) else {
            return Err(ResolutionError::WrongChannelType {
                channel_id,
                kind: format!("{:?}", channel.kind),
            });
        };

        if channel.guild_id.get() != guild_id.0 {
            return Err(ResolutionError::GuildMismatch { guild_id, channel_id });
        }

        Ok(Arc::new(SerenityContainer {
            http: Arc::clone(&self.http),
            guild_id,
            channel_id,
            kind,
        }))
    }
}

fn container_kind(kind: ChannelType) -> Option<ContainerKind> {
    match kind {
        ChannelType::Text | ChannelType::News => Some(ContainerKind::TextChannel),
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread => {
            Some(ContainerKind::Thread)
        }
        _ => None,
    }
}

const UNKNOWN_CHANNEL: isize = 10003;
const UNKNOWN_MESSAGE: isize = 10008;
const MISSING_ACCESS: isize = 50001;
const MISSING_PERMISSIONS: isize = 50013;

/// Maps a serenity failure onto [`PlatformError`].
///
/// Discord answers a pin of a pinned message, or an unpin of an unpinned one,
/// with success, so this never yields [`PlatformError::AlreadyInState`]. On the
/// live path repeated pin/unpin calls are avoided by the executor's snapshot
/// check.
fn classify(error: &serenity::Error) -> PlatformError {
    let detail = error.to_string();
    match error {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => classify_response(
            Some(response.status_code.as_u16()),
            Some(response.error.code),
            detail,
        ),
        serenity::Error::Http(http_error) => {
            classify_response(http_error.status_code().map(|s| s.as_u16()), None, detail)
        }
        _ => classify_response(None, None, detail),
    }
}

/// The JSON error code wins over the HTTP status when Discord sends one.
fn classify_response(status: Option<u16>, code: Option<isize>, detail: String) -> PlatformError {
    match code {
        Some(UNKNOWN_CHANNEL | UNKNOWN_MESSAGE) => return PlatformError::NotFound(detail),
        Some(MISSING_ACCESS | MISSING_PERMISSIONS) => return PlatformError::Forbidden(detail),
        _ => {}
    }

    match status {
        Some(403) => PlatformError::Forbidden(detail),
        Some(404) => PlatformError::NotFound(detail),
        Some(429) => PlatformError::RateLimited(detail),
        _ => PlatformError::Rejected(detail),
    }
}

struct SerenityContainer {
    http: Arc<Http>,
    guild_id: GuildId,
    channel_id: ChannelId,
    kind: ContainerKind,
}

impl SerenityContainer {
    fn channel(&self) -> SerenityChannelId {
        SerenityChannelId::new(self.channel_id.0)
    }
}

#[async_trait]
impl MessageContainer for SerenityContainer {
    fn id(&self) -> ChannelId {
        self.channel_id
    }

    fn kind(&self) -> ContainerKind {
        self.kind
    }

    async fn resolve_message(
        &self,
        message_id: MessageId,
    ) -> Result<Box<dyn MessageHandle>, ResolutionError> {
        let not_found = ResolutionError::MessageNotFound { channel_id: self.channel_id, message_id };
        if message_id.0 == 0 {
            return Err(not_found);
        }

        let message =
            match self.channel().message(&*self.http, SerenityMessageId::new(message_id.0)).await {
                Ok(message) => message,
                Err(error) => {
                    return Err(match classify(&error) {
                        PlatformError::NotFound(_) => not_found,
                        other => ResolutionError::Platform(other),
                    });
                }
            };

        let literals: Vec<(String, u64)> = message
            .reactions
            .iter()
            .map(|reaction| (reaction.reaction_type.to_string(), reaction.count))
            .collect();
        let tally =
            ReactionTally::from_reactions(literals.iter().map(|(emoji, count)| (emoji.as_str(), *count)));

        Ok(Box::new(SerenityMessage {
            http: Arc::clone(&self.http),
            channel: self.channel(),
            id: message_id,
            pinned: message.pinned,
            tally,
            jump_link: jump_link(self.guild_id, self.channel_id, message_id),
        }))
    }

    async fn send_notification(&self, notification: &Notification) -> Result<(), PlatformError> {
        let mut embed =
            CreateEmbed::new().title(&notification.title).description(&notification.description);
        if let Some(url) = &notification.url {
            embed = embed.url(url);
        }
        if let Some(colour) = notification.colour {
            embed = embed.colour(colour);
        }

        self.channel()
            .send_message(&*self.http, CreateMessage::new().embed(embed))
            .await
            .map(|_| ())
            .map_err(|error| classify(&error))
    }
}

struct SerenityMessage {
    http: Arc<Http>,
    channel: SerenityChannelId,
    id: MessageId,
    pinned: bool,
    tally: ReactionTally,
    jump_link: String,
}

#[async_trait]
impl MessageHandle for SerenityMessage {
    fn id(&self) -> MessageId {
        self.id
    }

    fn current_reactions(&self) -> ReactionTally {
        self.tally.clone()
    }

    fn is_pinned(&self) -> bool {
        self.pinned
    }

    fn jump_link(&self) -> String {
        self.jump_link.clone()
    }

    async fn pin(&self) -> Result<(), PlatformError> {
        self.channel
            .pin(&self.http, SerenityMessageId::new(self.id.0))
            .await
            .map_err(|error| classify(&error))
    }

    async fn unpin(&self) -> Result<(), PlatformError> {
        self.channel
            .unpin(&self.http, SerenityMessageId::new(self.id.0))
            .await
            .map_err(|error| classify(&error))
    }
}

/// Forwards serenity gateway callbacks into the runner's envelope stream.
struct EnvelopeForwarder {
    sender: UnboundedSender<GatewayEnvelope>,
}

impl EnvelopeForwarder {
    fn forward(&self, event: GatewayEvent) {
        let envelope = GatewayEnvelope::new(event);
        if self.sender.send(envelope).is_err() {
            debug!(
                event_name = "gateway.forward.dropped",
                "gateway event arrived after the runner stopped reading"
            );
        }
    }
}

fn raw_reaction(reaction: &Reaction) -> RawReactionEvent {
    RawReactionEvent {
        emoji: reaction.emoji.to_string(),
        guild_id: reaction.guild_id.map(|id| GuildId(id.get())),
        channel_id: ChannelId(reaction.channel_id.get()),
        message_id: MessageId(reaction.message_id.get()),
        user_id: reaction.user_id.map(|id| UserId(id.get())),
    }
}

#[async_trait]
impl SerenityEventHandler for EnvelopeForwarder {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.forward(GatewayEvent::Ready(ReadyEvent {
            user_name: ready.user.name.clone(),
            guild_count: ready.guilds.len(),
        }));
    }

    async fn reaction_add(&self, _ctx: Context, reaction: Reaction) {
        self.forward(GatewayEvent::ReactionAdded(raw_reaction(&reaction)));
    }

    async fn reaction_remove(&self, _ctx: Context, reaction: Reaction) {
        self.forward(GatewayEvent::ReactionRemoved(raw_reaction(&reaction)));
    }
}

struct ClientControl {
    shard_manager: Arc<ShardManager>,
    task: JoinHandle<Result<(), serenity::Error>>,
}

/// Gateway session driven by a serenity [`Client`] running on its own task.
pub struct SerenityGatewayTransport {
    token: SecretString,
    intents: GatewayIntents,
    receiver: Mutex<Option<UnboundedReceiver<GatewayEnvelope>>>,
    control: Mutex<Option<ClientControl>>,
}

impl SerenityGatewayTransport {
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            intents: gateway_intents(),
            receiver: Mutex::new(None),
            control: Mutex::new(None),
        }
    }

    async fn stop_client(&self) -> Result<(), TransportError> {
        let Some(control) = self.control.lock().await.take() else {
            return Ok(());
        };

        control.shard_manager.shutdown_all().await;
        match control.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => {
                warn!(
                    event_name = "gateway.client.stopped_with_error",
                    error = %error,
                    "gateway client reported an error while stopping"
                );
                Ok(())
            }
            Err(error) => Err(TransportError::Disconnect(error.to_string())),
        }
    }
}

#[async_trait]
impl GatewayTransport for SerenityGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.stop_client().await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let mut client = Client::builder(self.token.expose_secret(), self.intents)
            .event_handler(EnvelopeForwarder { sender })
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let shard_manager = Arc::clone(&client.shard_manager);
        let task = tokio::spawn(async move { client.start().await });

        *self.receiver.lock().await = Some(receiver);
        *self.control.lock().await = Some(ClientControl { shard_manager, task });
        info!(event_name = "gateway.client.started", "gateway client started");
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        let mut receiver = self.receiver.lock().await;
        let Some(stream) = receiver.as_mut() else {
            return Err(TransportError::Receive("gateway client is not connected".to_owned()));
        };

        if let Some(envelope) = stream.recv().await {
            return Ok(Some(envelope));
        }
        *receiver = None;
        drop(receiver);

        // Every sender is gone, so the client task has finished.
        let Some(control) = self.control.lock().await.take() else {
            return Ok(None);
        };
        match control.task.await {
            Ok(Ok(())) => Ok(None),
            Ok(Err(error)) => Err(TransportError::Receive(error.to_string())),
            Err(error) => Err(TransportError::Receive(error.to_string())),
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.receiver.lock().await.take();
        self.stop_client().await
    }
}
