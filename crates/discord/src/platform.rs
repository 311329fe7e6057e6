use std::{fmt, sync::Arc};

use async_trait::async_trait;
use pinbot_core::policy::{MessageState, ReactionTally};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notifications::Notification;

macro_rules! snowflake_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake_id!(GuildId);
snowflake_id!(ChannelId);
snowflake_id!(MessageId);
snowflake_id!(UserId);

pub fn jump_link(guild_id: GuildId, channel_id: ChannelId, message_id: MessageId) -> String {
    format!("https://discord.com/channels/{guild_id}/{channel_id}/{message_id}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    TextChannel,
    Thread,
}

impl ContainerKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::TextChannel => "text_channel",
            Self::Thread => "thread",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("missing permission: {0}")]
    Forbidden(String),
    #[error("target not found: {0}")]
    NotFound(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// For platforms that reject a redundant pin change. Discord accepts those.
    #[error("target already in requested state: {0}")]
    AlreadyInState(String),
    #[error("platform rejected request: {0}")]
    Rejected(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("reaction event carries no guild id")]
    MissingGuild,
    #[error("channel or thread `{channel_id}` was not found")]
    ChannelNotFound { channel_id: ChannelId },
    #[error("channel `{channel_id}` has unsupported type `{kind}`")]
    WrongChannelType { channel_id: ChannelId, kind: String },
    #[error("channel `{channel_id}` does not belong to guild `{guild_id}`")]
    GuildMismatch { guild_id: GuildId, channel_id: ChannelId },
    #[error("message `{message_id}` was not found in channel `{channel_id}`")]
    MessageNotFound { channel_id: ChannelId, message_id: MessageId },
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// A message as seen at resolution time. Reaction counts and the pin flag are
/// a snapshot; pin/unpin go back to the platform.
#[async_trait]
pub trait MessageHandle: Send + Sync {
    fn id(&self) -> MessageId;
    fn current_reactions(&self) -> ReactionTally;
    fn is_pinned(&self) -> bool;
    fn jump_link(&self) -> String;
    async fn pin(&self) -> Result<(), PlatformError>;
    async fn unpin(&self) -> Result<(), PlatformError>;
}

/// Anything messages live in: a text channel or a thread.
#[async_trait]
pub trait MessageContainer: Send + Sync {
    fn id(&self) -> ChannelId;
    fn kind(&self) -> ContainerKind;
    async fn resolve_message(
        &self,
        message_id: MessageId,
    ) -> Result<Box<dyn MessageHandle>, ResolutionError>;
    async fn send_notification(&self, notification: &Notification) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn resolve_container(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn MessageContainer>, ResolutionError>;
}

pub struct ResolvedMessage {
    pub container: Arc<dyn MessageContainer>,
    pub handle: Box<dyn MessageHandle>,
}

impl ResolvedMessage {
    pub fn state(&self) -> MessageState {
        MessageState {
            pinned: self.handle.is_pinned(),
            tally: self.handle.current_reactions(),
            jump_link: self.handle.jump_link(),
        }
    }
}

pub async fn resolve_message(
    client: &dyn PlatformClient,
    guild_id: Option<GuildId>,
    channel_id: ChannelId,
    message_id: MessageId,
) -> Result<ResolvedMessage, ResolutionError> {
    let guild_id = guild_id.ok_or(ResolutionError::MissingGuild)?;
    let container = client.resolve_container(guild_id, channel_id).await?;
    let handle = container.resolve_message(message_id).await?;
    Ok(ResolvedMessage { container, handle })
}
