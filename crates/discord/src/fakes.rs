use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use pinbot_core::policy::{ReactionEmoji, ReactionTally};
use tokio::sync::Mutex;

use crate::{
    notifications::Notification,
    platform::{
        jump_link, ChannelId, ContainerKind, GuildId, MessageContainer, MessageHandle, MessageId,
        PlatformClient, PlatformError, ResolutionError,
    },
};

#[derive(Default)]
pub(crate) struct FakeState {
    pub messages: HashMap<MessageId, FakeMessage>,
    pub notifications: Vec<(ChannelId, Notification)>,
    pub pin_calls: Vec<MessageId>,
    pub unpin_calls: Vec<MessageId>,
    pub pin_failure: Option<PlatformError>,
    pub unpin_failure: Option<PlatformError>,
    pub notify_failure: Option<PlatformError>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeMessage {
    pub pinned: bool,
    pub tally: ReactionTally,
}

/// In-memory guild with channels and threads; pin state and reactions live in
/// one shared table so handles observe each other's writes on next resolve.
#[derive(Clone)]
pub(crate) struct FakePlatform {
    guild_id: GuildId,
    containers: HashMap<ChannelId, ContainerKind>,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakePlatform {
    pub fn text_channel(guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self {
            guild_id,
            containers: HashMap::from([(channel_id, ContainerKind::TextChannel)]),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    pub fn with_thread(mut self, channel_id: ChannelId) -> Self {
        self.containers.insert(channel_id, ContainerKind::Thread);
        self
    }

    pub async fn seed_message(
        &self,
        message_id: MessageId,
        pinned: bool,
        reactions: &[(ReactionEmoji, u64)],
    ) {
        let mut tally = ReactionTally::new();
        for (emoji, count) in reactions {
            tally.add(*emoji, *count);
        }
        self.state.lock().await.messages.insert(message_id, FakeMessage { pinned, tally });
    }

    pub async fn react(&self, message_id: MessageId, emoji: ReactionEmoji) {
        let mut state = self.state.lock().await;
        state.messages.entry(message_id).or_default().tally.add(emoji, 1);
    }

    pub async fn unreact(&self, message_id: MessageId, emoji: ReactionEmoji) {
        let mut state = self.state.lock().await;
        state.messages.entry(message_id).or_default().tally.remove(emoji, 1);
    }

    pub async fn is_pinned(&self, message_id: MessageId) -> bool {
        self.state.lock().await.messages.get(&message_id).map(|m| m.pinned).unwrap_or(false)
    }

    pub async fn pin_calls(&self) -> usize {
        self.state.lock().await.pin_calls.len()
    }

    pub async fn unpin_calls(&self) -> usize {
        self.state.lock().await.unpin_calls.len()
    }

    pub async fn notifications(&self) -> Vec<(ChannelId, Notification)> {
        self.state.lock().await.notifications.clone()
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn resolve_container(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn MessageContainer>, ResolutionError> {
        let Some(kind) = self.containers.get(&channel_id).copied() else {
            return Err(ResolutionError::ChannelNotFound { channel_id });
        };
        if guild_id != self.guild_id {
            return Err(ResolutionError::GuildMismatch { guild_id, channel_id });
        }

        Ok(Arc::new(FakeContainer {
            guild_id,
            channel_id,
            kind,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeContainer {
    guild_id: GuildId,
    channel_id: ChannelId,
    kind: ContainerKind,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl MessageContainer for FakeContainer {
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
        let state = self.state.lock().await;
        let Some(message) = state.messages.get(&message_id) else {
            return Err(ResolutionError::MessageNotFound { channel_id: self.channel_id, message_id });
        };

        Ok(Box::new(FakeHandle {
            id: message_id,
            pinned: message.pinned,
            tally: message.tally.clone(),
            jump_link: jump_link(self.guild_id, self.channel_id, message_id),
            state: Arc::clone(&self.state),
        }))
    }

    async fn send_notification(&self, notification: &Notification) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.notify_failure.clone() {
            return Err(error);
        }
        state.notifications.push((self.channel_id, notification.clone()));
        Ok(())
    }
}

struct FakeHandle {
    id: MessageId,
    pinned: bool,
    tally: ReactionTally,
    jump_link: String,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl MessageHandle for FakeHandle {
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
        let mut state = self.state.lock().await;
        state.pin_calls.push(self.id);
        if let Some(error) = state.pin_failure.clone() {
            return Err(error);
        }
        let message = state.messages.entry(self.id).or_default();
        if message.pinned {
            return Err(PlatformError::AlreadyInState(format!("message {} is pinned", self.id)));
        }
        message.pinned = true;
        Ok(())
    }

    async fn unpin(&self) -> Result<(), PlatformError> {
        let mut state = self.state.lock().await;
        state.unpin_calls.push(self.id);
        if let Some(error) = state.unpin_failure.clone() {
            return Err(error);
        }
        let message = state.messages.entry(self.id).or_default();
        if !message.pinned {
            return Err(PlatformError::AlreadyInState(format!("message {} is not pinned", self.id)));
        }
        message.pinned = false;
        Ok(())
    }
}
