use pinbot_core::policy::{Decision, UnpinReason};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    notifications::unpin_notification,
    platform::{PlatformError, ResolvedMessage},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Skipped,
    Pinned,
    Unpinned { reason: UnpinReason },
    AlreadyInState { decision: Decision },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("pin request failed: {0}")]
    Pin(PlatformError),
    #[error("unpin request failed ({}): {source}", .reason.label())]
    Unpin {
        reason: UnpinReason,
        source: PlatformError,
        notification: Option<PlatformError>,
    },
    #[error("message was unpinned ({}) but the notification failed: {source}", .reason.label())]
    Notification { reason: UnpinReason, source: PlatformError },
}

/// Applies a policy decision to a resolved message.
///
/// Unpinning always posts the notice first and then unpins, even when the
/// notice could not be delivered; a failed notice is reported through
/// [`ExecutionError::Notification`] once the unpin itself went through.
#[derive(Clone, Copy, Debug, Default)]
pub struct PolicyExecutor;

impl PolicyExecutor {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(
        &self,
        decision: Decision,
        target: &ResolvedMessage,
        correlation_id: &str,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        match decision {
            Decision::NoOp => Ok(ExecutionOutcome::Skipped),
            Decision::Pin => self.pin(target, correlation_id).await,
            Decision::Unpin(reason) => self.unpin(reason, target, correlation_id).await,
        }
    }

    async fn pin(
        &self,
        target: &ResolvedMessage,
        correlation_id: &str,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let message_id = target.handle.id();
        let channel_id = target.container.id();

        if target.handle.is_pinned() {
            debug!(
                event_name = "policy.execute.pin_skipped",
                correlation_id,
                %channel_id,
                %message_id,
                "message already pinned"
            );
            return Ok(ExecutionOutcome::AlreadyInState { decision: Decision::Pin });
        }

        match target.handle.pin().await {
            Ok(()) => {
                info!(
                    event_name = "policy.execute.pinned",
                    correlation_id,
                    %channel_id,
                    %message_id,
                    "pinned a message"
                );
                Ok(ExecutionOutcome::Pinned)
            }
            Err(PlatformError::AlreadyInState(detail)) => {
                debug!(
                    event_name = "policy.execute.pin_skipped",
                    correlation_id,
                    %channel_id,
                    %message_id,
                    detail = %detail,
                    "platform reports message already pinned"
                );
                Ok(ExecutionOutcome::AlreadyInState { decision: Decision::Pin })
            }
            Err(error) => {
                warn!(
                    event_name = "policy.execute.pin_failed",
                    correlation_id,
                    %channel_id,
                    %message_id,
                    error = %error,
                    "failed to pin message"
                );
                Err(ExecutionError::Pin(error))
            }
        }
    }

    async fn unpin(
        &self,
        reason: UnpinReason,
        target: &ResolvedMessage,
        correlation_id: &str,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let message_id = target.handle.id();
        let channel_id = target.container.id();
        let decision = Decision::Unpin(reason);

        if !target.handle.is_pinned() {
            debug!(
                event_name = "policy.execute.unpin_skipped",
                correlation_id,
                %channel_id,
                %message_id,
                reason = reason.label(),
                "message already unpinned"
            );
            return Ok(ExecutionOutcome::AlreadyInState { decision });
        }

        let notification = unpin_notification(reason, &target.handle.jump_link());
        let notified = target.container.send_notification(&notification).await;
        match &notified {
            Ok(()) => debug!(
                event_name = "policy.execute.notified",
                correlation_id,
                %channel_id,
                %message_id,
                container_kind = target.container.kind().label(),
                reason = reason.label(),
                "unpin notification sent"
            ),
            Err(error) => warn!(
                event_name = "policy.execute.notify_failed",
                correlation_id,
                %channel_id,
                %message_id,
                container_kind = target.container.kind().label(),
                reason = reason.label(),
                error = %error,
                "failed to send unpin notification; unpinning anyway"
            ),
        }

        match target.handle.unpin().await {
            Ok(()) | Err(PlatformError::AlreadyInState(_)) => {
                info!(
                    event_name = "policy.execute.unpinned",
                    correlation_id,
                    %channel_id,
                    %message_id,
                    reason = reason.label(),
                    "unpinned a message"
                );
                match notified {
                    Ok(()) => Ok(ExecutionOutcome::Unpinned { reason }),
                    Err(source) => Err(ExecutionError::Notification { reason, source }),
                }
            }
            Err(source) => {
                warn!(
                    event_name = "policy.execute.unpin_failed",
                    correlation_id,
                    %channel_id,
                    %message_id,
                    reason = reason.label(),
                    error = %source,
                    "failed to unpin message"
                );
                Err(ExecutionError::Unpin { reason, source, notification: notified.err() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pinbot_core::policy::{Decision, ReactionEmoji, UnpinReason};

    use super::{ExecutionError, ExecutionOutcome, PolicyExecutor};
    use crate::{
        fakes::FakePlatform,
        notifications::{LOW_RATING_TITLE, NO_PUSHPIN_TITLE},
        platform::{resolve_message, ChannelId, GuildId, MessageId, PlatformError, ResolvedMessage},
    };

    const GUILD: GuildId = GuildId(10);
    const CHANNEL: ChannelId = ChannelId(20);
    const MESSAGE: MessageId = MessageId(30);

    async fn resolve(platform: &FakePlatform) -> ResolvedMessage {
        resolve_message(platform, Some(GUILD), CHANNEL, MESSAGE).await.expect("resolve")
    }

    #[tokio::test]
    async fn noop_performs_no_io() {
        let platform = FakePlatform::text_channel(GUILD, CHANNEL);
        platform.seed_message(MESSAGE, false, &[]).await;

        let outcome = PolicyExecutor::new()
            .execute(Decision::NoOp, &resolve(&platform).await, "corr-1")
            .await
            .expect("noop");

        assert_eq!(outcome, ExecutionOutcome::Skipped);
        assert_eq!(platform.pin_calls().await, 0);
        assert_eq!(platform.unpin_calls().await, 0);
        assert!(platform.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn pin_requests_platform_pin_without_notification() {
        let platform = FakePlatform::text_channel(GUILD, CHANNEL);
        platform.seed_message(MESSAGE, false, &[(ReactionEmoji::Pushpin, 1)]).await;

        let outcome = PolicyExecutor::new()
            .execute(Decision::Pin, &resolve(&platform).await, "corr-2")
            .await
            .expect("pin");

        assert_eq!(outcome, ExecutionOutcome::Pinned);
        assert!(platform.is_pinned(MESSAGE).await);
        assert_eq!(platform.pin_calls().await, 1);
        assert!(platform.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn pin_twice_is_tolerated() {
        let platform = FakePlatform::text_channel(GUILD, CHANNEL);
        platform.seed_message(MESSAGE, false, &[(ReactionEmoji::Pushpin, 2)]).await;
        let executor = PolicyExecutor::new();

        // Both handles were resolved before either pin landed.
        let first = resolve(&platform).await;
        let second = resolve(&platform).await;

        assert_eq!(
            executor.execute(Decision::Pin, &first, "corr-3a").await,
            Ok(ExecutionOutcome::Pinned)
        );
        assert_eq!(
            executor.execute(Decision::Pin, &second, "corr-3b").await,
            Ok(ExecutionOutcome::AlreadyInState { decision: Decision::Pin })
        );

        let third = resolve(&platform).await;
        assert_eq!(
            executor.execute(Decision::Pin, &third, "corr-3c").await,
            Ok(ExecutionOutcome::AlreadyInState { decision: Decision::Pin })
        );
        assert_eq!(platform.pin_calls().await, 2);
    }

    #[tokio::test]
    async fn unpin_on_unpinned_message_is_tolerated() {
        let platform = FakePlatform::text_channel(GUILD, CHANNEL);
        platform.seed_message(MESSAGE, false, &[]).await;

        let outcome = PolicyExecutor::new()
            .execute(
                Decision::Unpin(UnpinReason::NoPushpinLeft),
                &resolve(&platform).await,
                "corr-4",
            )
            .await;

        assert_eq!(
            outcome,
            Ok(ExecutionOutcome::AlreadyInState {
                decision: Decision::Unpin(UnpinReason::NoPushpinLeft)
            })
        );
        assert_eq!(platform.unpin_calls().await, 0);
        assert!(platform.notifications().await.is_empty());
    }

    #[tokio::test]
    async fn unpin_notifies_owner_then_unpins() {
        let platform = FakePlatform::text_channel(GUILD, CHANNEL);
        platform.seed_message(MESSAGE, true, &[(ReactionEmoji::ThumbsDown, 3)]).await;

        let outcome = PolicyExecutor::new()
            .execute(Decision::Unpin(UnpinReason::LowRating), &resolve(&platform).await, "corr-5")
            .await;

        assert_eq!(outcome, Ok(ExecutionOutcome::Unpinned { reason: UnpinReason::LowRating }));
        assert!(!platform.is_pinned(MESSAGE).await);

        let notifications = platform.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].0, CHANNEL);
        assert_eq!(notifications[0].1.title, LOW_RATING_TITLE);
        assert!(notifications[0].1.description.contains("https://discord.com/channels/10/20/30"));
    }

    #[tokio::test]
    async fn unpin_still_happens_when_notification_fails() {
        let platform = FakePlatform::text_channel(GUILD, CHANNEL);
        platform.seed_message(MESSAGE, true, &[]).await;
        platform.state.lock().await.notify_failure =
            Some(PlatformError::Forbidden("missing send messages".to_owned()));

        let outcome = PolicyExecutor::new()
            .execute(
                Decision::Unpin(UnpinReason::NoPushpinLeft),
                &resolve(&platform).await,
                "corr-6",
            )
            .await;

        assert_eq!(
            outcome,
            Err(ExecutionError::Notification {
                reason: UnpinReason::NoPushpinLeft,
                source: PlatformError::Forbidden("missing send messages".to_owned()),
            })
        );
        assert_eq!(platform.unpin_calls().await, 1);
        assert!(!platform.is_pinned(MESSAGE).await);
    }

    #[tokio::test]
    async fn unpin_failure_records_both_errors() {
        let platform = FakePlatform::text_channel(GUILD, CHANNEL).with_thread(ChannelId(21));
        platform.seed_message(MESSAGE, true, &[]).await;
        {
            let mut state = platform.state.lock().await;
            state.notify_failure = Some(PlatformError::RateLimited("slow down".to_owned()));
            state.unpin_failure = Some(PlatformError::Forbidden("manage messages".to_owned()));
        }

        let outcome = PolicyExecutor::new()
            .execute(
                Decision::Unpin(UnpinReason::NoPushpinLeft),
                &resolve(&platform).await,
                "corr-7",
            )
            .await;

        match outcome {
            Err(ExecutionError::Unpin { reason, source, notification }) => {
                assert_eq!(reason, UnpinReason::NoPushpinLeft);
                assert_eq!(source, PlatformError::Forbidden("manage messages".to_owned()));
                assert_eq!(notification, Some(PlatformError::RateLimited("slow down".to_owned())));
            }
            other => panic!("expected unpin failure, got {other:?}"),
        }
        assert!(platform.is_pinned(MESSAGE).await);
    }

    #[tokio::test]
    async fn notification_goes_to_thread_that_owns_message() {
        let thread = ChannelId(21);
        let platform = FakePlatform::text_channel(GUILD, CHANNEL).with_thread(thread);
        platform.seed_message(MESSAGE, true, &[]).await;

        let target =
            resolve_message(&platform, Some(GUILD), thread, MESSAGE).await.expect("resolve");
        PolicyExecutor::new()
            .execute(Decision::Unpin(UnpinReason::NoPushpinLeft), &target, "corr-8")
            .await
            .expect("unpin");

        let notifications = platform.notifications().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].0, thread);
        assert_eq!(notifications[0].1.title, NO_PUSHPIN_TITLE);
    }

    #[tokio::test]
    async fn pin_failure_is_recoverable_error() {
        let platform = FakePlatform::text_channel(GUILD, CHANNEL);
        platform.seed_message(MESSAGE, false, &[]).await;
        platform.state.lock().await.pin_failure =
            Some(PlatformError::NotFound("unknown message".to_owned()));

        let outcome = PolicyExecutor::new()
            .execute(Decision::Pin, &resolve(&platform).await, "corr-9")
            .await;

        assert_eq!(
            outcome,
            Err(ExecutionError::Pin(PlatformError::NotFound("unknown message".to_owned())))
        );
    }
}
