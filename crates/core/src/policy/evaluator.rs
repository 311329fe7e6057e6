use serde::{Deserialize, Serialize};

use super::{emoji::ReactionEmoji, tally::ReactionTally};

/// Thumbsdown count at which a message is considered bad and may no longer
/// stay pinned.
pub const BAD_MESSAGE_THRESHOLD: u64 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionChangeKind {
    Added,
    Removed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionChangeEvent {
    pub emoji: ReactionEmoji,
    pub kind: ReactionChangeKind,
}

impl ReactionChangeEvent {
    pub fn added(emoji: ReactionEmoji) -> Self {
        Self { emoji, kind: ReactionChangeKind::Added }
    }

    pub fn removed(emoji: ReactionEmoji) -> Self {
        Self { emoji, kind: ReactionChangeKind::Removed }
    }
}

/// Snapshot of a message taken right after the platform applied the
/// reaction change. The tally already includes the triggering reaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageState {
    pub pinned: bool,
    pub tally: ReactionTally,
    pub jump_link: String,
}

impl MessageState {
    pub fn is_bad(&self) -> bool {
        self.tally.thumbs_down() >= BAD_MESSAGE_THRESHOLD
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnpinReason {
    LowRating,
    NoPushpinLeft,
}

impl UnpinReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LowRating => "low_rating",
            Self::NoPushpinLeft => "no_pushpin_left",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    NoOp,
    Pin,
    Unpin(UnpinReason),
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoOp => "no_op",
            Self::Pin => "pin",
            Self::Unpin(UnpinReason::LowRating) => "unpin_low_rating",
            Self::Unpin(UnpinReason::NoPushpinLeft) => "unpin_no_pushpin_left",
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }
}

pub trait PinPolicy: Send + Sync {
    fn evaluate(&self, event: &ReactionChangeEvent, state: &MessageState) -> Decision;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPinPolicy;

impl PinPolicy for DeterministicPinPolicy {
    fn evaluate(&self, event: &ReactionChangeEvent, state: &MessageState) -> Decision {
        evaluate(event, state)
    }
}

pub fn evaluate(event: &ReactionChangeEvent, state: &MessageState) -> Decision {
    match event.kind {
        ReactionChangeKind::Added => evaluate_added(event.emoji, state),
        ReactionChangeKind::Removed => evaluate_removed(event.emoji, state),
    }
}

fn evaluate_added(emoji: ReactionEmoji, state: &MessageState) -> Decision {
    let is_bad = state.is_bad();

    match emoji {
        ReactionEmoji::ThumbsDown if is_bad && state.pinned => {
            Decision::Unpin(UnpinReason::LowRating)
        }
        ReactionEmoji::Pushpin if !state.pinned && !is_bad => Decision::Pin,
        _ => Decision::NoOp,
    }
}

// Thumbsdown removal is never evaluated, so a bad message has no way back
// to being pinnable through this path.
fn evaluate_removed(emoji: ReactionEmoji, state: &MessageState) -> Decision {
    if emoji != ReactionEmoji::Pushpin || state.tally.pushpins() > 0 {
        return Decision::NoOp;
    }

    if state.pinned {
        Decision::Unpin(UnpinReason::NoPushpinLeft)
    } else {
        Decision::NoOp
    }
}
