pub mod config;
pub mod policy;

pub use policy::{
    evaluate, Decision, DeterministicPinPolicy, MessageState, PinPolicy, ReactionChangeEvent,
    ReactionChangeKind, ReactionEmoji, ReactionTally, UnpinReason, BAD_MESSAGE_THRESHOLD,
};
