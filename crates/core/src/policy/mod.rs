//! Reaction-driven pin policy.
//!
//! `evaluate` is a pure function of the triggering reaction change and the
//! live state of the message; it never performs I/O and never fails.

pub mod emoji;
pub mod evaluator;
pub mod tally;

pub use emoji::{ReactionEmoji, PUSHPIN_LITERAL, THUMBS_DOWN_LITERAL};
pub use evaluator::{
    evaluate, Decision, DeterministicPinPolicy, MessageState, PinPolicy, ReactionChangeEvent,
    ReactionChangeKind, UnpinReason, BAD_MESSAGE_THRESHOLD,
};
pub use tally::ReactionTally;
