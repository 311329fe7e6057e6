use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::emoji::ReactionEmoji;

/// Live reaction counts of a single message, keyed by policy emoji kind.
///
/// Built fresh from the platform's reaction list every time a decision is
/// made. Unrecognized emoji are folded into [`ReactionEmoji::Other`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTally {
    counts: BTreeMap<ReactionEmoji, u64>,
}

impl ReactionTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tally from `(emoji literal, count)` pairs as reported by the
    /// platform.
    pub fn from_reactions<'a, I>(reactions: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut tally = Self::new();
        for (literal, count) in reactions {
            tally.add(ReactionEmoji::from_literal(literal), count);
        }
        tally
    }

    pub fn with(mut self, emoji: ReactionEmoji, count: u64) -> Self {
        self.set(emoji, count);
        self
    }

    pub fn count(&self, emoji: ReactionEmoji) -> u64 {
        self.counts.get(&emoji).copied().unwrap_or(0)
    }

    pub fn set(&mut self, emoji: ReactionEmoji, count: u64) {
        if count == 0 {
            self.counts.remove(&emoji);
        } else {
            self.counts.insert(emoji, count);
        }
    }

    pub fn add(&mut self, emoji: ReactionEmoji, count: u64) {
        let current = self.count(emoji);
        self.set(emoji, current.saturating_add(count));
    }

    pub fn remove(&mut self, emoji: ReactionEmoji, count: u64) {
        let current = self.count(emoji);
        self.set(emoji, current.saturating_sub(count));
    }

    pub fn pushpins(&self) -> u64 {
        self.count(ReactionEmoji::Pushpin)
    }

    pub fn thumbs_down(&self) -> u64 {
        self.count(ReactionEmoji::ThumbsDown)
    }
}
