use std::fmt;

use serde::{Deserialize, Serialize};

pub const PUSHPIN_LITERAL: &str = "📌";
pub const THUMBS_DOWN_LITERAL: &str = "👎";

/// Emoji kinds the pin policy distinguishes. Anything that is not a pushpin
/// or a thumbsdown collapses into `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionEmoji {
    Pushpin,
    ThumbsDown,
    Other,
}

impl ReactionEmoji {
    pub fn from_literal(literal: &str) -> Self {
        match literal.trim() {
            PUSHPIN_LITERAL => Self::Pushpin,
            THUMBS_DOWN_LITERAL => Self::ThumbsDown,
            _ => Self::Other,
        }
    }

    pub fn literal(&self) -> Option<&'static str> {
        match self {
            Self::Pushpin => Some(PUSHPIN_LITERAL),
            Self::ThumbsDown => Some(THUMBS_DOWN_LITERAL),
            Self::Other => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pushpin => "pushpin",
            Self::ThumbsDown => "thumbsdown",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ReactionEmoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal().unwrap_or(self.label()))
    }
}
