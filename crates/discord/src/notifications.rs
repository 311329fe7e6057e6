use pinbot_core::policy::UnpinReason;
use serde::Serialize;

pub const LOW_RATING_TITLE: &str = "Unpinned due to low rating";
pub const NO_PUSHPIN_TITLE: &str = "Unpinned because no pushpin remains";

const LOW_RATING_COLOUR: u32 = 0xED4245;
const NO_PUSHPIN_COLOUR: u32 = 0x5865F2;

/// Embed-style notice posted to the channel or thread that owns a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colour: Option<u32>,
}

pub struct NotificationBuilder {
    title: String,
    description: Vec<String>,
    url: Option<String>,
    colour: Option<u32>,
}

impl NotificationBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), description: Vec::new(), url: None, colour: None }
    }

    pub fn link(mut self, label: &str, url: impl Into<String>) -> Self {
        let url = url.into();
        self.description.push(format!("[{label}]({url})"));
        self.url = Some(url);
        self
    }

    pub fn colour(mut self, colour: u32) -> Self {
        self.colour = Some(colour);
        self
    }

    pub fn build(self) -> Notification {
        Notification {
            title: self.title,
            description: self.description.join("\n"),
            url: self.url,
            colour: self.colour,
        }
    }
}

pub fn unpin_title(reason: UnpinReason) -> &'static str {
    match reason {
        UnpinReason::LowRating => LOW_RATING_TITLE,
        UnpinReason::NoPushpinLeft => NO_PUSHPIN_TITLE,
    }
}

pub fn unpin_notification(reason: UnpinReason, jump_link: &str) -> Notification {
    let colour = match reason {
        UnpinReason::LowRating => LOW_RATING_COLOUR,
        UnpinReason::NoPushpinLeft => NO_PUSHPIN_COLOUR,
    };

    NotificationBuilder::new(unpin_title(reason))
        .link("Click here to jump to the message", jump_link)
        .colour(colour)
        .build()
}
