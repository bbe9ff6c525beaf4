use serde::Deserialize;

pub const URL_VERIFICATION: &str = "url_verification";
pub const APP_MENTION: &str = "app_mention";
pub const BOT_MESSAGE_SUBTYPE: &str = "bot_message";

#[derive(Debug, Deserialize)]
pub struct SlackEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub challenge: Option<String>,
    pub event: Option<SlackEvent>,
    pub event_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub text: Option<String>,
    pub channel: Option<String>,
    pub user: Option<String>,
    pub ts: Option<String>,
    pub subtype: Option<String>,
}

/// An `app_mention` that should be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionEvent {
    pub channel: String,
    pub user: Option<String>,
    pub text: String,
    pub ts: String,
}

impl SlackEvent {
    /// Returns the mention to answer, or `None` for other event types,
    /// bot-originated messages, and events missing a channel or timestamp.
    pub fn into_mention(self) -> Option<MentionEvent> {
        if self.event_type != APP_MENTION {
            return None;
        }
        if self.subtype.as_deref() == Some(BOT_MESSAGE_SUBTYPE) {
            return None;
        }
        Some(MentionEvent {
            channel: self.channel?,
            user: self.user,
            text: self.text.unwrap_or_default(),
            ts: self.ts?,
        })
    }
}
