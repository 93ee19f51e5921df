use serde::{Deserialize, Serialize};
use std::fmt;
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Assistant,
    User,
}

/// Identifier of a transcript entry. The greeting always carries
/// [`MessageId::GREETING`]; every later message counts up from 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    pub const GREETING: MessageId = MessageId(0);
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::GREETING {
            write!(f, "initial")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub sender: Sender,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Message {
    pub fn new(
        id: MessageId,
        content: impl Into<String>,
        sender: Sender,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            content: content.into(),
            sender,
            timestamp,
        }
    }

    /// Hour and minute in the local offset, e.g. `09:41 AM`.
    pub fn display_time(&self) -> String {
        let mut datetime = self.timestamp;
        if let Ok(offset) = UtcOffset::current_local_offset() {
            datetime = datetime.to_offset(offset);
        }
        datetime.format(MESSAGE_TIME_FORMAT).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_greeting_id_displays_as_initial() {
        assert_eq!(MessageId::GREETING.to_string(), "initial");
        assert_eq!(MessageId(7).to_string(), "7");
    }

    #[test]
    fn test_message_serializes_with_lowercase_sender() {
        let msg = Message::new(
            MessageId(3),
            "show updates",
            Sender::User,
            datetime!(2024-05-01 14:05 UTC),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sender"], "user");
        assert_eq!(json["id"], 3);
        assert_eq!(json["timestamp"], "2024-05-01T14:05:00Z");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_display_time_has_hour_minute_period() {
        let msg = Message::new(
            MessageId(1),
            "hi",
            Sender::Assistant,
            datetime!(2024-05-01 14:05 UTC),
        );
        let shown = msg.display_time();
        assert_eq!(shown.len(), "02:05 PM".len());
        assert!(shown.ends_with("AM") || shown.ends_with("PM"));
        assert_eq!(&shown[2..3], ":");
    }
}
