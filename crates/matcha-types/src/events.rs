use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Message, NotificationKind, UserId};

// Frame `type` values pushed by the server over `/ws`.
pub const NOTIFICATION: &str = "notification";
pub const CHAT_MESSAGE: &str = "chat_message";
pub const LIKE: &str = "like";
pub const UNLIKE: &str = "unlike";
pub const MATCH: &str = "match";

/// Outer shape of every realtime text frame: `{type, data, timestamp?}`.
///
/// `data` is kept raw so the receiver can route on `type` first and decode the
/// payload with the handler registered for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Envelope {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// `notification` payload. `kind` is the notification sub-type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "type", default)]
    pub kind: Option<NotificationKind>,
    #[serde(default)]
    pub from_user_id: Option<UserId>,
    #[serde(default)]
    pub from_username: Option<String>,
    #[serde(default)]
    pub to_user_id: Option<UserId>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `chat_message` payload: the stored message plus a `"sender-recipient"` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    pub message: Message,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// `like` and `unlike` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LikePayload {
    #[serde(default)]
    pub from_user_id: Option<UserId>,
    #[serde(default)]
    pub from_username: Option<String>,
}

/// `match` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchPayload {
    #[serde(default)]
    pub matched_user_id: Option<UserId>,
    #[serde(default)]
    pub matched_username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_keeps_data_raw_and_tolerates_missing_fields() {
        let envelope = Envelope::parse(
            r#"{"type":"notification","data":{"type":"match","from_username":"ana"},"timestamp":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(envelope.kind, NOTIFICATION);
        assert!(envelope.timestamp.is_some());

        let payload: NotificationPayload = serde_json::from_value(envelope.data).unwrap();
        assert_eq!(payload.kind, Some(NotificationKind::Match));
        assert_eq!(payload.from_username.as_deref(), Some("ana"));

        let bare = Envelope::parse(r#"{"type":"unlike"}"#).unwrap();
        assert!(bare.data.is_null());
    }

    #[test]
    fn envelope_rejects_non_json() {
        assert!(Envelope::parse("hello there").is_err());
        assert!(Envelope::parse(r#"{"data":{}}"#).is_err());
    }
}
