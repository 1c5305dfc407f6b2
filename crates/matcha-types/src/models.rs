use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub type UserId = i64;
pub type MessageId = i64;
pub type NotificationId = i64;

/// A direct message between two users. `id` is assigned by the server and is
/// unique within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

impl Message {
    /// True if `user` is one of the two participants.
    pub fn involves(&self, user: UserId) -> bool {
        self.sender_id == user || self.recipient_id == user
    }
}

/// Decode a conversation page entry by entry.
///
/// Entries that do not form a valid [`Message`] (missing `id` or `created_at`,
/// wrong field types, a zero id) are dropped; the remaining entries keep their
/// relative order.
pub fn decode_messages(entries: Vec<serde_json::Value>) -> Vec<Message> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Message>(entry) {
            Ok(message) if message.id != 0 => Some(message),
            Ok(_) => {
                debug!("Dropping message entry with zero id");
                None
            }
            Err(e) => {
                debug!("Dropping malformed message entry: {}", e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Unlike,
    Match,
    Message,
    ProfileView,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub name: String,
}

/// A stored notification as listed by `GET /api/notifications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub from_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_user: Option<UserInfo>,
}

/// One row of the conversation list. A conversation without `last_message`
/// is a fresh match nobody has written to yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub user_id: UserId,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn is_new_match(&self) -> bool {
        self.last_message.is_none()
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.username } else { &self.name }
    }
}

/// Online status as reported by `GET /api/profile/{id}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    pub is_online: bool,
    #[serde(default)]
    pub last_connection: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_connection_formatted: Option<String>,
}
