use serde::{Deserialize, Serialize};

use crate::models::UserId;

// -- Chat --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: UserId,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageQuery {
    pub limit: usize,
    pub offset: usize,
}

// -- Counters --

/// Body of both `GET /api/chat/unread-count` and
/// `GET /api/notifications/unread-count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread_count: u32,
}

// -- Notifications --

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NotificationQuery {
    pub limit: usize,
}
