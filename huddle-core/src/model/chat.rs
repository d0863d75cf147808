use crate::model::{PublicUser, RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_CHAT_LENGTH: usize = 2000;

/// Chat message as submitted for persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewChatMessage {
    pub room_id: RoomId,
    pub sender: PublicUser,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<UserId>,
}

/// Chat message as stored by the meeting store and delivered to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub room_id: RoomId,
    pub sender: PublicUser,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<UserId>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}
