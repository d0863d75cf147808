use crate::model::{RoomId, UserId};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_PARTICIPANTS: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    #[default]
    Scheduled,
    Active,
    Ended,
    Cancelled,
}

impl MeetingStatus {
    /// Ended and cancelled meetings can no longer be entered.
    pub fn is_joinable(self) -> bool {
        matches!(self, MeetingStatus::Scheduled | MeetingStatus::Active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MeetingSettings {
    pub waiting_room: bool,
    pub allow_screen_share: bool,
    pub allow_chat: bool,
    pub allow_recording: bool,
    pub mute_on_entry: bool,
    pub max_participants: usize,
}

impl Default for MeetingSettings {
    fn default() -> Self {
        Self {
            waiting_room: false,
            allow_screen_share: true,
            allow_chat: true,
            allow_recording: true,
            mute_on_entry: false,
            max_participants: DEFAULT_MAX_PARTICIPANTS,
        }
    }
}

/// Meeting metadata resolved from the meeting store for a room id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeetingInfo {
    pub room_id: RoomId,
    pub meeting_id: String,
    #[serde(default)]
    pub title: String,
    pub host: UserId,
    #[serde(default)]
    pub status: MeetingStatus,
    #[serde(default)]
    pub settings: MeetingSettings,
}
