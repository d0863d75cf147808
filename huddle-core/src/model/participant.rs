use crate::model::{ConnectionId, PublicUser};
use serde::{Deserialize, Serialize};

/// Per-room media flags of one participant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaState {
    pub is_muted: bool,
    pub is_video_off: bool,
    pub is_screen_sharing: bool,
}

/// Which media flag a toggle targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFlag {
    Mute,
    Video,
    ScreenShare,
}

impl MediaState {
    pub fn with_muted(is_muted: bool) -> Self {
        Self {
            is_muted,
            ..Self::default()
        }
    }

    pub fn set(&mut self, flag: MediaFlag, value: bool) {
        match flag {
            MediaFlag::Mute => self.is_muted = value,
            MediaFlag::Video => self.is_video_off = value,
            MediaFlag::ScreenShare => self.is_screen_sharing = value,
        }
    }
}

/// A user present in a room through one connection.
///
/// Host status is deliberately absent: it is derived from the room's host identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub user: PublicUser,
    pub connection_id: ConnectionId,
    #[serde(flatten)]
    pub media: MediaState,
}
