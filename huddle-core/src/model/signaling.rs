use crate::model::{
    ChatMessage, ConnectionId, MediaState, Participant, PublicUser, RoomId, TeamId, UserId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// The three WebRTC negotiation messages the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemovalReason {
    /// Evicted by the meeting host.
    Host,
    /// The same user joined the room from another connection.
    Superseded,
}

/// Events a client sends over its connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom,
    SignalOffer {
        target_connection_id: ConnectionId,
        payload: Value,
    },
    SignalAnswer {
        target_connection_id: ConnectionId,
        payload: Value,
    },
    SignalIce {
        target_connection_id: ConnectionId,
        payload: Value,
    },
    /// `enabled` is the new value of the flag: `is_muted`, `is_video_off`,
    /// `is_screen_sharing` respectively.
    ToggleMute {
        enabled: bool,
    },
    ToggleVideo {
        enabled: bool,
    },
    ToggleScreenshare {
        enabled: bool,
    },
    HostMute {
        room_id: RoomId,
        target_connection_id: ConnectionId,
    },
    HostRemove {
        room_id: RoomId,
        target_connection_id: ConnectionId,
    },
    HostEnd {
        room_id: RoomId,
    },
    ChatSend {
        content: String,
        #[serde(default)]
        recipient_id: Option<UserId>,
    },
    ChatTyping {
        is_typing: bool,
    },
    HandRaise {
        is_raised: bool,
    },
    Reaction {
        emoji: String,
    },
    RecordingStarted,
    RecordingStopped,
    /// Subscribe to a team channel. Only members of the team are accepted.
    TeamJoin {
        team_id: TeamId,
    },
    TeamLeave {
        team_id: TeamId,
    },
    TeamTyping {
        team_id: TeamId,
        #[serde(default)]
        channel_type: String,
        is_typing: bool,
    },
}

/// Events the coordinator delivers to a connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "d", rename_all = "kebab-case")]
pub enum ServerEvent {
    Welcome {
        connection_id: ConnectionId,
        user: PublicUser,
    },
    IceConfig {
        ice_servers: Vec<IceServerConfig>,
    },
    RoomParticipants {
        room_id: RoomId,
        participants: Vec<Participant>,
        is_host: bool,
    },
    UserJoined {
        user: PublicUser,
        connection_id: ConnectionId,
    },
    UserLeft {
        user: PublicUser,
        connection_id: ConnectionId,
    },
    SignalOffer {
        from_connection_id: ConnectionId,
        from_user: PublicUser,
        payload: Value,
    },
    SignalAnswer {
        from_connection_id: ConnectionId,
        from_user: PublicUser,
        payload: Value,
    },
    SignalIce {
        from_connection_id: ConnectionId,
        from_user: PublicUser,
        payload: Value,
    },
    ParticipantUpdated {
        connection_id: ConnectionId,
        user_id: UserId,
        media: MediaState,
    },
    ForcedMute {
        room_id: RoomId,
    },
    Removed {
        room_id: RoomId,
        reason: RemovalReason,
    },
    MeetingEnded {
        room_id: RoomId,
        ended_by: UserId,
    },
    ChatMessage(ChatMessage),
    UserTyping {
        user: PublicUser,
        is_typing: bool,
    },
    HandRaised {
        connection_id: ConnectionId,
        user: PublicUser,
        is_raised: bool,
    },
    Reaction {
        user: PublicUser,
        emoji: String,
    },
    RecordingStarted {
        user: PublicUser,
    },
    RecordingStopped {
        user: PublicUser,
    },
    TeamJoined {
        team_id: TeamId,
        team_name: String,
    },
    TeamUserTyping {
        team_id: TeamId,
        user: PublicUser,
        channel_type: String,
        is_typing: bool,
    },
    Notification(Value),
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn signal(
        kind: SignalKind,
        from_connection_id: ConnectionId,
        from_user: PublicUser,
        payload: Value,
    ) -> Self {
        match kind {
            SignalKind::Offer => ServerEvent::SignalOffer {
                from_connection_id,
                from_user,
                payload,
            },
            SignalKind::Answer => ServerEvent::SignalAnswer {
                from_connection_id,
                from_user,
                payload,
            },
            SignalKind::IceCandidate => ServerEvent::SignalIce {
                from_connection_id,
                from_user,
                payload,
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}
