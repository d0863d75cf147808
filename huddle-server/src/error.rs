use huddle_core::{ConnectionId, RoomId, TeamId};
use thiserror::Error;

/// Failures surfaced while coordinating rooms.
///
/// None of these are fatal to the coordinator: the dispatcher turns them into an
/// informational `error` event for the originating connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("meeting not found for room {0}")]
    RoomNotFound(RoomId),

    #[error("room {room_id} is full ({capacity} participants)")]
    RoomFull { room_id: RoomId, capacity: usize },

    #[error("only the meeting host can do that")]
    NotHost,

    #[error("target connection is no longer in the room")]
    TargetGone,

    #[error("connection {0} is not in the room, nothing to do")]
    TargetNotInRoom(ConnectionId),

    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    #[error("you are not in a room")]
    NotInRoom,

    #[error("chat is disabled for this meeting")]
    ChatDisabled,

    #[error("screen sharing is disabled for this meeting")]
    ScreenShareDisabled,

    #[error("team not found: {0}")]
    TeamNotFound(TeamId),

    #[error("you are not a member of this team")]
    NotTeamMember,

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("meeting store error: {0}")]
    Store(String),
}

impl From<StoreError> for CoordinatorError {
    fn from(e: StoreError) -> Self {
        CoordinatorError::Store(e.to_string())
    }
}

/// Failures of the meeting store gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("meeting store unavailable: {0}")]
    Unavailable(String),

    #[error("meeting store rejected request: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("meeting not found: {0}")]
    NotFound(RoomId),

    #[error("invalid meeting store response: {0}")]
    InvalidResponse(String),
}

/// Failures of the identity verifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("credential missing")]
    MissingToken,

    #[error("credential expired")]
    Expired,

    #[error("credential signature is invalid")]
    InvalidSignature,

    #[error("malformed credential: {0}")]
    Malformed(String),
}

impl From<AuthError> for CoordinatorError {
    fn from(e: AuthError) -> Self {
        CoordinatorError::AuthenticationFailed(e.to_string())
    }
}

/// Failures while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
