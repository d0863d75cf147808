use crate::error::{CoordinatorError, Result};
use huddle_core::{ConnectionId, MediaFlag, Participant, PublicUser, RoomId, ServerEvent, UserId};
use tokio::sync::oneshot;

/// Commands delivered to a room actor. Each carries its reply channel.
#[derive(Debug)]
pub enum RoomCommand {
    /// A connection asks to become a participant.
    Join {
        connection_id: ConnectionId,
        user: PublicUser,
        respond_to: oneshot::Sender<JoinOutcome>,
    },

    /// Explicit leave or disconnect cleanup. Replies whether a participant was removed.
    Leave {
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Participant toggled one of its own media flags.
    SetMedia {
        connection_id: ConnectionId,
        flag: MediaFlag,
        value: bool,
        respond_to: oneshot::Sender<Result<()>>,
    },

    HostMute {
        requester: UserId,
        target: ConnectionId,
        respond_to: oneshot::Sender<Result<()>>,
    },

    HostRemove {
        requester: UserId,
        target: ConnectionId,
        respond_to: oneshot::Sender<Result<()>>,
    },

    /// Host check ahead of the meeting-store write that precedes `End`.
    AuthorizeEnd {
        requester: UserId,
        respond_to: oneshot::Sender<Result<()>>,
    },

    /// Tear the room down. Replies with the number of participants evicted.
    End {
        requester: UserId,
        respond_to: oneshot::Sender<Result<usize>>,
    },

    /// Checks that the sender may chat here and returns its public identity.
    AuthorizeChat {
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<Result<PublicUser>>,
    },

    /// Broadcast an event to the room. With `from` set, the sender must be a participant
    /// and is skipped unless `include_sender` is true.
    Deliver {
        from: Option<ConnectionId>,
        include_sender: bool,
        event: ServerEvent,
        respond_to: oneshot::Sender<Result<()>>,
    },

    Snapshot {
        respond_to: oneshot::Sender<RoomSnapshot>,
    },
}

/// Reply to a join request.
#[derive(Debug)]
pub enum JoinOutcome {
    Joined(JoinAck),
    Rejected(CoordinatorError),
    /// The room emptied and shut down before handling the request; try a fresh room.
    RoomClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAck {
    /// Everyone in the room except the caller.
    pub participants: Vec<Participant>,
    pub is_host: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub host: UserId,
    pub participants: Vec<Participant>,
}
