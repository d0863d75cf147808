use crate::error::{CoordinatorError, Result};
use crate::room::room_command::{JoinOutcome, RoomCommand, RoomSnapshot};
use huddle_core::{ConnectionId, MediaFlag, PublicUser, RoomId, ServerEvent, UserId};
use tokio::sync::{mpsc, oneshot};

/// Cloneable sender side of a room actor.
///
/// `instance` tells apart two actors that served the same room id one after the other.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    instance: u64,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn new(room_id: RoomId, instance: u64, sender: mpsc::Sender<RoomCommand>) -> Self {
        Self {
            room_id,
            instance,
            sender,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub async fn join(&self, connection_id: ConnectionId, user: PublicUser) -> JoinOutcome {
        let (respond_to, rx) = oneshot::channel();
        let cmd = RoomCommand::Join {
            connection_id,
            user,
            respond_to,
        };
        if self.sender.send(cmd).await.is_err() {
            return JoinOutcome::RoomClosed;
        }
        rx.await.unwrap_or(JoinOutcome::RoomClosed)
    }

    pub async fn leave(&self, connection_id: ConnectionId) -> bool {
        let (respond_to, rx) = oneshot::channel();
        let cmd = RoomCommand::Leave {
            connection_id,
            respond_to,
        };
        if self.sender.send(cmd).await.is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn set_media(
        &self,
        connection_id: ConnectionId,
        flag: MediaFlag,
        value: bool,
    ) -> Result<()> {
        self.request(CoordinatorError::NotInRoom, |respond_to| RoomCommand::SetMedia {
            connection_id,
            flag,
            value,
            respond_to,
        })
        .await
    }

    pub async fn host_mute(&self, requester: UserId, target: ConnectionId) -> Result<()> {
        let gone = self.gone();
        self.request(gone, |respond_to| RoomCommand::HostMute {
            requester,
            target,
            respond_to,
        })
        .await
    }

    pub async fn host_remove(&self, requester: UserId, target: ConnectionId) -> Result<()> {
        let gone = self.gone();
        self.request(gone, |respond_to| RoomCommand::HostRemove {
            requester,
            target,
            respond_to,
        })
        .await
    }

    pub async fn authorize_end(&self, requester: UserId) -> Result<()> {
        let gone = self.gone();
        self.request(gone, |respond_to| RoomCommand::AuthorizeEnd {
            requester,
            respond_to,
        })
        .await
    }

    pub async fn end(&self, requester: UserId) -> Result<usize> {
        let gone = self.gone();
        self.request(gone, |respond_to| RoomCommand::End {
            requester,
            respond_to,
        })
        .await
    }

    pub async fn authorize_chat(&self, connection_id: ConnectionId) -> Result<PublicUser> {
        self.request(CoordinatorError::NotInRoom, |respond_to| {
            RoomCommand::AuthorizeChat {
                connection_id,
                respond_to,
            }
        })
        .await
    }

    pub async fn deliver(
        &self,
        from: Option<ConnectionId>,
        include_sender: bool,
        event: ServerEvent,
    ) -> Result<()> {
        self.request(CoordinatorError::NotInRoom, |respond_to| RoomCommand::Deliver {
            from,
            include_sender,
            event,
            respond_to,
        })
        .await
    }

    /// `None` once the actor has shut down.
    pub async fn snapshot(&self) -> Option<RoomSnapshot> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Snapshot { respond_to })
            .await
            .ok()?;
        rx.await.ok()
    }

    fn gone(&self) -> CoordinatorError {
        CoordinatorError::RoomNotFound(self.room_id.clone())
    }

    async fn request<T>(
        &self,
        on_closed: CoordinatorError,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> RoomCommand,
    ) -> Result<T> {
        let (respond_to, rx) = oneshot::channel();
        if self.sender.send(build(respond_to)).await.is_err() {
            return Err(on_closed);
        }
        rx.await.unwrap_or(Err(on_closed))
    }
}
