use crate::error::{CoordinatorError, Result};
use crate::fanout::Fanout;
use crate::registry::ConnectionRegistry;
use crate::room::host_authority::HostAuthority;
use crate::room::presence::PresenceTable;
use crate::room::room_command::{JoinAck, JoinOutcome, RoomCommand, RoomSnapshot};
use crate::room::room_handle::RoomHandle;
use crate::room::room_manager::EndedRooms;
use dashmap::DashMap;
use huddle_core::{
    ConnectionId, MediaFlag, MediaState, MeetingInfo, PublicUser, RemovalReason, RoomId,
    ServerEvent, UserId,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    Emptied,
    Ended,
}

/// Room actor. Owns the presence table of one room; every mutation of it runs here,
/// one command at a time.
pub struct Room {
    room_id: RoomId,
    instance: u64,
    meeting: MeetingInfo,
    authority: HostAuthority,
    presence: PresenceTable,
    ended: bool,
    registry: Arc<ConnectionRegistry>,
    fanout: Fanout,
    rooms: Arc<DashMap<RoomId, RoomHandle>>,
    ended_rooms: Arc<EndedRooms>,
    command_rx: mpsc::Receiver<RoomCommand>,
}

impl Room {
    pub(crate) fn new(
        meeting: MeetingInfo,
        instance: u64,
        command_rx: mpsc::Receiver<RoomCommand>,
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<DashMap<RoomId, RoomHandle>>,
        ended_rooms: Arc<EndedRooms>,
    ) -> Self {
        Self {
            room_id: meeting.room_id.clone(),
            instance,
            authority: HostAuthority::new(meeting.host.clone()),
            meeting,
            presence: PresenceTable::new(),
            ended: false,
            fanout: Fanout::new(registry.clone()),
            registry,
            rooms,
            ended_rooms,
            command_rx,
        }
    }

    pub async fn run(mut self) {
        info!(room = %self.room_id, host = %self.authority.host(), "Room event loop started");

        let reason = loop {
            match self.command_rx.recv().await {
                Some(cmd) => self.handle_command(cmd),
                None => {
                    info!(room = %self.room_id, "Command channel closed. Shutting down room.");
                    break Shutdown::Emptied;
                }
            }

            if self.ended {
                break Shutdown::Ended;
            }
            if self.presence.is_empty() {
                break Shutdown::Emptied;
            }
        };

        self.shutdown(reason).await;
        info!(room = %self.room_id, ?reason, "Room event loop finished");
    }

    /// Remove this instance from the room table, then answer whatever is still queued.
    async fn shutdown(&mut self, reason: Shutdown) {
        if reason == Shutdown::Ended {
            self.ended_rooms.record(&self.room_id);
        }
        let instance = self.instance;
        self.rooms
            .remove_if(&self.room_id, |_, handle| handle.instance() == instance);
        self.command_rx.close();

        while let Some(cmd) = self.command_rx.recv().await {
            self.reject(cmd, reason);
        }
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                connection_id,
                user,
                respond_to,
            } => {
                let _ = respond_to.send(self.join(connection_id, user));
            }

            RoomCommand::Leave {
                connection_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.leave(&connection_id));
            }

            RoomCommand::SetMedia {
                connection_id,
                flag,
                value,
                respond_to,
            } => {
                let _ = respond_to.send(self.set_media(&connection_id, flag, value));
            }

            RoomCommand::HostMute {
                requester,
                target,
                respond_to,
            } => {
                let _ = respond_to.send(self.host_mute(&requester, &target));
            }

            RoomCommand::HostRemove {
                requester,
                target,
                respond_to,
            } => {
                let _ = respond_to.send(self.host_remove(&requester, &target));
            }

            RoomCommand::AuthorizeEnd {
                requester,
                respond_to,
            } => {
                let _ = respond_to.send(self.authority.authorize(&requester));
            }

            RoomCommand::End {
                requester,
                respond_to,
            } => {
                let _ = respond_to.send(self.end(&requester));
            }

            RoomCommand::AuthorizeChat {
                connection_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.authorize_chat(&connection_id));
            }

            RoomCommand::Deliver {
                from,
                include_sender,
                event,
                respond_to,
            } => {
                let _ = respond_to.send(self.deliver(from, include_sender, event));
            }

            RoomCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    fn reject(&self, cmd: RoomCommand, reason: Shutdown) {
        let gone = || CoordinatorError::RoomNotFound(self.room_id.clone());

        match cmd {
            RoomCommand::Join { respond_to, .. } => {
                let outcome = match reason {
                    Shutdown::Ended => JoinOutcome::Rejected(gone()),
                    Shutdown::Emptied => JoinOutcome::RoomClosed,
                };
                let _ = respond_to.send(outcome);
            }
            RoomCommand::Leave { respond_to, .. } => {
                let _ = respond_to.send(false);
            }
            RoomCommand::SetMedia { respond_to, .. } | RoomCommand::Deliver { respond_to, .. } => {
                let _ = respond_to.send(Err(CoordinatorError::NotInRoom));
            }
            RoomCommand::AuthorizeChat { respond_to, .. } => {
                let _ = respond_to.send(Err(CoordinatorError::NotInRoom));
            }
            RoomCommand::HostMute { respond_to, .. }
            | RoomCommand::HostRemove { respond_to, .. }
            | RoomCommand::AuthorizeEnd { respond_to, .. } => {
                let _ = respond_to.send(Err(gone()));
            }
            RoomCommand::End { respond_to, .. } => {
                let _ = respond_to.send(Err(gone()));
            }
            RoomCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    /// Sends `room-participants` to the joiner and builds the reply.
    fn accept(&self, connection_id: &ConnectionId, user_id: &UserId) -> JoinOutcome {
        let ack = JoinAck {
            participants: self.presence.list_except(connection_id),
            is_host: self.authority.is_host(user_id),
        };
        self.fanout.to_connection(
            connection_id,
            ServerEvent::RoomParticipants {
                room_id: self.room_id.clone(),
                participants: ack.participants.clone(),
                is_host: ack.is_host,
            },
        );
        JoinOutcome::Joined(ack)
    }

    fn join(&mut self, connection_id: ConnectionId, user: PublicUser) -> JoinOutcome {
        if let Some(existing) = self.presence.by_user(&user.id) {
            if existing.connection_id == connection_id {
                debug!(room = %self.room_id, "Duplicate join from {}", connection_id);
                return self.accept(&connection_id, &user.id);
            }
            return self.rebind(connection_id, user);
        }

        let capacity = self.meeting.settings.max_participants;
        if self.presence.len() >= capacity {
            warn!(room = %self.room_id, capacity, "Join rejected: room is full");
            return JoinOutcome::Rejected(CoordinatorError::RoomFull {
                room_id: self.room_id.clone(),
                capacity,
            });
        }

        if !self.registry.set_room(&connection_id, &self.room_id) {
            debug!(room = %self.room_id, "Joining connection {} already closed", connection_id);
            return JoinOutcome::Rejected(CoordinatorError::TargetGone);
        }

        let media = MediaState::with_muted(self.meeting.settings.mute_on_entry);
        self.presence.insert(user.clone(), connection_id, media);

        info!(
            room = %self.room_id,
            user = %user.id,
            connection = %connection_id,
            "Participant joined"
        );

        let outcome = self.accept(&connection_id, &user.id);
        self.fanout.to_members(
            self.presence.connections(),
            &ServerEvent::UserJoined {
                user,
                connection_id,
            },
            Some(&connection_id),
        );
        outcome
    }

    /// Same user, new connection: the entry follows the newest connection.
    fn rebind(&mut self, connection_id: ConnectionId, user: PublicUser) -> JoinOutcome {
        if !self.registry.set_room(&connection_id, &self.room_id) {
            return JoinOutcome::Rejected(CoordinatorError::TargetGone);
        }
        let Some(previous) = self.presence.rebind(&user.id, connection_id) else {
            return JoinOutcome::Rejected(CoordinatorError::TargetGone);
        };

        info!(
            room = %self.room_id,
            user = %user.id,
            "Participant moved from {} to {}",
            previous,
            connection_id
        );

        self.registry.clear_room_if(&previous, &self.room_id);
        self.fanout.to_connection(
            &previous,
            ServerEvent::Removed {
                room_id: self.room_id.clone(),
                reason: RemovalReason::Superseded,
            },
        );

        let outcome = self.accept(&connection_id, &user.id);
        let left = ServerEvent::UserLeft {
            user: user.clone(),
            connection_id: previous,
        };
        let joined = ServerEvent::UserJoined {
            user,
            connection_id,
        };
        self.fanout
            .to_members(self.presence.connections(), &left, Some(&connection_id));
        self.fanout
            .to_members(self.presence.connections(), &joined, Some(&connection_id));
        outcome
    }

    fn leave(&mut self, connection_id: &ConnectionId) -> bool {
        let Some(participant) = self.presence.remove_by_connection(connection_id) else {
            return false;
        };
        self.registry.clear_room_if(connection_id, &self.room_id);

        info!(
            room = %self.room_id,
            user = %participant.user.id,
            connection = %connection_id,
            "Participant left"
        );

        self.fanout.to_members(
            self.presence.connections(),
            &ServerEvent::UserLeft {
                user: participant.user,
                connection_id: *connection_id,
            },
            None,
        );
        true
    }

    fn set_media(
        &mut self,
        connection_id: &ConnectionId,
        flag: MediaFlag,
        value: bool,
    ) -> Result<()> {
        if flag == MediaFlag::ScreenShare && value && !self.meeting.settings.allow_screen_share {
            return Err(CoordinatorError::ScreenShareDisabled);
        }
        let participant = self
            .presence
            .set_flag(connection_id, flag, value)
            .ok_or(CoordinatorError::NotInRoom)?;

        let event = ServerEvent::ParticipantUpdated {
            connection_id: *connection_id,
            user_id: participant.user.id.clone(),
            media: participant.media,
        };
        self.fanout
            .to_members(self.presence.connections(), &event, Some(connection_id));
        Ok(())
    }

    fn host_mute(&mut self, requester: &UserId, target: &ConnectionId) -> Result<()> {
        self.authority.authorize(requester)?;

        let participant = self
            .presence
            .set_flag(target, MediaFlag::Mute, true)
            .ok_or(CoordinatorError::TargetGone)?;
        let update = ServerEvent::ParticipantUpdated {
            connection_id: *target,
            user_id: participant.user.id.clone(),
            media: participant.media,
        };

        info!(room = %self.room_id, "Host muted {}", target);

        self.fanout.to_connection(
            target,
            ServerEvent::ForcedMute {
                room_id: self.room_id.clone(),
            },
        );
        self.fanout
            .to_members(self.presence.connections(), &update, None);
        Ok(())
    }

    fn host_remove(&mut self, requester: &UserId, target: &ConnectionId) -> Result<()> {
        self.authority.authorize(requester)?;

        if self.presence.by_connection(target).is_none() {
            return Err(CoordinatorError::TargetGone);
        }

        info!(room = %self.room_id, "Host removed {}", target);

        self.fanout.to_connection(
            target,
            ServerEvent::Removed {
                room_id: self.room_id.clone(),
                reason: RemovalReason::Host,
            },
        );
        self.leave(target);
        Ok(())
    }

    fn end(&mut self, requester: &UserId) -> Result<usize> {
        self.authority.authorize(requester)?;

        let event = ServerEvent::MeetingEnded {
            room_id: self.room_id.clone(),
            ended_by: requester.clone(),
        };
        self.fanout
            .to_members(self.presence.connections(), &event, None);

        let evicted = self.presence.drain();
        for participant in &evicted {
            self.registry
                .clear_room_if(&participant.connection_id, &self.room_id);
        }
        self.ended = true;

        info!(room = %self.room_id, evicted = evicted.len(), "Meeting ended by host");
        Ok(evicted.len())
    }

    fn authorize_chat(&self, connection_id: &ConnectionId) -> Result<PublicUser> {
        let participant = self
            .presence
            .by_connection(connection_id)
            .ok_or(CoordinatorError::NotInRoom)?;
        if !self.meeting.settings.allow_chat {
            return Err(CoordinatorError::ChatDisabled);
        }
        Ok(participant.user.clone())
    }

    fn deliver(
        &self,
        from: Option<ConnectionId>,
        include_sender: bool,
        event: ServerEvent,
    ) -> Result<()> {
        if let Some(sender) = &from {
            if self.presence.by_connection(sender).is_none() {
                return Err(CoordinatorError::NotInRoom);
            }
        }
        let except = if include_sender { None } else { from.as_ref() };
        self.fanout
            .to_members(self.presence.connections(), &event, except);
        Ok(())
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            host: self.authority.host().clone(),
            participants: self.presence.snapshot(),
        }
    }
}
