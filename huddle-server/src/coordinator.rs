use crate::config::Config;
use crate::error::{CoordinatorError, Result, StoreError};
use crate::fanout::Fanout;
use crate::gateway::{HttpMeetingStore, InMemoryMeetingStore, MeetingStore};
use crate::identity::{IdentityVerifier, JwtVerifier};
use crate::registry::ConnectionRegistry;
use crate::room::{JoinAck, JoinOutcome, RoomHandle, RoomManager, RoomSnapshot};
use crate::signaling::SignalingRelay;
use crate::reminder::ReminderService;
use huddle_core::{
    ClientEvent, ConnectionId, IceServerConfig, MAX_CHAT_LENGTH, MediaFlag, MeetingInfo,
    NewChatMessage, PublicUser, RoomId, ServerEvent, SignalKind, TeamId, UserId, UserIdentity,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How many times a join is retried when the room it found shuts down underneath it.
const JOIN_ATTEMPTS: usize = 3;

struct CoordinatorInner {
    registry: Arc<ConnectionRegistry>,
    rooms: RoomManager,
    relay: SignalingRelay,
    fanout: Fanout,
    store: Arc<dyn MeetingStore>,
    verifier: Arc<dyn IdentityVerifier>,
    ice_servers: Vec<IceServerConfig>,
}

/// Entry point for everything a connection does: handshake, client events, disconnect.
///
/// Cheap to clone. Events of one connection must be handed to [`Coordinator::handle`] one at
/// a time, in arrival order.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        verifier: Arc<dyn IdentityVerifier>,
        ice_servers: Vec<IceServerConfig>,
        room_queue_capacity: usize,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            inner: Arc::new(CoordinatorInner {
                rooms: RoomManager::new(registry.clone(), room_queue_capacity),
                relay: SignalingRelay::new(registry.clone()),
                fanout: Fanout::new(registry.clone()),
                registry,
                store,
                verifier,
                ice_servers,
            }),
        }
    }

    /// JWT verification with the configured secret; the REST meeting store when a base url is
    /// set, otherwise an in-memory store preloaded with `store.seed`.
    pub fn from_config(config: &Config) -> std::result::Result<Self, StoreError> {
        let store: Arc<dyn MeetingStore> = match HttpMeetingStore::from_config(&config.store)? {
            Some(store) => {
                info!("Using meeting store at {:?}", config.store.base_url);
                Arc::new(store)
            }
            None => {
                warn!(
                    seeded = config.store.seed.len(),
                    teams = config.store.teams.len(),
                    scheduled = config.store.schedule.len(),
                    "No meeting store configured, using in-memory store"
                );
                let store = InMemoryMeetingStore::new();
                for meeting in &config.store.seed {
                    store.insert(meeting.clone());
                }
                for team in &config.store.teams {
                    store.insert_team(team.clone());
                }
                for meeting in &config.store.schedule {
                    store.schedule(meeting.clone());
                }
                Arc::new(store)
            }
        };

        Ok(Self::new(
            store,
            Arc::new(JwtVerifier::new(&config.auth.jwt_secret)),
            config.ice_servers.clone(),
            config.server.room_queue_capacity,
        ))
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.inner.registry
    }

    pub fn connection_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }

    pub fn current_room(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        self.inner.registry.current_room(connection_id)
    }

    pub async fn room_snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        self.inner.rooms.get(room_id)?.snapshot().await
    }

    pub fn authenticate(&self, token: &str) -> Result<UserIdentity> {
        self.inner.verifier.verify(token).map_err(|e| {
            warn!("Rejected handshake: {}", e);
            CoordinatorError::from(e)
        })
    }

    /// Registers a verified connection and queues `welcome` and `ice-config` on it.
    pub fn connect(
        &self,
        identity: UserIdentity,
    ) -> Result<(ConnectionId, mpsc::UnboundedReceiver<ServerEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = ConnectionId::new();
        let user = identity.public();

        self.inner.registry.register(connection_id, identity, tx)?;
        info!(user = %user.id, "New connection: {}", connection_id);

        self.inner
            .registry
            .send(&connection_id, ServerEvent::Welcome { connection_id, user });
        self.inner.registry.send(
            &connection_id,
            ServerEvent::IceConfig {
                ice_servers: self.inner.ice_servers.clone(),
            },
        );

        Ok((connection_id, rx))
    }

    /// Tears a connection down. Safe to call more than once.
    pub async fn disconnect(&self, connection_id: &ConnectionId) {
        let Some(gone) = self.inner.registry.deregister(connection_id) else {
            return;
        };

        if let Some(room_id) = &gone.room {
            if let Some(room) = self.inner.rooms.get(room_id) {
                room.leave(*connection_id).await;
            }
        }
        info!(user = %gone.identity.id, "Connection closed: {}", connection_id);
    }

    /// Dispatches one client event. Failures go back to the sender as an `error` event.
    pub async fn handle(&self, connection_id: &ConnectionId, event: ClientEvent) {
        if let Err(e) = self.dispatch(connection_id, event).await {
            self.report(connection_id, e);
        }
    }

    async fn dispatch(&self, connection_id: &ConnectionId, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::JoinRoom { room_id } => self.join(connection_id, room_id).await.map(drop),
            ClientEvent::LeaveRoom => {
                self.leave(connection_id).await;
                Ok(())
            }

            ClientEvent::SignalOffer {
                target_connection_id,
                payload,
            } => self.relay(SignalKind::Offer, connection_id, &target_connection_id, payload),
            ClientEvent::SignalAnswer {
                target_connection_id,
                payload,
            } => self.relay(SignalKind::Answer, connection_id, &target_connection_id, payload),
            ClientEvent::SignalIce {
                target_connection_id,
                payload,
            } => self.relay(
                SignalKind::IceCandidate,
                connection_id,
                &target_connection_id,
                payload,
            ),

            ClientEvent::ToggleMute { enabled } => {
                self.set_media(connection_id, MediaFlag::Mute, enabled).await
            }
            ClientEvent::ToggleVideo { enabled } => {
                self.set_media(connection_id, MediaFlag::Video, enabled).await
            }
            ClientEvent::ToggleScreenshare { enabled } => {
                self.set_media(connection_id, MediaFlag::ScreenShare, enabled)
                    .await
            }

            ClientEvent::HostMute {
                room_id,
                target_connection_id,
            } => {
                self.mute_participant(connection_id, &room_id, target_connection_id)
                    .await
            }
            ClientEvent::HostRemove {
                room_id,
                target_connection_id,
            } => {
                self.remove_participant(connection_id, &room_id, target_connection_id)
                    .await
            }
            ClientEvent::HostEnd { room_id } => {
                self.end_room(connection_id, &room_id).await.map(drop)
            }

            ClientEvent::ChatSend {
                content,
                recipient_id,
            } => self.send_chat(connection_id, &content, recipient_id).await,

            ClientEvent::ChatTyping { is_typing } => {
                let user = self.public_user(connection_id)?;
                let event = ServerEvent::UserTyping { user, is_typing };
                self.broadcast_from(connection_id, false, event).await
            }
            ClientEvent::HandRaise { is_raised } => {
                let user = self.public_user(connection_id)?;
                let event = ServerEvent::HandRaised {
                    connection_id: *connection_id,
                    user,
                    is_raised,
                };
                self.broadcast_from(connection_id, false, event).await
            }
            ClientEvent::Reaction { emoji } => {
                let user = self.public_user(connection_id)?;
                self.broadcast_from(connection_id, true, ServerEvent::Reaction { user, emoji })
                    .await
            }
            ClientEvent::RecordingStarted => {
                let user = self.public_user(connection_id)?;
                self.broadcast_from(connection_id, false, ServerEvent::RecordingStarted { user })
                    .await
            }
            ClientEvent::RecordingStopped => {
                let user = self.public_user(connection_id)?;
                self.broadcast_from(connection_id, false, ServerEvent::RecordingStopped { user })
                    .await
            }

            ClientEvent::TeamJoin { team_id } => self.join_team(connection_id, team_id).await,
            ClientEvent::TeamLeave { team_id } => {
                self.leave_team(connection_id, &team_id);
                Ok(())
            }
            ClientEvent::TeamTyping {
                team_id,
                channel_type,
                is_typing,
            } => self.team_typing(connection_id, team_id, channel_type, is_typing),
        }
    }

    fn report(&self, connection_id: &ConnectionId, error: CoordinatorError) {
        match error {
            CoordinatorError::TargetGone => {
                debug!("Dropped event from {}: target gone", connection_id);
            }
            error => {
                warn!("Event from {} failed: {}", connection_id, error);
                self.inner
                    .registry
                    .send(connection_id, ServerEvent::error(error.to_string()));
            }
        }
    }

    fn public_user(&self, connection_id: &ConnectionId) -> Result<PublicUser> {
        self.inner
            .registry
            .public_user(connection_id)
            .ok_or(CoordinatorError::TargetGone)
    }

    fn room_of(&self, connection_id: &ConnectionId) -> Result<RoomHandle> {
        let room_id = self
            .inner
            .registry
            .current_room(connection_id)
            .ok_or(CoordinatorError::NotInRoom)?;
        self.inner
            .rooms
            .get(&room_id)
            .ok_or(CoordinatorError::NotInRoom)
    }

    fn live_room(&self, room_id: &RoomId) -> Result<RoomHandle> {
        self.inner
            .rooms
            .get(room_id)
            .ok_or_else(|| CoordinatorError::RoomNotFound(room_id.clone()))
    }

    /// Meeting metadata for a join. Anything but a joinable meeting fails closed.
    async fn resolve(&self, room_id: &RoomId) -> Result<MeetingInfo> {
        match self.inner.store.resolve_meeting(room_id).await {
            Ok(Some(meeting)) if meeting.status.is_joinable() => Ok(meeting),
            Ok(Some(meeting)) => {
                info!(
                    room = %room_id,
                    status = ?meeting.status,
                    "Join refused: meeting not joinable"
                );
                Err(CoordinatorError::RoomNotFound(room_id.clone()))
            }
            Ok(None) => Err(CoordinatorError::RoomNotFound(room_id.clone())),
            Err(e) => {
                warn!(room = %room_id, "Meeting store lookup failed: {}", e);
                Err(CoordinatorError::RoomNotFound(room_id.clone()))
            }
        }
    }

    pub async fn join(&self, connection_id: &ConnectionId, room_id: RoomId) -> Result<JoinAck> {
        let user = self.public_user(connection_id)?;

        if let Some(current) = self.inner.registry.current_room(connection_id) {
            if current != room_id {
                self.leave(connection_id).await;
            }
        }

        for attempt in 1..=JOIN_ATTEMPTS {
            let since = self.inner.rooms.end_seq();
            let meeting = self.resolve(&room_id).await?;
            let Some(room) = self.inner.rooms.get_or_create(&meeting, since) else {
                debug!(room = %room_id, attempt, "Meeting ended during join, resolving again");
                continue;
            };

            match room.join(*connection_id, user.clone()).await {
                JoinOutcome::Joined(ack) => return Ok(ack),
                JoinOutcome::Rejected(e) => return Err(e),
                JoinOutcome::RoomClosed => {
                    debug!(room = %room_id, attempt, "Room closed during join, retrying");
                }
            }
        }

        warn!(room = %room_id, "Join gave up after {} attempts", JOIN_ATTEMPTS);
        Err(CoordinatorError::RoomNotFound(room_id))
    }

    /// Returns whether the connection was a participant.
    pub async fn leave(&self, connection_id: &ConnectionId) -> bool {
        let Some(room_id) = self.inner.registry.current_room(connection_id) else {
            return false;
        };
        match self.inner.rooms.get(&room_id) {
            Some(room) => room.leave(*connection_id).await,
            None => {
                self.inner.registry.clear_room_if(connection_id, &room_id);
                false
            }
        }
    }

    pub fn relay(
        &self,
        kind: SignalKind,
        from: &ConnectionId,
        target: &ConnectionId,
        payload: Value,
    ) -> Result<()> {
        self.inner.relay.relay(kind, from, target, payload)
    }

    pub async fn set_media(
        &self,
        connection_id: &ConnectionId,
        flag: MediaFlag,
        value: bool,
    ) -> Result<()> {
        self.room_of(connection_id)?
            .set_media(*connection_id, flag, value)
            .await
    }

    fn requester(&self, connection_id: &ConnectionId) -> Result<UserId> {
        Ok(self.public_user(connection_id)?.id)
    }

    pub async fn mute_participant(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        target: ConnectionId,
    ) -> Result<()> {
        let requester = self.requester(connection_id)?;
        self.live_room(room_id)?
            .host_mute(requester, target)
            .await
            .map_err(|e| Self::absent_target(e, target))
    }

    pub async fn remove_participant(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        target: ConnectionId,
    ) -> Result<()> {
        let requester = self.requester(connection_id)?;
        self.live_room(room_id)?
            .host_remove(requester, target)
            .await
            .map_err(|e| Self::absent_target(e, target))
    }

    /// Host actions against a connection that already left are reported back, unlike relay drops.
    fn absent_target(error: CoordinatorError, target: ConnectionId) -> CoordinatorError {
        match error {
            CoordinatorError::TargetGone => CoordinatorError::TargetNotInRoom(target),
            error => error,
        }
    }

    /// Ends the meeting: host check, store write, then eviction of everyone in the room.
    /// Returns the number of participants evicted.
    pub async fn end_room(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<usize> {
        let requester = self.requester(connection_id)?;
        let room = self.live_room(room_id)?;

        room.authorize_end(requester.clone()).await?;
        self.inner.store.mark_ended(room_id).await.map_err(|e| {
            warn!(room = %room_id, "Failed to mark meeting ended: {}", e);
            CoordinatorError::from(e)
        })?;

        let evicted = room.end(requester).await?;
        info!(room = %room_id, evicted, "Room ended");
        Ok(evicted)
    }

    pub async fn send_chat(
        &self,
        connection_id: &ConnectionId,
        content: &str,
        recipient: Option<UserId>,
    ) -> Result<()> {
        let content = content.trim();
        if content.is_empty() || content.chars().count() > MAX_CHAT_LENGTH {
            return Err(CoordinatorError::InvalidMessage(format!(
                "chat message must be 1 to {MAX_CHAT_LENGTH} characters"
            )));
        }

        let room = self.room_of(connection_id)?;
        let sender = room.authorize_chat(*connection_id).await?;

        let message = self
            .inner
            .store
            .save_chat_message(NewChatMessage {
                room_id: room.room_id().clone(),
                sender: sender.clone(),
                content: content.to_owned(),
                recipient: recipient.clone(),
            })
            .await?;
        let event = ServerEvent::ChatMessage(message);

        match recipient {
            Some(recipient) => {
                self.inner.fanout.to_users(&[sender.id, recipient], &event);
                Ok(())
            }
            None => room.deliver(Some(*connection_id), true, event).await,
        }
    }

    async fn broadcast_from(
        &self,
        connection_id: &ConnectionId,
        include_sender: bool,
        event: ServerEvent,
    ) -> Result<()> {
        self.room_of(connection_id)?
            .deliver(Some(*connection_id), include_sender, event)
            .await
    }

    /// Pushes a `notification` to every live connection of `user_id`.
    pub fn notify_user(&self, user_id: &UserId, payload: Value) -> usize {
        let reached = self
            .inner
            .fanout
            .to_users(std::slice::from_ref(user_id), &ServerEvent::Notification(payload));
        debug!(user = %user_id, reached, "Notification delivered");
        reached
    }

    /// Subscribes the connection to a team channel after checking membership in the store.
    pub async fn join_team(&self, connection_id: &ConnectionId, team_id: TeamId) -> Result<()> {
        let user = self.public_user(connection_id)?;

        let team = match self.inner.store.resolve_team(&team_id).await {
            Ok(Some(team)) => team,
            Ok(None) => return Err(CoordinatorError::TeamNotFound(team_id)),
            Err(e) => {
                warn!(team = %team_id, "Team lookup failed: {}", e);
                return Err(CoordinatorError::TeamNotFound(team_id));
            }
        };
        if !team.is_member(&user.id) {
            return Err(CoordinatorError::NotTeamMember);
        }
        if !self.inner.registry.join_team(connection_id, &team_id) {
            return Err(CoordinatorError::TargetGone);
        }

        info!(team = %team_id, user = %user.id, "Joined team channel");
        self.inner.fanout.to_connection(
            connection_id,
            ServerEvent::TeamJoined {
                team_id,
                team_name: team.name,
            },
        );
        Ok(())
    }

    pub fn leave_team(&self, connection_id: &ConnectionId, team_id: &TeamId) -> bool {
        self.inner.registry.leave_team(connection_id, team_id)
    }

    fn team_typing(
        &self,
        connection_id: &ConnectionId,
        team_id: TeamId,
        channel_type: String,
        is_typing: bool,
    ) -> Result<()> {
        if !self.inner.registry.in_team(connection_id, &team_id) {
            return Err(CoordinatorError::NotTeamMember);
        }
        let user = self.public_user(connection_id)?;
        let members = self.inner.registry.team_connections(&team_id);
        let event = ServerEvent::TeamUserTyping {
            team_id,
            user,
            channel_type,
            is_typing,
        };
        self.inner
            .fanout
            .to_members(members.iter(), &event, Some(connection_id));
        Ok(())
    }

    /// Meeting reminder scanner sharing this coordinator's store and connections.
    pub fn reminder_service(&self) -> ReminderService {
        ReminderService::new(self.inner.store.clone(), self.inner.fanout.clone())
    }
}
