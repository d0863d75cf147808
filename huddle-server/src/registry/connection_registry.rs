use crate::error::{CoordinatorError, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use huddle_core::{
    ConnectionId, PublicUser, RoomId, ServerEvent, TeamId, UserId, UserIdentity,
};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::debug;

pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

struct ConnectionEntry {
    identity: UserIdentity,
    outbound: Outbound,
    room: Option<RoomId>,
    teams: HashSet<TeamId>,
}

/// What is left of a connection once it has been deregistered.
#[derive(Debug, Clone)]
pub struct DeregisteredConnection {
    pub identity: UserIdentity,
    pub room: Option<RoomId>,
}

/// Process-wide map of live connections, of each user's connections and of team channel
/// subscribers.
///
/// Rooms hold only `ConnectionId`s; this registry is the sole owner of the outbound queues.
/// Lock order is `connections` before `by_team`.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
    by_user: DashMap<UserId, HashSet<ConnectionId>>,
    by_team: DashMap<TeamId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        connection_id: ConnectionId,
        identity: UserIdentity,
        outbound: Outbound,
    ) -> Result<()> {
        let user_id = identity.id.clone();

        match self.connections.entry(connection_id) {
            Entry::Occupied(_) => return Err(CoordinatorError::DuplicateConnection(connection_id)),
            Entry::Vacant(slot) => {
                slot.insert(ConnectionEntry {
                    identity,
                    outbound,
                    room: None,
                    teams: HashSet::new(),
                });
            }
        }

        self.by_user
            .entry(user_id)
            .or_default()
            .insert(connection_id);
        Ok(())
    }

    /// Remove a connection. Returns its identity and the room it was in, if any.
    ///
    /// The room is captured atomically with the removal, so a concurrent join either
    /// lands before (and is reported here) or fails to bind the connection.
    pub fn deregister(&self, connection_id: &ConnectionId) -> Option<DeregisteredConnection> {
        let (_, entry) = self.connections.remove(connection_id)?;
        let user_id = entry.identity.id.clone();

        if let Some(mut set) = self.by_user.get_mut(&user_id) {
            set.remove(connection_id);
        }
        self.by_user.remove_if(&user_id, |_, set| set.is_empty());
        for team_id in &entry.teams {
            self.drop_team_member(team_id, connection_id);
        }

        Some(DeregisteredConnection {
            identity: entry.identity,
            room: entry.room,
        })
    }

    pub fn lookup(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.by_user
            .get(user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn public_user(&self, connection_id: &ConnectionId) -> Option<PublicUser> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.identity.public())
    }

    pub fn current_room(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        self.connections
            .get(connection_id)
            .and_then(|entry| entry.room.clone())
    }

    /// Bind a connection to a room. Returns `false` if the connection is gone.
    pub fn set_room(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut entry) => {
                entry.room = Some(room_id.clone());
                true
            }
            None => false,
        }
    }

    /// Unbind a connection, but only if it is still bound to `room_id`.
    pub fn clear_room_if(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        let Some(mut entry) = self.connections.get_mut(connection_id) else {
            return false;
        };
        if entry.room.as_ref() != Some(room_id) {
            return false;
        }
        entry.room = None;
        true
    }

    /// Subscribe a connection to a team channel. Returns `false` if the connection is gone.
    pub fn join_team(&self, connection_id: &ConnectionId, team_id: &TeamId) -> bool {
        let Some(mut entry) = self.connections.get_mut(connection_id) else {
            return false;
        };
        entry.teams.insert(team_id.clone());
        self.by_team
            .entry(team_id.clone())
            .or_default()
            .insert(*connection_id);
        true
    }

    /// Returns whether the connection was subscribed.
    pub fn leave_team(&self, connection_id: &ConnectionId, team_id: &TeamId) -> bool {
        let Some(mut entry) = self.connections.get_mut(connection_id) else {
            return false;
        };
        if !entry.teams.remove(team_id) {
            return false;
        }
        self.drop_team_member(team_id, connection_id);
        true
    }

    pub fn in_team(&self, connection_id: &ConnectionId, team_id: &TeamId) -> bool {
        self.connections
            .get(connection_id)
            .is_some_and(|entry| entry.teams.contains(team_id))
    }

    pub fn team_connections(&self, team_id: &TeamId) -> Vec<ConnectionId> {
        self.by_team
            .get(team_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn drop_team_member(&self, team_id: &TeamId, connection_id: &ConnectionId) {
        if let Some(mut set) = self.by_team.get_mut(team_id) {
            set.remove(connection_id);
        }
        self.by_team.remove_if(team_id, |_, set| set.is_empty());
    }

    /// Queue an event for one connection. Never blocks.
    pub fn send(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        let Some(entry) = self.connections.get(connection_id) else {
            debug!("Dropping event for unknown connection {}", connection_id);
            return false;
        };
        if entry.outbound.send(event).is_err() {
            debug!("Outbound queue closed for connection {}", connection_id);
            return false;
        }
        true
    }

    /// Deliver to every live connection of a user. Returns how many were reached.
    pub fn send_to_user(&self, user_id: &UserId, event: &ServerEvent) -> usize {
        self.lookup(user_id)
            .into_iter()
            .filter(|id| self.send(id, event.clone()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
