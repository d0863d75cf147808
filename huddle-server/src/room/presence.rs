use huddle_core::{ConnectionId, MediaFlag, MediaState, Participant, PublicUser, UserId};

/// Participants of one room, in join order. Unique by user identity.
#[derive(Debug, Default)]
pub struct PresenceTable {
    participants: Vec<Participant>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn by_user(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.user.id == user_id)
    }

    pub fn by_connection(&self, connection_id: &ConnectionId) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| &p.connection_id == connection_id)
    }

    /// Adds a participant unless the user is already present.
    pub fn insert(
        &mut self,
        user: PublicUser,
        connection_id: ConnectionId,
        media: MediaState,
    ) -> bool {
        if self.by_user(&user.id).is_some() {
            return false;
        }
        self.participants.push(Participant {
            user,
            connection_id,
            media,
        });
        true
    }

    /// Moves a user's entry onto another connection, keeping its flags.
    /// Returns the connection it was bound to before.
    pub fn rebind(
        &mut self,
        user_id: &UserId,
        connection_id: ConnectionId,
    ) -> Option<ConnectionId> {
        let participant = self.participants.iter_mut().find(|p| &p.user.id == user_id)?;
        Some(std::mem::replace(&mut participant.connection_id, connection_id))
    }

    /// Compare-and-remove on the connection id. A second call for the same
    /// connection observes `None`.
    pub fn remove_by_connection(&mut self, connection_id: &ConnectionId) -> Option<Participant> {
        let index = self
            .participants
            .iter()
            .position(|p| &p.connection_id == connection_id)?;
        Some(self.participants.remove(index))
    }

    pub fn set_flag(
        &mut self,
        connection_id: &ConnectionId,
        flag: MediaFlag,
        value: bool,
    ) -> Option<&Participant> {
        let participant = self
            .participants
            .iter_mut()
            .find(|p| &p.connection_id == connection_id)?;
        participant.media.set(flag, value);
        Some(participant)
    }

    pub fn connections(&self) -> impl Iterator<Item = &ConnectionId> {
        self.participants.iter().map(|p| &p.connection_id)
    }

    pub fn list_except(&self, connection_id: &ConnectionId) -> Vec<Participant> {
        self.participants
            .iter()
            .filter(|p| &p.connection_id != connection_id)
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> Vec<Participant> {
        self.participants.clone()
    }

    pub fn drain(&mut self) -> Vec<Participant> {
        std::mem::take(&mut self.participants)
    }
}
