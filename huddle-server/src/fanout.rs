use crate::registry::ConnectionRegistry;
use huddle_core::{ConnectionId, ServerEvent, UserId};
use std::collections::HashSet;
use std::sync::Arc;

/// Delivers events to room members or to users on all their connections.
///
/// Fire-and-forget: a recipient whose connection is gone is skipped without affecting
/// the others.
#[derive(Clone)]
pub struct Fanout {
    registry: Arc<ConnectionRegistry>,
}

impl Fanout {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn to_connection(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        self.registry.send(connection_id, event)
    }

    /// Room broadcast. Returns the number of connections reached.
    pub fn to_members<'a, I>(
        &self,
        members: I,
        event: &ServerEvent,
        except: Option<&ConnectionId>,
    ) -> usize
    where
        I: IntoIterator<Item = &'a ConnectionId>,
    {
        members
            .into_iter()
            .filter(|id| Some(*id) != except)
            .filter(|id| self.registry.send(id, event.clone()))
            .count()
    }

    /// Targeted delivery to every connection of each listed user.
    pub fn to_users(&self, users: &[UserId], event: &ServerEvent) -> usize {
        let unique: HashSet<&UserId> = users.iter().collect();
        unique
            .into_iter()
            .map(|user| self.registry.send_to_user(user, event))
            .sum()
    }
}
