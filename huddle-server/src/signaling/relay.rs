use crate::error::{CoordinatorError, Result};
use crate::registry::ConnectionRegistry;
use huddle_core::{ConnectionId, ServerEvent, SignalKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Forwards WebRTC negotiation payloads between two connections of the same room.
///
/// Payloads are opaque. The sender's connection id and public identity are attached here,
/// from the registry, so a client cannot claim to be someone else.
#[derive(Clone)]
pub struct SignalingRelay {
    registry: Arc<ConnectionRegistry>,
}

impl SignalingRelay {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn relay(
        &self,
        kind: SignalKind,
        from: &ConnectionId,
        target: &ConnectionId,
        payload: Value,
    ) -> Result<()> {
        let room = self.registry.current_room(from);
        if room.is_none() || self.registry.current_room(target) != room {
            debug!(?kind, "Dropping signal from {} to {}: not in the same room", from, target);
            return Err(CoordinatorError::TargetGone);
        }
        let from_user = self
            .registry
            .public_user(from)
            .ok_or(CoordinatorError::TargetGone)?;

        let event = ServerEvent::signal(kind, *from, from_user, payload);
        if !self.registry.send(target, event) {
            return Err(CoordinatorError::TargetGone);
        }
        Ok(())
    }
}
