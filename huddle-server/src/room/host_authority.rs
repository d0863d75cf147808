use crate::error::{CoordinatorError, Result};
use huddle_core::UserId;
use tracing::warn;

/// The host identity cached when a room is created.
///
/// Host status is always derived by comparing against this value; participants never
/// carry a host flag of their own.
#[derive(Debug, Clone)]
pub struct HostAuthority {
    host: UserId,
}

impl HostAuthority {
    pub fn new(host: UserId) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &UserId {
        &self.host
    }

    pub fn is_host(&self, user_id: &UserId) -> bool {
        &self.host == user_id
    }

    /// Gate for mute-other, remove-other and end-meeting.
    pub fn authorize(&self, requester: &UserId) -> Result<()> {
        if self.is_host(requester) {
            return Ok(());
        }
        warn!("User {} attempted a host action (host is {})", requester, self.host);
        Err(CoordinatorError::NotHost)
    }
}
