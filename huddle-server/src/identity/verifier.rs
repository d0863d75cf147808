use crate::error::AuthError;
use huddle_core::UserIdentity;

/// Turns the credential presented at the handshake into a verified identity.
///
/// Called once per connection, before the transport is upgraded.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<UserIdentity, AuthError>;
}
