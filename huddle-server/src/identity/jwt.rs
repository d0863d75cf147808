use crate::error::AuthError;
use crate::identity::IdentityVerifier;
use chrono::{Duration, Utc};
use huddle_core::{UserId, UserIdentity};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Expiration (unix seconds).
    pub exp: i64,
}

impl Claims {
    pub fn new(identity: &UserIdentity, ttl_seconds: i64) -> Self {
        Self {
            sub: identity.id.to_string(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            avatar: identity.avatar.clone(),
            exp: (Utc::now() + Duration::seconds(ttl_seconds)).timestamp(),
        }
    }

    fn into_identity(self) -> UserIdentity {
        UserIdentity {
            id: UserId::from(self.sub),
            name: self.name,
            email: self.email,
            avatar: self.avatar,
        }
    }
}

/// HS256 verifier for session tokens signed with a shared secret.
pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;

        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Signs a token for `identity`. Used by tooling and tests.
    pub fn issue(&self, identity: &UserIdentity, ttl_seconds: i64) -> Result<String, AuthError> {
        self.issue_claims(&Claims::new(identity, ttl_seconds))
    }

    pub fn issue_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| AuthError::Malformed(e.to_string()))
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Malformed(e.to_string()),
            }
        })?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::Malformed("empty subject".into()));
        }
        Ok(data.claims.into_identity())
    }
}
