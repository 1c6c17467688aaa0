//! Player identity: salted ids and signed bearer tokens

use crate::error::{MatchmakingError, Result};
use crate::types::PlayerId;
use crate::utils::{current_timestamp, salted_hash};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Tokens are valid for one day unless configured otherwise
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Verified payload of a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: PlayerId,
    /// Expiry, unix seconds
    pub exp: u64,
}

/// Body returned by `/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginGrant {
    pub id: PlayerId,
    pub token: String,
}

/// Derives player ids and issues and verifies HS256 tokens
pub struct IdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    salt: String,
    token_ttl: Duration,
}

impl IdentityProvider {
    pub fn new(secret: &str, salt: impl Into<String>, token_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            salt: salt.into(),
            token_ttl,
        }
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// One-way id for a raw external identity
    pub fn player_id(&self, raw: &str) -> PlayerId {
        salted_hash(raw, &self.salt)
    }

    pub fn issue_token(&self, player_id: &str) -> Result<String> {
        let exp = current_timestamp().timestamp().max(0) as u64 + self.token_ttl.as_secs();
        self.issue_token_expiring_at(player_id, exp)
    }

    pub fn issue_token_expiring_at(&self, player_id: &str, exp: u64) -> Result<String> {
        let claims = Claims {
            id: player_id.to_string(),
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to sign token: {}", e),
            }
        })
    }

    /// Check signature and expiry. Fails closed.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => {
                debug!("Rejected bearer token: {}", e);
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "token expired",
                    ErrorKind::InvalidSignature => "invalid token signature",
                    _ => "invalid token",
                };
                Err(MatchmakingError::unauthorized(reason))
            }
        }
    }

    /// Hash the raw identity and issue a token for it
    pub fn login(&self, raw: &str) -> Result<LoginGrant> {
        let id = self.player_id(raw);
        let token = self.issue_token(&id)?;
        Ok(LoginGrant { id, token })
    }
}

impl fmt::Debug for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProvider")
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}
