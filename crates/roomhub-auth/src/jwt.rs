//! HS256 JWT verification.

use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use roomhub_store::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::{AuthError, Result, TokenVerifier};

/// Clock skew tolerated when checking `exp`, in seconds.
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Registered claims the hub reads from a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The user id, as a decimal string.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
    /// Issued-at, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// Verifies HMAC-SHA256 signed JWTs against a shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Creates a verifier for tokens signed with `secret`.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_leeway(secret, DEFAULT_LEEWAY_SECS)
    }

    /// Creates a verifier with a custom expiry leeway.
    pub fn with_leeway(secret: impl AsRef<[u8]>, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    /// Decodes and validates the token, returning its claims.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<UserId> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let claims = self.decode(token).inspect_err(|e| {
            debug!(error = %e, "Token rejected");
        })?;

        claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::InvalidSubject(claims.sub.clone()))
    }
}

impl fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithm", &"HS256")
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}
