//! Bearer token verification for roomhub.
//!
//! The hub accepts a token at connection time and needs exactly one answer
//! from it: which user is this. [`TokenVerifier`] is that seam, and
//! [`JwtVerifier`] is the HS256 implementation used by the node. Key
//! material is passed in at construction, so tests and deployments can use
//! different secrets side by side.
//!
//! # Example
//!
//! ```
//! use roomhub_auth::{AuthError, JwtVerifier, TokenVerifier};
//!
//! let verifier = JwtVerifier::new(b"dev-secret");
//! assert!(matches!(
//!     verifier.verify("not-a-jwt"),
//!     Err(AuthError::InvalidToken(_))
//! ));
//! ```

mod error;
mod jwt;

pub use error::AuthError;
pub use jwt::{Claims, JwtVerifier, DEFAULT_LEEWAY_SECS};

use roomhub_store::UserId;
use std::sync::Arc;

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Turns a bearer token into the user it was issued to.
pub trait TokenVerifier: Send + Sync {
    /// Verifies the token and returns its subject.
    fn verify(&self, token: &str) -> Result<UserId>;
}

impl<T: TokenVerifier + ?Sized> TokenVerifier for Arc<T> {
    fn verify(&self, token: &str) -> Result<UserId> {
        (**self).verify(token)
    }
}
