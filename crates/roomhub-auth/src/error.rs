//! Error types for the auth crate.

use roomhub_store::{RoomId, UserId};
use thiserror::Error;

/// Reasons a connection handshake is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token was supplied.
    #[error("missing token")]
    MissingToken,

    /// No room identifier was supplied.
    #[error("missing room_id")]
    MissingRoom,

    /// The room identifier is not a positive integer.
    #[error("invalid room_id: {0}")]
    InvalidRoom(String),

    /// The token is malformed or its signature does not verify.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token's expiry is in the past.
    #[error("token expired")]
    Expired,

    /// The token's subject is not a user id.
    #[error("invalid token subject: {0}")]
    InvalidSubject(String),

    /// The user is authenticated but does not belong to the room.
    #[error("user {user_id} is not a member of room {room_id}")]
    NotRoomMember { room_id: RoomId, user_id: UserId },
}

impl AuthError {
    /// Returns true when the caller is known but not allowed in.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthError::NotRoomMember { .. })
    }
}
