//! Error types for the real-time hub.

use roomhub_auth::AuthError;
use roomhub_store::{MessageId, RoomId, StoreError, UserId};
use thiserror::Error;

/// Errors that can occur in real-time operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Handshake credentials were missing or rejected.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// An inbound event was malformed or not allowed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The store failed; the event was dropped.
    #[error("storage error: {0}")]
    Storage(StoreError),

    /// Reading from or writing to a connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The hub is at its connection limit.
    #[error("connection limit reached: max {0} sessions")]
    CapacityReached(usize),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why an inbound event was refused. None of these close the connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The frame is not a JSON object.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The object has no string `type` field.
    #[error("event has no type")]
    MissingType,

    /// The `type` is not one the hub handles.
    #[error("unknown event type: {0}")]
    UnknownEvent(String),

    /// The `type` is known but its fields do not fit.
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: String, reason: String },

    /// Message text is empty after trimming.
    #[error("message content is empty")]
    EmptyContent,

    /// Message text is longer than allowed.
    #[error("message content exceeds {max} characters")]
    ContentTooLong { max: usize },

    /// The event names a different room than the session is bound to.
    #[error("event targets room {got}, session is bound to room {expected}")]
    RoomMismatch { expected: RoomId, got: RoomId },

    /// The event claims to act for a different user than the session.
    #[error("event claims user {got}, session is user {expected}")]
    IdentityMismatch { expected: UserId, got: UserId },

    /// Message not found.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// Message belongs to another room.
    #[error("message {0} is not in this room")]
    WrongRoom(MessageId),

    /// Only the author may edit or delete.
    #[error("user {user_id} does not own message {message_id}")]
    NotOwner {
        message_id: MessageId,
        user_id: UserId,
    },

    /// Deleted messages cannot be edited.
    #[error("message is deleted: {0}")]
    MessageDeleted(MessageId),
}

/// Coarse classification used for logging and close decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Validation,
    Storage,
    Transport,
}

impl RealtimeError {
    /// Returns the error's class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RealtimeError::Authentication(_) => ErrorKind::Authentication,
            RealtimeError::Validation(_) => ErrorKind::Validation,
            RealtimeError::Storage(_) | RealtimeError::CapacityReached(_) => ErrorKind::Storage,
            RealtimeError::Transport(_) | RealtimeError::Serialization(_) => ErrorKind::Transport,
        }
    }

    /// Short machine-readable code sent to clients in `error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            RealtimeError::Authentication(_) => "unauthorized",
            RealtimeError::Validation(_) => "invalid_event",
            RealtimeError::Storage(_) => "storage_unavailable",
            RealtimeError::Transport(_) => "transport",
            RealtimeError::CapacityReached(_) => "capacity",
            RealtimeError::Serialization(_) => "serialization",
        }
    }
}

impl From<StoreError> for RealtimeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MessageNotFound { id } => ValidationError::MessageNotFound(id).into(),
            StoreError::NotOwner { id, user_id } => ValidationError::NotOwner {
                message_id: id,
                user_id,
            }
            .into(),
            StoreError::MessageDeleted { id } => ValidationError::MessageDeleted(id).into(),
            StoreError::Unavailable(_) => RealtimeError::Storage(err),
        }
    }
}
