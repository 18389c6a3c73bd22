//! Error types for store operations.

use thiserror::Error;

use crate::{MessageId, UserId};

/// Errors returned by a [`ChatStore`](crate::ChatStore).
///
/// The first three variants describe the request (the row is missing, or the
/// caller may not touch it). `Unavailable` describes the backend itself.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Message not found.
    #[error("message not found: {id}")]
    MessageNotFound { id: MessageId },

    /// Caller is not the author of the message.
    #[error("user {user_id} does not own message {id}")]
    NotOwner { id: MessageId, user_id: UserId },

    /// Message was soft-deleted and can no longer be edited.
    #[error("message is deleted: {id}")]
    MessageDeleted { id: MessageId },

    /// The backend could not complete the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true for failures of the backend rather than of the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
