//! The persistence interface consumed by the real-time hub.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{Message, MessageId, Result, RoomId, UserId};

/// Durable storage for chat state.
///
/// Implementations must be safe to call from many connection tasks at once.
/// Inserts of receipts, mentions and hides are idempotent: repeating one is a
/// no-op, not an error.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persists a new message and returns it with its assigned id and
    /// creation time.
    async fn create_message(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        content: &str,
    ) -> Result<Message>;

    /// Fetches a message by id.
    async fn get_message(&self, id: MessageId) -> Result<Message>;

    /// Replaces the content of a message owned by `caller` and stamps
    /// `edited_at`.
    async fn update_message_content(
        &self,
        id: MessageId,
        caller: UserId,
        content: &str,
    ) -> Result<Message>;

    /// Soft-deletes a message owned by `caller`. Deleting twice succeeds.
    async fn soft_delete_message(&self, id: MessageId, caller: UserId) -> Result<Message>;

    /// Hides a message for one user.
    async fn hide_message_for_user(&self, id: MessageId, user_id: UserId) -> Result<Message>;

    /// Records that `user_id` read a message. Returns false if the receipt
    /// already existed.
    async fn insert_read_receipt(&self, message_id: MessageId, user_id: UserId) -> Result<bool>;

    /// Readers of a message, in ascending id order.
    async fn read_by(&self, message_id: MessageId) -> Result<Vec<UserId>>;

    /// Looks a username up in the user directory.
    async fn resolve_username(&self, username: &str) -> Result<Option<UserId>>;

    /// Records that a message mentions a user. Returns false if the mention
    /// already existed.
    async fn insert_mention(&self, message_id: MessageId, user_id: UserId) -> Result<bool>;

    /// Returns true if the user belongs to the room.
    async fn is_room_member(&self, room_id: RoomId, user_id: UserId) -> Result<bool>;
}

#[async_trait]
impl<T: ChatStore + ?Sized> ChatStore for Arc<T> {
    async fn create_message(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        content: &str,
    ) -> Result<Message> {
        (**self).create_message(room_id, sender_id, content).await
    }

    async fn get_message(&self, id: MessageId) -> Result<Message> {
        (**self).get_message(id).await
    }

    async fn update_message_content(
        &self,
        id: MessageId,
        caller: UserId,
        content: &str,
    ) -> Result<Message> {
        (**self).update_message_content(id, caller, content).await
    }

    async fn soft_delete_message(&self, id: MessageId, caller: UserId) -> Result<Message> {
        (**self).soft_delete_message(id, caller).await
    }

    async fn hide_message_for_user(&self, id: MessageId, user_id: UserId) -> Result<Message> {
        (**self).hide_message_for_user(id, user_id).await
    }

    async fn insert_read_receipt(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        (**self).insert_read_receipt(message_id, user_id).await
    }

    async fn read_by(&self, message_id: MessageId) -> Result<Vec<UserId>> {
        (**self).read_by(message_id).await
    }

    async fn resolve_username(&self, username: &str) -> Result<Option<UserId>> {
        (**self).resolve_username(username).await
    }

    async fn insert_mention(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        (**self).insert_mention(message_id, user_id).await
    }

    async fn is_room_member(&self, room_id: RoomId, user_id: UserId) -> Result<bool> {
        (**self).is_room_member(room_id, user_id).await
    }
}
