//! In-memory storage for chat data.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::{
    ChatStore, Mention, Message, MessageId, ReadReceipt, Result, RoomId, StoreError, UserId,
};

/// In-memory chat store.
///
/// Thread-safe storage for messages, receipts, mentions, the user directory
/// and room membership. Unique-pair tables are sets, so repeated inserts are
/// naturally idempotent.
#[derive(Default)]
pub struct MemoryStore {
    /// Messages indexed by id.
    messages: RwLock<HashMap<MessageId, Message>>,
    /// Read receipts, one per (message, reader).
    receipts: RwLock<BTreeSet<ReadReceipt>>,
    /// Mentions, one per (message, mentioned user).
    mentions: RwLock<BTreeSet<Mention>>,
    /// Username directory.
    users: RwLock<HashMap<String, UserId>>,
    /// Room membership.
    members: RwLock<HashMap<RoomId, HashSet<UserId>>>,
    /// Counter for message ids.
    next_message_id: AtomicU64,
    /// Counter for user ids.
    next_user_id: AtomicU64,
    /// When set, every call fails with `StoreError::Unavailable`.
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_message_id(&self) -> MessageId {
        MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store switched offline".to_string(),
            ));
        }
        Ok(())
    }

    /// Simulates a backend outage. Used by failure-injection tests.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    // ==================== Directory ====================

    /// Registers a username and returns its id. Re-adding a name returns the
    /// existing id.
    pub fn add_user(&self, username: &str) -> UserId {
        let mut users = self.users.write();
        if let Some(id) = users.get(username) {
            return *id;
        }
        let id = UserId(self.next_user_id.fetch_add(1, Ordering::SeqCst) + 1);
        users.insert(username.to_string(), id);
        id
    }

    /// Registers a username under a caller-chosen id.
    pub fn add_user_with_id(&self, username: &str, id: UserId) {
        self.users.write().insert(username.to_string(), id);
        self.next_user_id.fetch_max(id.0, Ordering::SeqCst);
    }

    /// Adds a user to a room.
    pub fn add_member(&self, room_id: RoomId, user_id: UserId) {
        self.members
            .write()
            .entry(room_id)
            .or_default()
            .insert(user_id);
    }

    // ==================== Inspection ====================

    /// Number of stored messages.
    pub fn message_count(&self) -> usize {
        self.messages.read().len()
    }

    /// Number of stored read receipts.
    pub fn receipt_count(&self) -> usize {
        self.receipts.read().len()
    }

    /// Returns true if the receipt exists.
    pub fn has_receipt(&self, message_id: MessageId, user_id: UserId) -> bool {
        self.receipts.read().contains(&ReadReceipt {
            message_id,
            user_id,
        })
    }

    /// Mentions recorded for a message.
    pub fn mentions_of(&self, message_id: MessageId) -> Vec<UserId> {
        self.mentions
            .read()
            .iter()
            .filter(|m| m.message_id == message_id)
            .map(|m| m.user_id)
            .collect()
    }

    /// Messages in a room visible to `viewer`, oldest first.
    #[cfg(test)]
    pub(crate) fn list_messages(&self, room_id: RoomId, viewer: UserId) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .read()
            .values()
            .filter(|m| m.room_id == room_id && !m.is_hidden_for(viewer))
            .cloned()
            .collect();
        messages.sort_by_key(|m| (m.created_at, m.id));
        messages
    }

    /// Applies `f` to a message owned by `caller`.
    fn update_owned<F>(&self, id: MessageId, caller: UserId, f: F) -> Result<Message>
    where
        F: FnOnce(&mut Message) -> Result<()>,
    {
        let mut messages = self.messages.write();
        let message = messages
            .get_mut(&id)
            .ok_or(StoreError::MessageNotFound { id })?;

        if message.sender_id != caller {
            return Err(StoreError::NotOwner {
                id,
                user_id: caller,
            });
        }

        f(message)?;
        Ok(message.clone())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn create_message(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        content: &str,
    ) -> Result<Message> {
        self.check_available()?;

        let mut message = Message::new(room_id, sender_id, content);
        message.id = self.next_message_id();
        self.messages.write().insert(message.id, message.clone());
        Ok(message)
    }

    async fn get_message(&self, id: MessageId) -> Result<Message> {
        self.check_available()?;
        self.messages
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::MessageNotFound { id })
    }

    async fn update_message_content(
        &self,
        id: MessageId,
        caller: UserId,
        content: &str,
    ) -> Result<Message> {
        self.check_available()?;
        self.update_owned(id, caller, |message| {
            if message.is_deleted {
                return Err(StoreError::MessageDeleted { id });
            }
            message.edit(content);
            Ok(())
        })
    }

    async fn soft_delete_message(&self, id: MessageId, caller: UserId) -> Result<Message> {
        self.check_available()?;
        self.update_owned(id, caller, |message| {
            message.soft_delete();
            Ok(())
        })
    }

    async fn hide_message_for_user(&self, id: MessageId, user_id: UserId) -> Result<Message> {
        self.check_available()?;
        let mut messages = self.messages.write();
        let message = messages
            .get_mut(&id)
            .ok_or(StoreError::MessageNotFound { id })?;
        message.hide_for(user_id);
        Ok(message.clone())
    }

    async fn insert_read_receipt(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        self.check_available()?;
        if !self.messages.read().contains_key(&message_id) {
            return Err(StoreError::MessageNotFound { id: message_id });
        }
        Ok(self.receipts.write().insert(ReadReceipt {
            message_id,
            user_id,
        }))
    }

    async fn read_by(&self, message_id: MessageId) -> Result<Vec<UserId>> {
        self.check_available()?;
        Ok(self
            .receipts
            .read()
            .iter()
            .filter(|r| r.message_id == message_id)
            .map(|r| r.user_id)
            .collect())
    }

    async fn resolve_username(&self, username: &str) -> Result<Option<UserId>> {
        self.check_available()?;
        Ok(self.users.read().get(username).copied())
    }

    async fn insert_mention(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        self.check_available()?;
        if !self.messages.read().contains_key(&message_id) {
            return Err(StoreError::MessageNotFound { id: message_id });
        }
        Ok(self.mentions.write().insert(Mention {
            message_id,
            user_id,
        }))
    }

    async fn is_room_member(&self, room_id: RoomId, user_id: UserId) -> Result<bool> {
        self.check_available()?;
        Ok(self
            .members
            .read()
            .get(&room_id)
            .is_some_and(|members| members.contains(&user_id)))
    }
}
