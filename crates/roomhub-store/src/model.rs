//! Chat domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a chat room (direct or group).
    RoomId
);
numeric_id!(
    /// Identifier of a registered user.
    UserId
);
numeric_id!(
    /// Identifier of a stored message, assigned by the store.
    MessageId
);

/// A chat message as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned identifier.
    pub id: MessageId,
    /// Room the message was posted to.
    pub room_id: RoomId,
    /// Author.
    pub sender_id: UserId,
    /// Current text. Kept after a soft delete.
    pub content: String,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
    /// When the content was last changed, if ever.
    pub edited_at: Option<DateTime<Utc>>,
    /// Soft-delete marker. Never goes back to false.
    pub is_deleted: bool,
    /// Users who hid this message from their own view.
    #[serde(default)]
    pub hidden_for: BTreeSet<UserId>,
}

impl Message {
    /// Creates a new, unsaved message. The store assigns the id.
    pub fn new(room_id: RoomId, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            id: MessageId(0),
            room_id,
            sender_id,
            content: content.into(),
            created_at: Utc::now(),
            edited_at: None,
            is_deleted: false,
            hidden_for: BTreeSet::new(),
        }
    }

    /// Returns true if the content was changed after creation.
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// Replaces the content and stamps the edit time.
    pub fn edit(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.edited_at = Some(Utc::now());
    }

    /// Marks the message deleted. Returns false if it already was.
    pub fn soft_delete(&mut self) -> bool {
        let changed = !self.is_deleted;
        self.is_deleted = true;
        changed
    }

    /// Hides the message for one user. Returns false if already hidden.
    pub fn hide_for(&mut self, user_id: UserId) -> bool {
        self.hidden_for.insert(user_id)
    }

    /// Returns true if `user_id` hid this message.
    pub fn is_hidden_for(&self, user_id: UserId) -> bool {
        self.hidden_for.contains(&user_id)
    }

    /// Builds the client-facing projection.
    pub fn view(&self, read_by: Vec<UserId>) -> MessageView {
        MessageView {
            id: self.id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            content: self.content.clone(),
            created_at: self.created_at,
            edited: self.is_edited(),
            is_deleted: self.is_deleted,
            read_by,
        }
    }
}

/// The shape of a message as clients see it on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited: bool,
    pub is_deleted: bool,
    pub read_by: Vec<UserId>,
}

/// A message marked read by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub message_id: MessageId,
    pub user_id: UserId,
}

/// A message that referenced a user with an `@name` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Mention {
    pub message_id: MessageId,
    pub user_id: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_is_pristine() {
        let msg = Message::new(RoomId(7), UserId(1), "hello");
        assert!(!msg.is_edited());
        assert!(!msg.is_deleted);
        assert!(msg.hidden_for.is_empty());
    }

    #[test]
    fn test_edit_sets_marker() {
        let mut msg = Message::new(RoomId(7), UserId(1), "hello");
        msg.edit("hello again");
        assert_eq!(msg.content, "hello again");
        assert!(msg.is_edited());
    }

    #[test]
    fn test_soft_delete_is_monotonic() {
        let mut msg = Message::new(RoomId(7), UserId(1), "hello");
        assert!(msg.soft_delete());
        assert!(!msg.soft_delete());
        assert!(msg.is_deleted);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn test_hide_for_is_idempotent() {
        let mut msg = Message::new(RoomId(7), UserId(1), "hello");
        assert!(msg.hide_for(UserId(2)));
        assert!(!msg.hide_for(UserId(2)));
        assert!(msg.is_hidden_for(UserId(2)));
        assert!(!msg.is_hidden_for(UserId(1)));
    }

    #[test]
    fn test_view_serialization() {
        let mut msg = Message::new(RoomId(7), UserId(1), "hello");
        msg.id = MessageId(42);
        let json = serde_json::to_value(msg.view(vec![UserId(3)])).unwrap();

        assert_eq!(json["id"], 42);
        assert_eq!(json["room_id"], 7);
        assert_eq!(json["sender_id"], 1);
        assert_eq!(json["content"], "hello");
        assert_eq!(json["edited"], false);
        assert_eq!(json["is_deleted"], false);
        assert_eq!(json["read_by"], serde_json::json!([3]));
        assert!(json["created_at"].is_string());
    }

    #[test]
    fn test_id_parse() {
        assert_eq!("7".parse::<RoomId>().unwrap(), RoomId(7));
        assert_eq!(" 12 ".parse::<UserId>().unwrap(), UserId(12));
        assert!("abc".parse::<RoomId>().is_err());
        assert!("-1".parse::<RoomId>().is_err());
    }
}
