//! Wire events exchanged with clients.
//!
//! Every frame is a JSON object tagged by a `type` field. Inbound frames are
//! decoded in two steps: the tag is read first, so an unknown type and a bad
//! payload for a known type are reported as different errors.

use roomhub_store::{MessageId, MessageView, RoomId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Inbound `type` tags the hub understands, including aliases.
const KNOWN_TYPES: &[&str] = &[
    "message",
    "send_message",
    "edit_message",
    "delete_message",
    "hide_message",
    "message_read",
    "read_receipt",
    "ping",
];

/// Events a client may send over its connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Post a new message to the session's room.
    #[serde(rename = "message", alias = "send_message")]
    SendMessage {
        #[serde(default)]
        room_id: Option<RoomId>,
        content: String,
    },
    /// Replace the text of one of the caller's messages.
    EditMessage {
        message_id: MessageId,
        content: String,
    },
    /// Soft-delete one of the caller's messages.
    DeleteMessage { message_id: MessageId },
    /// Hide a message from the caller's own view.
    HideMessage { message_id: MessageId },
    /// Mark a message read by the caller.
    #[serde(rename = "message_read", alias = "read_receipt")]
    ReadReceipt {
        message_id: MessageId,
        #[serde(default)]
        user_id: Option<UserId>,
    },
    /// Keepalive.
    Ping,
}

impl InboundEvent {
    /// Decodes one text frame.
    pub fn decode(text: &str) -> Result<Self, ValidationError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(ValidationError::MissingType)?
            .to_string();

        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Err(ValidationError::UnknownEvent(kind));
        }

        serde_json::from_value(value).map_err(|e| ValidationError::MalformedPayload {
            kind,
            reason: e.to_string(),
        })
    }

    /// The canonical tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::SendMessage { .. } => "message",
            InboundEvent::EditMessage { .. } => "edit_message",
            InboundEvent::DeleteMessage { .. } => "delete_message",
            InboundEvent::HideMessage { .. } => "hide_message",
            InboundEvent::ReadReceipt { .. } => "message_read",
            InboundEvent::Ping => "ping",
        }
    }
}

/// Events the hub sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// A new message, sent to everyone in the room except its author.
    Message(MessageView),
    /// The stored form of the author's own message, sent only to the author.
    MessageAck(MessageView),
    /// An edited message, sent to everyone in the room.
    EditMessage { message: MessageView },
    /// A message was soft-deleted.
    DeleteMessage {
        message_id: MessageId,
        room_id: RoomId,
    },
    /// A user hid a message from their view.
    HideMessage {
        message_id: MessageId,
        user_id: UserId,
        room_id: RoomId,
    },
    /// A user read a message.
    MessageRead {
        message_id: MessageId,
        user_id: UserId,
        room_id: RoomId,
    },
    /// A message mentioned a user.
    Mention {
        room_id: RoomId,
        message_id: MessageId,
        sender_id: UserId,
        mentioned_user_id: UserId,
        content: String,
    },
    /// Keepalive reply.
    Pong,
    /// The caller's last event was dropped.
    Error { code: String, message: String },
}

impl OutboundEvent {
    /// Serializes the event to a text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
