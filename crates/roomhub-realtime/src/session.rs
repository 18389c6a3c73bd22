//! Live connection handles.

use roomhub_store::{RoomId, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::RealtimeError;

/// Unique identifier for a connected session.
pub type SessionId = String;

/// Handle for receiving the frames queued for one session.
pub type SessionReceiver = mpsc::UnboundedReceiver<String>;

/// One authenticated connection bound to one room.
///
/// Identity and room are fixed at handshake time. Sending only enqueues onto
/// the session's outbound channel, so it never blocks and is safe to call
/// while the registry is being mutated elsewhere.
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// Authenticated user.
    pub user_id: UserId,
    /// Room this session is tied to.
    pub room_id: RoomId,
    /// When the session was created (Unix timestamp).
    pub connected_at: u64,
    sender: mpsc::UnboundedSender<String>,
}

impl Session {
    /// Creates a session with a fresh id and its receiver.
    pub fn open(user_id: UserId, room_id: RoomId) -> (Arc<Session>, SessionReceiver) {
        Self::with_id(uuid::Uuid::new_v4().to_string(), user_id, room_id)
    }

    /// Creates a session with a caller-chosen id.
    pub fn with_id(
        id: SessionId,
        user_id: UserId,
        room_id: RoomId,
    ) -> (Arc<Session>, SessionReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            id,
            user_id,
            room_id,
            connected_at: chrono::Utc::now().timestamp().max(0) as u64,
            sender,
        });
        (session, receiver)
    }

    /// Queues one serialized frame for this session.
    pub fn send(&self, frame: String) -> Result<(), RealtimeError> {
        self.sender
            .send(frame)
            .map_err(|_| RealtimeError::Transport(format!("session {} is closed", self.id)))
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Session {}
