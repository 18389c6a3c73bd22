//! # Roomhub Real-time
//!
//! Room-scoped real-time hub for the roomhub chat backend.
//!
//! Clients open one connection per room. The hub tracks which sessions are in
//! which room, applies each inbound event against the store, and fans the
//! result out to the other sessions in the same room.
//!
//! ## Features
//!
//! - **Session Registry**: sharded room → session map with point-in-time
//!   snapshots
//! - **Connection Handler**: handshake, admission and an exactly-once close
//! - **Event Processor**: validation, persistence and fan-out per event
//! - **Mentions**: `@name` extraction with per-user notifications
//!
//! ## Example
//!
//! ```rust
//! use roomhub_auth::{AuthError, TokenVerifier};
//! use roomhub_realtime::{ConnectionHandler, HandshakeParams};
//! use roomhub_store::{MemoryStore, RoomId, UserId};
//! use std::sync::Arc;
//!
//! struct Trusting;
//!
//! impl TokenVerifier for Trusting {
//!     fn verify(&self, token: &str) -> roomhub_auth::Result<UserId> {
//!         token.parse().map_err(|_| AuthError::InvalidSubject(token.into()))
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(MemoryStore::new());
//! store.add_member(RoomId(7), UserId(1));
//!
//! let handler = ConnectionHandler::new(store, Arc::new(Trusting));
//! let identity = handler
//!     .authenticate(&HandshakeParams {
//!         room_id: Some("7".into()),
//!         token: Some("1".into()),
//!     })
//!     .await
//!     .unwrap();
//!
//! let (connection, mut outbound) = handler.activate(identity).unwrap();
//! connection
//!     .handle_text(r#"{"type":"message","content":"hello"}"#)
//!     .await
//!     .unwrap();
//!
//! assert!(outbound.try_recv().unwrap().contains("message_ack"));
//! # }
//! ```
//!
//! ## WebSocket Protocol
//!
//! ### Client -> Server Messages
//!
//! ```json
//! // Post a message (alias: send_message)
//! {"type": "message", "room_id": 7, "content": "hello @bob"}
//!
//! // Edit, delete or hide a message
//! {"type": "edit_message", "message_id": 42, "content": "hello again"}
//! {"type": "delete_message", "message_id": 42}
//! {"type": "hide_message", "message_id": 42}
//!
//! // Mark a message read (alias: read_receipt)
//! {"type": "message_read", "message_id": 42}
//!
//! // Ping for keepalive
//! {"type": "ping"}
//! ```
//!
//! ### Server -> Client Messages
//!
//! ```json
//! // New message, to everyone else in the room
//! {"type": "message", "id": 42, "room_id": 7, "sender_id": 1, "content": "...", ...}
//!
//! // Stored copy of your own message
//! {"type": "message_ack", "id": 42, ...}
//!
//! // Changes, to everyone in the room
//! {"type": "edit_message", "message": {...}}
//! {"type": "delete_message", "message_id": 42, "room_id": 7}
//! {"type": "hide_message", "message_id": 42, "user_id": 3, "room_id": 7}
//! {"type": "message_read", "message_id": 42, "user_id": 3, "room_id": 7}
//! {"type": "mention", "room_id": 7, "message_id": 42, "sender_id": 1, "mentioned_user_id": 9, "content": "..."}
//!
//! // Your last event was dropped
//! {"type": "error", "code": "invalid_event", "message": "..."}
//!
//! // Pong response
//! {"type": "pong"}
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              ConnectionHandler                │
//! │   handshake ─► authenticate ─► activate       │
//! │                                   │           │
//! │  ┌────────────────────────────────▼───────┐   │
//! │  │            SessionRegistry             │   │
//! │  │  shard[room % 16] -> room -> sessions  │   │
//! │  └────────────────────────────────▲───────┘   │
//! │                                   │ snapshot  │
//! │  ┌───────────────┐      ┌─────────┴───────┐   │
//! │  │EventProcessor ├─────►│   Broadcaster   │   │
//! │  └───────┬───────┘      └─────────────────┘   │
//! │          │ persist first                      │
//! │  ┌───────▼───────┐                            │
//! │  │   ChatStore   │                            │
//! │  └───────────────┘                            │
//! └──────────────────────────────────────────────┘
//! ```

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod event;
pub mod mention;
pub mod processor;
pub mod registry;
pub mod session;

// Re-export main types
pub use broadcast::{Broadcaster, DeliveryReport};
pub use connection::{
    ActiveConnection, CloseReason, ConnectionHandler, ConnectionState, Frame, HandshakeParams,
    Identity, DEFAULT_MAX_CONNECTIONS,
};
pub use error::{ErrorKind, RealtimeError, ValidationError};
pub use event::{InboundEvent, OutboundEvent};
pub use mention::extract_mentions;
pub use processor::{EventProcessor, MAX_CONTENT_CHARS};
pub use registry::{HubStats, SessionRegistry};
pub use session::{Session, SessionId, SessionReceiver};

#[cfg(test)]
mod tests {
    use super::*;
    use roomhub_auth::{AuthError, TokenVerifier};
    use roomhub_store::{MemoryStore, RoomId, UserId};
    use serde_json::Value;
    use std::sync::Arc;

    struct NumericVerifier;

    impl TokenVerifier for NumericVerifier {
        fn verify(&self, token: &str) -> roomhub_auth::Result<UserId> {
            token
                .parse()
                .map_err(|_| AuthError::InvalidSubject(token.to_string()))
        }
    }

    fn handshake(room: &str, token: &str) -> HandshakeParams {
        HandshakeParams {
            room_id: Some(room.to_string()),
            token: Some(token.to_string()),
        }
    }

    fn recv(rx: &mut SessionReceiver) -> Value {
        serde_json::from_str(&rx.try_recv().expect("frame")).unwrap()
    }

    #[test]
    fn test_public_api() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.session_count(), 0);
        assert_eq!(MAX_CONTENT_CHARS, 4096);
    }

    #[tokio::test]
    async fn test_full_flow() {
        let store = Arc::new(MemoryStore::new());
        let bob = store.add_user("bob");
        let alice = store.add_user("alice");
        store.add_member(RoomId(7), alice);
        store.add_member(RoomId(7), bob);

        let handler = ConnectionHandler::new(store.clone(), Arc::new(NumericVerifier));

        // Connect
        let a_identity = handler
            .authenticate(&handshake("7", &alice.to_string()))
            .await
            .unwrap();
        let b_identity = handler
            .authenticate(&handshake("7", &bob.to_string()))
            .await
            .unwrap();
        let (a, mut rx_a) = handler.activate(a_identity).unwrap();
        let (b, mut rx_b) = handler.activate(b_identity).unwrap();
        assert_eq!(handler.registry().room_session_count(RoomId(7)), 2);

        // Post with a mention
        a.handle_text(r#"{"type":"message","room_id":7,"content":"hello @bob"}"#)
            .await
            .unwrap();
        let message = recv(&mut rx_b);
        assert_eq!(message["type"], "message");
        let mention = recv(&mut rx_b);
        assert_eq!(mention["type"], "mention");
        assert_eq!(mention["mentioned_user_id"], bob.0);
        assert_eq!(recv(&mut rx_a)["type"], "message_ack");

        // Read it
        let read = format!(
            r#"{{"type":"message_read","message_id":{}}}"#,
            message["id"]
        );
        b.handle_text(&read).await.unwrap();
        assert_eq!(recv(&mut rx_a)["type"], "message_read");
        assert_eq!(recv(&mut rx_b)["type"], "message_read");

        // Disconnect
        drop(a);
        b.handle_text(r#"{"type":"message","content":"bye"}"#)
            .await
            .unwrap();
        assert_eq!(recv(&mut rx_b)["type"], "message_ack");
        assert_eq!(handler.registry().session_count(), 1);
        drop(b);
        assert_eq!(handler.registry().stats().current_rooms, 0);
    }
}
