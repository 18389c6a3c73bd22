//! Connection lifecycle: handshake, admission, receive loop and teardown.
//!
//! A connection moves through `Connecting → Authenticated → Active → Closed`.
//! The handler is transport-agnostic: the server adapts its socket into a
//! stream of [`Frame`]s and forwards the [`SessionReceiver`] to the socket.

use futures_util::{Stream, StreamExt};
use roomhub_auth::{AuthError, TokenVerifier};
use roomhub_store::{ChatStore, RoomId, UserId};
use serde::Deserialize;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::error::{ErrorKind, RealtimeError};
use crate::event::{InboundEvent, OutboundEvent};
use crate::processor::EventProcessor;
use crate::registry::SessionRegistry;
use crate::session::{Session, SessionReceiver};

/// Default cap on concurrently connected sessions.
pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

/// Query parameters supplied when opening a connection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandshakeParams {
    pub room_id: Option<String>,
    pub token: Option<String>,
}

/// Lifecycle of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake received, nothing verified yet.
    Connecting,
    /// Token and room accepted.
    Authenticated,
    /// Registered and exchanging events.
    Active,
    /// Unregistered. Terminal.
    Closed,
}

/// A transport frame, reduced to what the hub cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Close,
}

/// Why the receive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent a close frame.
    ClientClosed,
    /// The inbound stream ended without a close frame.
    StreamEnded,
    /// Reading from the transport failed.
    ReadError,
}

/// Who a connection is, once the handshake has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub room_id: RoomId,
}

/// Accepts connections and wires them to the shared registry and store.
pub struct ConnectionHandler {
    registry: Arc<SessionRegistry>,
    processor: Arc<EventProcessor>,
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn ChatStore>,
    max_connections: usize,
}

impl ConnectionHandler {
    /// Creates a handler with a fresh registry.
    pub fn new(store: Arc<dyn ChatStore>, verifier: Arc<dyn TokenVerifier>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let processor = Arc::new(EventProcessor::new(
            store.clone(),
            Broadcaster::new(registry.clone()),
        ));
        Self {
            registry,
            processor,
            verifier,
            store,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Sets the connection cap.
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// The registry shared by every connection of this handler.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Validates handshake parameters, verifies the token and checks room
    /// membership.
    pub async fn authenticate(&self, params: &HandshakeParams) -> Result<Identity, RealtimeError> {
        let raw_room = non_blank(params.room_id.as_deref()).ok_or(AuthError::MissingRoom)?;
        let token = non_blank(params.token.as_deref()).ok_or(AuthError::MissingToken)?;

        let room_id = raw_room
            .parse::<RoomId>()
            .ok()
            .filter(|room| room.0 > 0)
            .ok_or_else(|| AuthError::InvalidRoom(raw_room.to_string()))?;
        let user_id = self.verifier.verify(token)?;

        match self.store.is_room_member(room_id, user_id).await {
            Ok(true) => {
                debug!(
                    room_id = %room_id,
                    user_id = %user_id,
                    state = ?ConnectionState::Authenticated,
                    "Handshake accepted"
                );
                Ok(Identity { user_id, room_id })
            }
            Ok(false) => Err(AuthError::NotRoomMember { room_id, user_id }.into()),
            Err(e) => Err(RealtimeError::Storage(e)),
        }
    }

    /// Fails when the hub is at its connection cap.
    pub fn admit(&self) -> Result<(), RealtimeError> {
        if self.registry.session_count() >= self.max_connections {
            warn!(max = self.max_connections, "Connection limit reached");
            return Err(RealtimeError::CapacityReached(self.max_connections));
        }
        Ok(())
    }

    /// Creates and registers the session for an authenticated identity.
    pub fn activate(
        &self,
        identity: Identity,
    ) -> Result<(ActiveConnection, SessionReceiver), RealtimeError> {
        self.admit()?;

        let (session, receiver) = Session::open(identity.user_id, identity.room_id);
        self.registry.register(identity.room_id, session.clone());

        info!(
            session_id = %session.id,
            room_id = %session.room_id,
            user_id = %session.user_id,
            "Session opened"
        );

        let connection = ActiveConnection {
            session,
            registry: self.registry.clone(),
            processor: self.processor.clone(),
            closed: AtomicBool::new(false),
        };
        Ok((connection, receiver))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A registered connection. Dropping it unregisters the session.
pub struct ActiveConnection {
    session: Arc<Session>,
    registry: Arc<SessionRegistry>,
    processor: Arc<EventProcessor>,
    closed: AtomicBool,
}

impl ActiveConnection {
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn state(&self) -> ConnectionState {
        if self.closed.load(Ordering::Acquire) {
            ConnectionState::Closed
        } else {
            ConnectionState::Active
        }
    }

    /// Decodes and applies one text frame.
    pub async fn handle_text(&self, text: &str) -> Result<(), RealtimeError> {
        let event = InboundEvent::decode(text)?;
        debug!(session_id = %self.session.id, event = event.kind(), "Event received");
        self.processor.process(&self.session, event).await
    }

    /// Processes frames in arrival order until the peer goes away, then
    /// closes the connection.
    pub async fn run<S, E>(self, mut inbound: S) -> CloseReason
    where
        S: Stream<Item = Result<Frame, E>> + Unpin,
        E: Display,
    {
        let reason = loop {
            match inbound.next().await {
                Some(Ok(Frame::Text(text))) => {
                    if let Err(e) = self.handle_text(&text).await {
                        self.report(e);
                    }
                }
                Some(Ok(Frame::Binary(_))) => {
                    debug!(session_id = %self.session.id, "Binary frame ignored");
                }
                Some(Ok(Frame::Ping)) => {}
                Some(Ok(Frame::Close)) => break CloseReason::ClientClosed,
                Some(Err(e)) => {
                    debug!(session_id = %self.session.id, error = %e, "Read failed");
                    break CloseReason::ReadError;
                }
                None => break CloseReason::StreamEnded,
            }
        };

        self.close();
        reason
    }

    /// Logs a dropped event and tells the origin about it.
    fn report(&self, err: RealtimeError) {
        match err.kind() {
            ErrorKind::Validation => {
                debug!(session_id = %self.session.id, error = %err, "Event rejected")
            }
            ErrorKind::Storage => {
                warn!(session_id = %self.session.id, error = %err, "Event dropped on storage failure")
            }
            ErrorKind::Authentication | ErrorKind::Transport => {
                warn!(session_id = %self.session.id, error = %err, "Event failed")
            }
        }

        let frame = OutboundEvent::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        };
        if let Err(e) = self.processor.broadcaster().send_to(&self.session, &frame) {
            debug!(session_id = %self.session.id, error = %e, "Error frame not delivered");
        }
    }

    /// Unregisters the session. Only the first call has any effect.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.registry
            .unregister(self.session.room_id, &self.session.id);
        info!(
            session_id = %self.session.id,
            room_id = %self.session.room_id,
            user_id = %self.session.user_id,
            "Session closed"
        );
        true
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use roomhub_store::MemoryStore;
    use serde_json::Value;

    /// Accepts tokens of the form `user-<id>`.
    struct StaticVerifier;

    impl TokenVerifier for StaticVerifier {
        fn verify(&self, token: &str) -> roomhub_auth::Result<UserId> {
            token
                .strip_prefix("user-")
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| AuthError::InvalidToken(token.to_string()))
        }
    }

    fn setup() -> (Arc<MemoryStore>, ConnectionHandler) {
        let store = Arc::new(MemoryStore::new());
        store.add_member(RoomId(7), UserId(1));
        store.add_member(RoomId(7), UserId(2));
        let handler = ConnectionHandler::new(store.clone(), Arc::new(StaticVerifier));
        (store, handler)
    }

    fn params(room: Option<&str>, token: Option<&str>) -> HandshakeParams {
        HandshakeParams {
            room_id: room.map(String::from),
            token: token.map(String::from),
        }
    }

    fn auth_error(err: RealtimeError) -> AuthError {
        match err {
            RealtimeError::Authentication(e) => e,
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    fn text(s: &str) -> Result<Frame, String> {
        Ok(Frame::Text(s.to_string()))
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let (_store, handler) = setup();
        let identity = handler
            .authenticate(&params(Some("7"), Some("user-1")))
            .await
            .unwrap();
        assert_eq!(
            identity,
            Identity {
                user_id: UserId(1),
                room_id: RoomId(7)
            }
        );
    }

    #[tokio::test]
    async fn test_authenticate_missing_params() {
        let (_store, handler) = setup();

        let err = handler
            .authenticate(&params(None, Some("user-1")))
            .await
            .unwrap_err();
        assert_eq!(auth_error(err), AuthError::MissingRoom);

        let err = handler
            .authenticate(&params(Some("7"), Some("  ")))
            .await
            .unwrap_err();
        assert_eq!(auth_error(err), AuthError::MissingToken);
    }

    #[tokio::test]
    async fn test_authenticate_bad_room() {
        let (_store, handler) = setup();
        for raw in ["seven", "0", "-3"] {
            let err = handler
                .authenticate(&params(Some(raw), Some("user-1")))
                .await
                .unwrap_err();
            assert!(matches!(auth_error(err), AuthError::InvalidRoom(_)), "{raw}");
        }
    }

    #[tokio::test]
    async fn test_authenticate_bad_token() {
        let (_store, handler) = setup();
        let err = handler
            .authenticate(&params(Some("7"), Some("forged")))
            .await
            .unwrap_err();
        assert!(matches!(auth_error(err), AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_authenticate_non_member() {
        let (_store, handler) = setup();
        let err = handler
            .authenticate(&params(Some("7"), Some("user-5")))
            .await
            .unwrap_err();
        assert!(auth_error(err).is_forbidden());
    }

    #[tokio::test]
    async fn test_authenticate_store_down() {
        let (store, handler) = setup();
        store.set_unavailable(true);
        let err = handler
            .authenticate(&params(Some("7"), Some("user-1")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_capacity_cap() {
        let (_store, handler) = setup();
        let handler = handler.with_max_connections(1);
        let identity = Identity {
            user_id: UserId(1),
            room_id: RoomId(7),
        };

        let (_first, _rx) = handler.activate(identity).unwrap();
        assert!(matches!(
            handler.activate(identity),
            Err(RealtimeError::CapacityReached(1))
        ));
    }

    #[tokio::test]
    async fn test_close_runs_once() {
        let (_store, handler) = setup();
        let identity = Identity {
            user_id: UserId(1),
            room_id: RoomId(7),
        };
        let (conn, _rx) = handler.activate(identity).unwrap();
        let session_id = conn.session().id.clone();
        assert_eq!(conn.state(), ConnectionState::Active);
        assert!(handler.registry().contains(RoomId(7), &session_id));

        assert!(conn.close());
        assert!(!conn.close());
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!handler.registry().contains(RoomId(7), &session_id));

        // Re-registering a different session then dropping the closed one
        // must not touch the newcomer.
        let (other, _rx2) = handler.activate(identity).unwrap();
        drop(conn);
        assert!(handler.registry().contains(RoomId(7), &other.session().id));
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let (_store, handler) = setup();
        let (conn, _rx) = handler
            .activate(Identity {
                user_id: UserId(1),
                room_id: RoomId(7),
            })
            .unwrap();
        drop(conn);
        assert_eq!(handler.registry().session_count(), 0);
    }

    #[tokio::test]
    async fn test_run_keeps_going_after_bad_frames() {
        let (store, handler) = setup();
        let identity = Identity {
            user_id: UserId(1),
            room_id: RoomId(7),
        };
        let (conn, mut rx) = handler.activate(identity).unwrap();

        let frames = stream::iter(vec![
            text(r#"{"type":"typing"}"#),
            text(r#"{"type":"message_read","message_id":"x"}"#),
            Ok(Frame::Binary(vec![1, 2, 3])),
            Ok(Frame::Ping),
            text(r#"{"type":"message","content":"still here"}"#),
            Ok(Frame::Close),
            text(r#"{"type":"message","content":"after close"}"#),
        ]);

        let reason = conn.run(frames).await;
        assert_eq!(reason, CloseReason::ClientClosed);
        assert_eq!(store.message_count(), 1);
        assert_eq!(handler.registry().session_count(), 0);

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str::<Value>(&frame).unwrap());
        }
        let types: Vec<_> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["error", "error", "message_ack"]);
        assert_eq!(frames[0]["code"], "invalid_event");
    }

    #[tokio::test]
    async fn test_run_stops_on_read_error() {
        let (_store, handler) = setup();
        let (conn, _rx) = handler
            .activate(Identity {
                user_id: UserId(1),
                room_id: RoomId(7),
            })
            .unwrap();

        let frames = stream::iter(vec![Err::<Frame, _>("connection reset".to_string())]);
        assert_eq!(conn.run(frames).await, CloseReason::ReadError);
        assert_eq!(handler.registry().session_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_peer_does_not_disturb_room() {
        let (_store, handler) = setup();
        let (a, _rx_a) = handler
            .activate(Identity {
                user_id: UserId(1),
                room_id: RoomId(7),
            })
            .unwrap();
        let (b, mut rx_b) = handler
            .activate(Identity {
                user_id: UserId(2),
                room_id: RoomId(7),
            })
            .unwrap();

        assert_eq!(
            a.run(stream::empty::<Result<Frame, String>>()).await,
            CloseReason::StreamEnded
        );

        b.handle_text(r#"{"type":"message","content":"anyone?"}"#)
            .await
            .unwrap();
        let ack: Value = serde_json::from_str(&rx_b.try_recv().unwrap()).unwrap();
        assert_eq!(ack["type"], "message_ack");
        assert_eq!(handler.registry().room_session_count(RoomId(7)), 1);
    }
}
