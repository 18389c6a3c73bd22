//! Room-to-session registry.

use parking_lot::RwLock;
use roomhub_store::RoomId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::session::{Session, SessionId};

/// Number of independently locked shards.
const SHARD_COUNT: usize = 16;

type RoomSessions = HashMap<SessionId, Arc<Session>>;

/// Tracks which sessions are connected to which room.
///
/// Rooms are spread over a fixed set of shards, each behind its own lock, so
/// traffic in one room only contends with rooms that hash to the same shard.
/// All access goes through `register`, `unregister` and `snapshot`.
#[derive(Debug)]
pub struct SessionRegistry {
    shards: Vec<RwLock<HashMap<RoomId, RoomSessions>>>,
    total_registrations: AtomicU64,
    total_broadcasts: AtomicU64,
    failed_deliveries: AtomicU64,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
            total_registrations: AtomicU64::new(0),
            total_broadcasts: AtomicU64::new(0),
            failed_deliveries: AtomicU64::new(0),
        }
    }

    fn shard(&self, room_id: RoomId) -> &RwLock<HashMap<RoomId, RoomSessions>> {
        &self.shards[(room_id.0 % SHARD_COUNT as u64) as usize]
    }

    /// Adds a session to a room. Returns false if it was already there.
    pub fn register(&self, room_id: RoomId, session: Arc<Session>) -> bool {
        let session_id = session.id.clone();
        let inserted = self
            .shard(room_id)
            .write()
            .entry(room_id)
            .or_default()
            .insert(session_id.clone(), session)
            .is_none();

        if inserted {
            self.total_registrations.fetch_add(1, Ordering::Relaxed);
            debug!(room_id = %room_id, session_id = %session_id, "Session registered");
        }
        inserted
    }

    /// Removes a session from a room. Absent sessions are ignored.
    pub fn unregister(&self, room_id: RoomId, session_id: &str) -> bool {
        let mut shard = self.shard(room_id).write();
        let Some(sessions) = shard.get_mut(&room_id) else {
            return false;
        };

        let removed = sessions.remove(session_id).is_some();
        if sessions.is_empty() {
            shard.remove(&room_id);
        }
        drop(shard);

        if removed {
            debug!(room_id = %room_id, session_id = %session_id, "Session unregistered");
        }
        removed
    }

    /// Returns the room's sessions as of now.
    pub fn snapshot(&self, room_id: RoomId) -> Vec<Arc<Session>> {
        self.shard(room_id)
            .read()
            .get(&room_id)
            .map(|sessions| sessions.values().cloned().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, room_id: RoomId, session_id: &str) -> bool {
        self.shard(room_id)
            .read()
            .get(&room_id)
            .is_some_and(|sessions| sessions.contains_key(session_id))
    }

    /// Number of sessions in one room.
    pub fn room_session_count(&self, room_id: RoomId) -> usize {
        self.shard(room_id)
            .read()
            .get(&room_id)
            .map_or(0, HashMap::len)
    }

    /// Number of sessions across all rooms.
    pub fn session_count(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().values().map(HashMap::len).sum::<usize>())
            .sum()
    }

    /// Number of rooms with at least one session.
    pub fn room_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub(crate) fn record_broadcast(&self, failed: usize) {
        self.total_broadcasts.fetch_add(1, Ordering::Relaxed);
        if failed > 0 {
            self.failed_deliveries
                .fetch_add(failed as u64, Ordering::Relaxed);
        }
    }

    /// Get registry statistics.
    pub fn stats(&self) -> HubStats {
        HubStats {
            current_sessions: self.session_count(),
            current_rooms: self.room_count(),
            total_registrations: self.total_registrations.load(Ordering::Relaxed),
            total_broadcasts: self.total_broadcasts.load(Ordering::Relaxed),
            failed_deliveries: self.failed_deliveries.load(Ordering::Relaxed),
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Hub statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Sessions connected right now.
    pub current_sessions: usize,
    /// Rooms with at least one session.
    pub current_rooms: usize,
    /// Registrations since start.
    pub total_registrations: u64,
    /// Broadcasts since start.
    pub total_broadcasts: u64,
    /// Per-session sends that failed since start.
    pub failed_deliveries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use roomhub_store::UserId;

    const ROOM: RoomId = RoomId(7);

    #[test]
    fn test_register_then_snapshot() {
        let registry = SessionRegistry::new();
        let (session, _rx) = Session::open(UserId(1), ROOM);

        assert!(registry.register(ROOM, session.clone()));
        let snapshot = registry.snapshot(ROOM);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, session.id);
    }

    #[test]
    fn test_unregister_then_snapshot() {
        let registry = SessionRegistry::new();
        let (session, _rx) = Session::open(UserId(1), ROOM);

        registry.register(ROOM, session.clone());
        assert!(registry.unregister(ROOM, &session.id));
        assert!(registry.snapshot(ROOM).is_empty());
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn test_double_register_is_idempotent() {
        let registry = SessionRegistry::new();
        let (session, _rx) = Session::open(UserId(1), ROOM);

        assert!(registry.register(ROOM, session.clone()));
        assert!(!registry.register(ROOM, session.clone()));
        assert_eq!(registry.snapshot(ROOM).len(), 1);
        assert_eq!(registry.stats().total_registrations, 1);
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let registry = SessionRegistry::new();
        let (session, _rx) = Session::open(UserId(1), ROOM);

        assert!(!registry.unregister(ROOM, &session.id));
        registry.register(ROOM, session.clone());
        assert!(registry.unregister(ROOM, &session.id));
        assert!(!registry.unregister(ROOM, &session.id));
    }

    #[test]
    fn test_rooms_are_isolated() {
        let registry = SessionRegistry::new();
        let (a, _ra) = Session::open(UserId(1), RoomId(7));
        // Same shard as room 7.
        let (b, _rb) = Session::open(UserId(2), RoomId(7 + SHARD_COUNT as u64));
        let (c, _rc) = Session::open(UserId(3), RoomId(8));

        registry.register(a.room_id, a.clone());
        registry.register(b.room_id, b.clone());
        registry.register(c.room_id, c.clone());

        assert_eq!(registry.room_session_count(RoomId(7)), 1);
        assert_eq!(registry.room_session_count(RoomId(7 + SHARD_COUNT as u64)), 1);
        assert_eq!(registry.room_count(), 3);
        assert_eq!(registry.session_count(), 3);
        assert!(registry.contains(RoomId(7), &a.id));
        assert!(!registry.contains(RoomId(7), &b.id));
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let registry = SessionRegistry::new();
        let (a, _ra) = Session::open(UserId(1), ROOM);
        let (b, _rb) = Session::open(UserId(2), ROOM);

        registry.register(ROOM, a.clone());
        let snapshot = registry.snapshot(ROOM);
        registry.register(ROOM, b.clone());

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.snapshot(ROOM).len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_unregister() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();

        for i in 0..64u64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let room = RoomId(i % 4);
                let (session, _rx) = Session::open(UserId(i), room);
                registry.register(room, session.clone());
                tokio::task::yield_now().await;
                if i % 2 == 0 {
                    registry.unregister(room, &session.id);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.session_count(), 32);
        assert_eq!(registry.stats().total_registrations, 64);
    }

    proptest! {
        #[test]
        fn prop_snapshot_tracks_membership(ops in prop::collection::vec((0u8..8, any::<bool>()), 0..64)) {
            let registry = SessionRegistry::new();
            let sessions: Vec<_> = (0..8u64)
                .map(|i| Session::with_id(format!("s{i}"), UserId(i), ROOM))
                .collect();
            let mut expected = std::collections::HashSet::new();

            for (index, add) in ops {
                let (session, _) = &sessions[index as usize];
                if add {
                    registry.register(ROOM, session.clone());
                    expected.insert(session.id.clone());
                } else {
                    registry.unregister(ROOM, &session.id);
                    expected.remove(&session.id);
                }
            }

            let actual: std::collections::HashSet<_> =
                registry.snapshot(ROOM).iter().map(|s| s.id.clone()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
