//! Fan-out of outbound events to a room's sessions.

use roomhub_store::RoomId;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RealtimeError;
use crate::event::OutboundEvent;
use crate::registry::SessionRegistry;
use crate::session::Session;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Sessions the frame was queued for.
    pub delivered: usize,
    /// Sessions whose send failed and were skipped.
    pub failed: usize,
}

/// Delivers events to every session registered for a room.
///
/// A failed send is logged and skipped. The broadcaster never removes
/// sessions; that is left to each connection's own shutdown.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    /// Creates a broadcaster over `registry`.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this broadcaster reads from.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Sends `event` to every session in the room except `exclude`.
    pub fn broadcast(
        &self,
        room_id: RoomId,
        event: &OutboundEvent,
        exclude: Option<&str>,
    ) -> Result<DeliveryReport, RealtimeError> {
        let frame = event.to_frame()?;
        let mut report = DeliveryReport::default();

        for session in self.registry.snapshot(room_id) {
            if exclude == Some(session.id.as_str()) {
                continue;
            }
            match session.send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        room_id = %room_id,
                        session_id = %session.id,
                        error = %e,
                        "Delivery failed, skipping session"
                    );
                    report.failed += 1;
                }
            }
        }

        self.registry.record_broadcast(report.failed);
        debug!(
            room_id = %room_id,
            recipients = report.delivered,
            failed = report.failed,
            "Event broadcast"
        );
        Ok(report)
    }

    /// Sends `event` to a single session.
    pub fn send_to(&self, session: &Session, event: &OutboundEvent) -> Result<(), RealtimeError> {
        session.send(event.to_frame()?)
    }
}
