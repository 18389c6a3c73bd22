//! Per-event validation, persistence and fan-out.
//!
//! Each handler follows the same order: validate against the session's
//! identity, persist, then broadcast. A failure at any step returns early, so
//! clients never see an event whose write did not land.

use roomhub_store::{ChatStore, Message, MessageId, RoomId, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::broadcast::Broadcaster;
use crate::error::{RealtimeError, ValidationError};
use crate::event::{InboundEvent, OutboundEvent};
use crate::mention::extract_mentions;
use crate::session::Session;

/// Maximum message length, in characters.
pub const MAX_CONTENT_CHARS: usize = 4096;

/// Applies inbound events on behalf of a session.
pub struct EventProcessor {
    store: Arc<dyn ChatStore>,
    broadcaster: Broadcaster,
}

impl EventProcessor {
    /// Creates a processor writing to `store` and publishing through
    /// `broadcaster`.
    pub fn new(store: Arc<dyn ChatStore>, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster }
    }

    /// The broadcaster events are published through.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Handles one event from `session`.
    pub async fn process(
        &self,
        session: &Session,
        event: InboundEvent,
    ) -> Result<(), RealtimeError> {
        match event {
            InboundEvent::SendMessage { room_id, content } => {
                self.send_message(session, room_id, &content).await
            }
            InboundEvent::EditMessage {
                message_id,
                content,
            } => self.edit_message(session, message_id, &content).await,
            InboundEvent::DeleteMessage { message_id } => {
                self.delete_message(session, message_id).await
            }
            InboundEvent::HideMessage { message_id } => {
                self.hide_message(session, message_id).await
            }
            InboundEvent::ReadReceipt {
                message_id,
                user_id,
            } => self.read_receipt(session, message_id, user_id).await,
            InboundEvent::Ping => self.broadcaster.send_to(session, &OutboundEvent::Pong),
        }
    }

    async fn send_message(
        &self,
        session: &Session,
        room_id: Option<RoomId>,
        content: &str,
    ) -> Result<(), RealtimeError> {
        check_room(session, room_id)?;
        validate_content(content)?;

        let message = self
            .store
            .create_message(session.room_id, session.user_id, content)
            .await?;
        let view = message.view(Vec::new());

        debug!(
            session_id = %session.id,
            room_id = %message.room_id,
            message_id = %message.id,
            "Message stored"
        );

        self.broadcaster.broadcast(
            session.room_id,
            &OutboundEvent::Message(view.clone()),
            Some(&session.id),
        )?;
        if let Err(e) = self
            .broadcaster
            .send_to(session, &OutboundEvent::MessageAck(view))
        {
            debug!(session_id = %session.id, error = %e, "Ack not delivered");
        }

        self.notify_mentions(session, &message).await;
        Ok(())
    }

    /// Records and announces each resolvable mention in a stored message.
    async fn notify_mentions(&self, session: &Session, message: &Message) {
        for username in extract_mentions(&message.content) {
            let user_id = match self.store.resolve_username(username).await {
                Ok(Some(user_id)) if user_id != message.sender_id => user_id,
                Ok(Some(_)) => continue,
                Ok(None) => {
                    debug!(username = %username, "Mention of unknown user skipped");
                    continue;
                }
                Err(e) => {
                    warn!(username = %username, error = %e, "Mention lookup failed");
                    continue;
                }
            };

            if let Err(e) = self.store.insert_mention(message.id, user_id).await {
                warn!(
                    message_id = %message.id,
                    user_id = %user_id,
                    error = %e,
                    "Mention not stored, skipping notification"
                );
                continue;
            }

            let event = OutboundEvent::Mention {
                room_id: message.room_id,
                message_id: message.id,
                sender_id: message.sender_id,
                mentioned_user_id: user_id,
                content: message.content.clone(),
            };
            if let Err(e) = self
                .broadcaster
                .broadcast(message.room_id, &event, Some(&session.id))
            {
                warn!(message_id = %message.id, error = %e, "Mention broadcast failed");
            }
        }
    }

    async fn edit_message(
        &self,
        session: &Session,
        message_id: MessageId,
        content: &str,
    ) -> Result<(), RealtimeError> {
        validate_content(content)?;
        self.message_in_room(session, message_id).await?;

        let message = self
            .store
            .update_message_content(message_id, session.user_id, content)
            .await?;
        let read_by = self.store.read_by(message_id).await?;

        self.broadcaster.broadcast(
            session.room_id,
            &OutboundEvent::EditMessage {
                message: message.view(read_by),
            },
            None,
        )?;
        Ok(())
    }

    async fn delete_message(
        &self,
        session: &Session,
        message_id: MessageId,
    ) -> Result<(), RealtimeError> {
        self.message_in_room(session, message_id).await?;
        self.store
            .soft_delete_message(message_id, session.user_id)
            .await?;

        self.broadcaster.broadcast(
            session.room_id,
            &OutboundEvent::DeleteMessage {
                message_id,
                room_id: session.room_id,
            },
            None,
        )?;
        Ok(())
    }

    async fn hide_message(
        &self,
        session: &Session,
        message_id: MessageId,
    ) -> Result<(), RealtimeError> {
        self.message_in_room(session, message_id).await?;
        self.store
            .hide_message_for_user(message_id, session.user_id)
            .await?;

        self.broadcaster.broadcast(
            session.room_id,
            &OutboundEvent::HideMessage {
                message_id,
                user_id: session.user_id,
                room_id: session.room_id,
            },
            None,
        )?;
        Ok(())
    }

    async fn read_receipt(
        &self,
        session: &Session,
        message_id: MessageId,
        claimed_user: Option<UserId>,
    ) -> Result<(), RealtimeError> {
        if let Some(got) = claimed_user.filter(|u| *u != session.user_id) {
            return Err(ValidationError::IdentityMismatch {
                expected: session.user_id,
                got,
            }
            .into());
        }
        self.message_in_room(session, message_id).await?;

        let inserted = self
            .store
            .insert_read_receipt(message_id, session.user_id)
            .await?;
        if !inserted {
            debug!(message_id = %message_id, user_id = %session.user_id, "Receipt already stored");
        }

        self.broadcaster.broadcast(
            session.room_id,
            &OutboundEvent::MessageRead {
                message_id,
                user_id: session.user_id,
                room_id: session.room_id,
            },
            None,
        )?;
        Ok(())
    }

    /// Loads a message and checks it belongs to the session's room.
    async fn message_in_room(
        &self,
        session: &Session,
        message_id: MessageId,
    ) -> Result<Message, RealtimeError> {
        let message = self.store.get_message(message_id).await?;
        if message.room_id != session.room_id {
            return Err(ValidationError::WrongRoom(message_id).into());
        }
        Ok(message)
    }
}

fn check_room(session: &Session, room_id: Option<RoomId>) -> Result<(), ValidationError> {
    match room_id {
        Some(got) if got != session.room_id => Err(ValidationError::RoomMismatch {
            expected: session.room_id,
            got,
        }),
        _ => Ok(()),
    }
}

fn validate_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ValidationError::ContentTooLong {
            max: MAX_CONTENT_CHARS,
        });
    }
    Ok(())
}
