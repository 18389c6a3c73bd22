//! Persistence for roomhub: messages, read receipts, mentions and the user
//! directory.
//!
//! The real-time hub never talks to a database directly. It goes through the
//! [`ChatStore`] trait, which any durable backend can implement. This crate
//! ships [`MemoryStore`], a thread-safe in-memory implementation used by the
//! node in development and by every test in the workspace.
//!
//! # Example
//!
//! ```
//! use roomhub_store::{ChatStore, MemoryStore, RoomId, UserId};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryStore::new();
//! let room = RoomId(7);
//! let alice = store.add_user("alice");
//! store.add_member(room, alice);
//!
//! let message = store.create_message(room, alice, "hello").await.unwrap();
//! assert_eq!(message.sender_id, alice);
//!
//! store.insert_read_receipt(message.id, UserId(3)).await.unwrap();
//! assert_eq!(store.read_by(message.id).await.unwrap(), vec![UserId(3)]);
//! # }
//! ```

mod error;
mod memory;
mod model;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{Mention, Message, MessageId, MessageView, ReadReceipt, RoomId, UserId};
pub use store::ChatStore;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
