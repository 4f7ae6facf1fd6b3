//! Session management
//!
//! Durable session records, chat messages, and the file-backed store.

mod model;
mod store;

pub use model::{MessageRole, SessionRecord, SessionStatus, StoredMessage};
pub use store::SessionStore;
