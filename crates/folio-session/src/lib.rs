//! Session core for Folio.
//!
//! Holds the client-side state of one document Q&A session and the
//! coordinators that move it forward: uploading documents, loading their
//! conversation history, asking questions, and deleting or refreshing
//! documents. All remote work goes through a `RemoteGateway`.

pub mod conversation;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod session;
pub mod store;
pub mod upload;

#[cfg(test)]
mod mock;

pub use conversation::{AskOutcome, ConversationCoordinator};
pub use error::ChatError;
pub use history::{normalize_role, HistoryLoader, HistoryOutcome};
pub use lifecycle::LifecycleController;
pub use session::Session;
pub use store::{Flag, SessionSnapshot, SessionState, SessionStore, Transcript, ViewTicket};
pub use upload::{UploadCoordinator, UploadOutcome, UploadPolicy};
