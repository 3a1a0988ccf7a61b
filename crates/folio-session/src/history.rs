//! History loader: switch the view to a document and fetch its conversation.

use std::sync::Arc;

use tracing::{debug, error, warn};

use folio_core::{DocumentId, Role, Turn};
use folio_gateway::{HistoryEntry, RemoteGateway};

use crate::error::ChatError;
use crate::store::SessionStore;

/// Map a server role label onto a `Role`.
///
/// Unknown labels (including `system`) return `None` and are dropped.
pub fn normalize_role(raw: &str) -> Option<Role> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "user" | "human" => Some(Role::User),
        "assistant" | "bot" | "ai" | "model" => Some(Role::Assistant),
        _ => None,
    }
}

/// Convert server history entries into turns, preserving order.
pub fn normalize_history(entries: Vec<HistoryEntry>) -> Vec<Turn> {
    entries
        .into_iter()
        .filter_map(|entry| match normalize_role(&entry.role) {
            Some(role) => Some(Turn::new(role, entry.content, entry.sources)),
            None => {
                debug!(role = %entry.role, "Dropping history entry with unknown role");
                None
            }
        })
        .collect()
}

/// How a history load ended.
#[derive(Debug)]
pub enum HistoryOutcome {
    /// The transcript now holds the fetched turns.
    Loaded { turns: usize },
    /// The fetch failed; the transcript holds one synthetic error turn.
    Failed(ChatError),
    /// The user moved on before the response arrived; nothing was applied.
    Discarded,
}

pub struct HistoryLoader {
    store: Arc<SessionStore>,
    gateway: Arc<dyn RemoteGateway>,
    error_text: String,
}

impl HistoryLoader {
    pub fn new(
        store: Arc<SessionStore>,
        gateway: Arc<dyn RemoteGateway>,
        error_text: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            error_text: error_text.into(),
        }
    }

    /// Make `id` active, then load its stored conversation.
    ///
    /// The switch happens before the request is sent: the document's cached
    /// summary is visible immediately with an empty transcript. The fetched
    /// turns are only applied if this view is still current when they
    /// arrive, and go ahead of any turns asked in the meantime.
    /// Re-selecting the active document reloads it.
    pub async fn select_document(&self, id: &DocumentId) -> Result<HistoryOutcome, ChatError> {
        let ticket = self
            .store
            .try_update(|state| {
                state
                    .switch_view(Some(id), Vec::new())?
                    .ok_or(ChatError::NoActiveDocument)
            })
            .map_err(|e| {
                if e.is_contract_violation() {
                    error!(document_id = %id, error = %e, "Cannot select document");
                }
                e
            })?;
        debug!(document_id = %id, epoch = ticket.epoch(), "Loading history");

        let (turns, outcome) = match self.gateway.history(id).await {
            Ok(response) => {
                let turns = normalize_history(response.history);
                let count = turns.len();
                (turns, HistoryOutcome::Loaded { turns: count })
            }
            Err(e) => {
                warn!(document_id = %id, error = %e, "History fetch failed");
                (
                    vec![Turn::synthetic_assistant(self.error_text.clone())],
                    HistoryOutcome::Failed(ChatError::HistoryFetchFailed(e.to_string())),
                )
            }
        };

        self.store.try_update(|state| {
            if !state.is_current(&ticket) {
                state.record_discarded(&ticket, "history");
                return Ok(HistoryOutcome::Discarded);
            }
            state.prepend_history_for(&ticket, turns)?;
            Ok(outcome)
        })
    }
}
