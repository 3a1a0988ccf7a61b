//! Session lifecycle: new session, document deletion, list refresh.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use folio_core::{Document, DocumentId};
use folio_gateway::{DocumentRecord, RemoteGateway};

use crate::error::ChatError;
use crate::store::SessionStore;

pub struct LifecycleController {
    store: Arc<SessionStore>,
    gateway: Arc<dyn RemoteGateway>,
}

impl LifecycleController {
    pub fn new(store: Arc<SessionStore>, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self { store, gateway }
    }

    /// Return to the "no document selected" view. Documents are kept.
    ///
    /// Any in-flight history or answer for the previous view is discarded
    /// when it lands.
    pub fn start_new_session(&self) -> Result<(), ChatError> {
        self.store.update(|state| state.reset_view())?;
        info!("Started new session");
        Ok(())
    }

    /// Delete a document remotely, then drop it locally.
    ///
    /// Returns whether the deleted document was the active one, in which case
    /// the view has been reset. A remote failure leaves local state untouched.
    pub async fn delete_document(&self, id: &DocumentId) -> Result<bool, ChatError> {
        if !self.store.read(|state| state.contains(id))? {
            error!(document_id = %id, "Cannot delete unknown document");
            return Err(ChatError::UnknownDocument(id.clone()));
        }

        self.gateway.delete_document(id).await.map_err(|e| {
            warn!(document_id = %id, error = %e, "Delete failed");
            ChatError::delete(e)
        })?;

        let was_active = self.store.update(|state| {
            let was_active = state.active_document_id() == Some(id);
            if was_active {
                state.reset_view();
            }
            state.remove_document(id);
            was_active
        })?;
        info!(document_id = %id, was_active, "Document deleted");
        Ok(was_active)
    }

    /// Replace the document list from the server, newest first.
    ///
    /// Documents uploaded while the listing was in flight are kept, and
    /// documents deleted meanwhile are not brought back. If the active
    /// document is gone afterwards the view is reset.
    pub async fn refresh_documents(&self) -> Result<usize, ChatError> {
        let known: HashSet<DocumentId> = self.store.read(|state| {
            state
                .list_documents()
                .iter()
                .map(|d| d.id.clone())
                .collect()
        })?;

        let records = self.gateway.list_documents().await.map_err(|e| {
            warn!(error = %e, "Document refresh failed");
            ChatError::RefreshFailed(e.to_string())
        })?;
        let mut listed: Vec<Document> = records
            .into_iter()
            .map(DocumentRecord::into_document)
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let count = self.store.update(|state| {
            let listed_ids: HashSet<DocumentId> = listed.iter().map(|d| d.id.clone()).collect();
            let mut documents: Vec<Document> = state
                .list_documents()
                .iter()
                .filter(|d| !known.contains(&d.id) && !listed_ids.contains(&d.id))
                .cloned()
                .collect();
            documents.extend(
                listed
                    .into_iter()
                    .filter(|d| !known.contains(&d.id) || state.contains(&d.id)),
            );
            state.replace_documents(documents);

            let active_gone = state
                .active_document_id()
                .is_some_and(|active| !state.contains(active));
            if active_gone {
                warn!("Active document no longer listed; resetting view");
                state.reset_view();
            }
            state.list_documents().len()
        })?;
        info!(count, "Document list refreshed");
        Ok(count)
    }
}
