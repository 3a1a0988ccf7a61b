//! Session store: the single owned container of session state.
//!
//! `SessionState` is a plain state machine with no I/O. `SessionStore` wraps
//! it in a mutex that is only ever held for one synchronous step, never across
//! an `.await`, and publishes the events each step produced once the lock is
//! released.
//!
//! The transcript is stamped with the document it was loaded for. Switching
//! documents bumps the view epoch, and every in-flight operation carries a
//! `ViewTicket` captured at dispatch so late results for an abandoned view can
//! be recognised and dropped.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::broadcast;

use folio_core::{Document, DocumentId, SessionEvent, Turn};

use crate::error::ChatError;

/// Capacity of the session event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Value types
// =============================================================================

/// Identity of the view an async operation was dispatched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewTicket {
    document_id: DocumentId,
    epoch: u64,
}

impl ViewTicket {
    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Ordered turns of one document's conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Transcript {
    document_id: Option<DocumentId>,
    turns: Vec<Turn>,
}

impl Transcript {
    /// Document this transcript was loaded for.
    pub fn document_id(&self) -> Option<&DocumentId> {
        self.document_id.as_ref()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Loading flags guarded by `FlagGuard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Uploading,
    Answering,
}

/// Render-ready copy of the session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub documents: Vec<Document>,
    pub active_document_id: Option<DocumentId>,
    pub summary: Option<String>,
    pub turns: Vec<Turn>,
    pub draft: String,
    pub uploading: bool,
    pub answering: bool,
    pub expanded_retrieval: bool,
}

// =============================================================================
// SessionState
// =============================================================================

/// Documents, active view, transcript, draft, and loading flags.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Newest first.
    documents: Vec<Document>,
    active_document_id: Option<DocumentId>,
    transcript: Transcript,
    draft: String,
    uploading: bool,
    answering: bool,
    expanded_retrieval: bool,
    epoch: u64,
    pending_events: Vec<SessionEvent>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Reads --

    /// Known documents, most recent first.
    pub fn list_documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, id: &DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| &d.id == id)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.document(id).is_some()
    }

    pub fn active_document_id(&self) -> Option<&DocumentId> {
        self.active_document_id.as_ref()
    }

    pub fn active_document(&self) -> Option<&Document> {
        self.active_document_id
            .as_ref()
            .and_then(|id| self.document(id))
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Turns that may be rendered under the active document's header.
    ///
    /// Empty whenever the transcript is stamped with a different document.
    pub fn visible_turns(&self) -> &[Turn] {
        if self.transcript.document_id == self.active_document_id {
            &self.transcript.turns
        } else {
            &[]
        }
    }

    /// Cached summary of the active document, with placeholders.
    pub fn displayed_summary(&self) -> Option<&str> {
        self.active_document().map(Document::summary_text)
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn is_answering(&self) -> bool {
        self.answering
    }

    pub fn expanded_retrieval(&self) -> bool {
        self.expanded_retrieval
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Uploading => self.uploading,
            Flag::Answering => self.answering,
        }
    }

    /// Ticket for the current view, if a document is active.
    pub fn ticket(&self) -> Option<ViewTicket> {
        self.active_document_id.clone().map(|document_id| ViewTicket {
            document_id,
            epoch: self.epoch,
        })
    }

    /// Whether `ticket` still names the view on screen.
    pub fn is_current(&self, ticket: &ViewTicket) -> bool {
        self.epoch == ticket.epoch && self.active_document_id.as_ref() == Some(&ticket.document_id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            documents: self.documents.clone(),
            active_document_id: self.active_document_id.clone(),
            summary: self.displayed_summary().map(str::to_string),
            turns: self.visible_turns().to_vec(),
            draft: self.draft.clone(),
            uploading: self.uploading,
            answering: self.answering,
            expanded_retrieval: self.expanded_retrieval,
        }
    }

    // -- Primitive mutations --

    /// Replace the active document identity.
    ///
    /// Leaves the transcript alone; callers pair this with `set_transcript`
    /// in the same step, or use `switch_view`.
    pub fn set_active_document(&mut self, id: Option<&DocumentId>) -> Result<(), ChatError> {
        if let Some(id) = id {
            if !self.contains(id) {
                return Err(ChatError::UnknownDocument(id.clone()));
            }
        }
        self.activate(id.cloned());
        Ok(())
    }

    /// Replace the transcript wholesale, stamping it with the active document.
    pub fn set_transcript(&mut self, turns: Vec<Turn>) {
        self.transcript = Transcript {
            document_id: self.active_document_id.clone(),
            turns,
        };
        self.emit(SessionEvent::TranscriptReplaced {
            document_id: self.active_document_id.clone(),
            turns: self.transcript.len(),
        });
    }

    /// Append to the active document's transcript.
    pub fn append_turn(&mut self, turn: Turn) -> Result<(), ChatError> {
        let document_id = self
            .active_document_id
            .clone()
            .ok_or(ChatError::NoActiveDocument)?;
        if self.transcript.document_id.as_ref() != Some(&document_id) {
            return Err(ChatError::StaleDocument);
        }
        self.emit(SessionEvent::TurnAppended {
            document_id,
            role: turn.role,
            synthetic: turn.synthetic,
        });
        self.transcript.turns.push(turn);
        Ok(())
    }

    /// Pop the last turn if it matches `predicate`.
    ///
    /// Only touches a transcript stamped with the active document.
    pub fn remove_last_turn_if(&mut self, predicate: impl FnOnce(&Turn) -> bool) -> Option<Turn> {
        if self.active_document_id.is_none() || self.transcript.document_id != self.active_document_id {
            return None;
        }
        match self.transcript.turns.last() {
            Some(last) if predicate(last) => self.transcript.turns.pop(),
            _ => None,
        }
    }

    /// Insert a newly created document at the head of the list.
    ///
    /// Never overwrites: an existing id fails with `DuplicateId` and leaves
    /// the list unchanged.
    pub fn upsert_document(&mut self, document: Document) -> Result<(), ChatError> {
        if self.contains(&document.id) {
            return Err(ChatError::DuplicateId(document.id));
        }
        self.emit(SessionEvent::DocumentUploaded {
            document_id: document.id.clone(),
            status: document.status,
        });
        self.documents.insert(0, document);
        Ok(())
    }

    /// Replace the whole list, keeping the first occurrence of each id.
    ///
    /// Does not touch the active document; callers reconcile it.
    pub fn replace_documents(&mut self, documents: Vec<Document>) {
        let mut unique: Vec<Document> = Vec::with_capacity(documents.len());
        for document in documents {
            if !unique.iter().any(|d| d.id == document.id) {
                unique.push(document);
            }
        }
        self.documents = unique;
        self.emit(SessionEvent::DocumentsRefreshed {
            count: self.documents.len(),
        });
    }

    /// Remove a document. Does not reassign the active document.
    pub fn remove_document(&mut self, id: &DocumentId) -> Option<Document> {
        let index = self.documents.iter().position(|d| &d.id == id)?;
        self.emit(SessionEvent::DocumentRemoved {
            document_id: id.clone(),
        });
        Some(self.documents.remove(index))
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    pub fn clear_draft(&mut self) {
        self.draft.clear();
    }

    pub fn set_expanded_retrieval(&mut self, expanded: bool) {
        if self.expanded_retrieval != expanded {
            self.expanded_retrieval = expanded;
            self.emit(SessionEvent::RetrievalModeChanged { expanded });
        }
    }

    pub(crate) fn set_flag(&mut self, flag: Flag, value: bool) {
        let slot = match flag {
            Flag::Uploading => &mut self.uploading,
            Flag::Answering => &mut self.answering,
        };
        if *slot == value {
            return;
        }
        *slot = value;
        self.emit(match flag {
            Flag::Uploading => SessionEvent::UploadingChanged { active: value },
            Flag::Answering => SessionEvent::AnsweringChanged { active: value },
        });
    }

    // -- View transitions --

    /// Make `id` active with `turns` as its transcript, in one step.
    ///
    /// Retrieval mode resets to document-only whenever the view changes.
    pub fn switch_view(
        &mut self,
        id: Option<&DocumentId>,
        turns: Vec<Turn>,
    ) -> Result<Option<ViewTicket>, ChatError> {
        self.set_active_document(id)?;
        self.set_transcript(turns);
        self.set_expanded_retrieval(false);
        Ok(self.ticket())
    }

    /// Return to the "no document selected" view and clear the draft.
    pub fn reset_view(&mut self) {
        self.activate(None);
        self.set_transcript(Vec::new());
        self.set_expanded_retrieval(false);
        self.clear_draft();
    }

    /// Append only if `ticket` is still the current view.
    pub fn append_turn_for(&mut self, ticket: &ViewTicket, turn: Turn) -> Result<(), ChatError> {
        if !self.is_current(ticket) {
            return Err(ChatError::StaleDocument);
        }
        self.append_turn(turn)
    }

    /// Put `history` ahead of the turns appended since `ticket` was issued.
    ///
    /// A view starts with an empty transcript, so whatever it holds now was
    /// added locally while the history was in flight and stays after it.
    pub fn prepend_history_for(
        &mut self,
        ticket: &ViewTicket,
        history: Vec<Turn>,
    ) -> Result<(), ChatError> {
        if !self.is_current(ticket) {
            return Err(ChatError::StaleDocument);
        }
        let mut turns = history;
        turns.append(&mut self.transcript.turns);
        self.set_transcript(turns);
        Ok(())
    }

    /// Note that a result for an abandoned view was dropped.
    pub fn record_discarded(&mut self, ticket: &ViewTicket, operation: &str) {
        tracing::warn!(
            document_id = %ticket.document_id,
            epoch = ticket.epoch,
            current_epoch = self.epoch,
            operation,
            "Discarding result for a document that is no longer active"
        );
        self.emit(SessionEvent::StaleResultDiscarded {
            document_id: ticket.document_id.clone(),
            operation: operation.to_string(),
        });
    }

    // -- Internals --

    fn activate(&mut self, id: Option<DocumentId>) {
        self.epoch += 1;
        tracing::debug!(
            from = ?self.active_document_id,
            to = ?id,
            epoch = self.epoch,
            "Active document changed"
        );
        self.active_document_id = id;
        self.emit(SessionEvent::ActiveDocumentChanged {
            document_id: self.active_document_id.clone(),
            epoch: self.epoch,
        });
    }

    fn emit(&mut self, event: SessionEvent) {
        self.pending_events.push(event);
    }

    fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

// =============================================================================
// SessionStore
// =============================================================================

/// Shared handle to the session state plus its event channel.
pub struct SessionStore {
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state)
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(SessionState::new()),
            events,
        }
    }

    /// Subscribe to events published after each state change.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Run a read-only closure against the state.
    pub fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> Result<R, ChatError> {
        let state = self.lock()?;
        Ok(f(&state))
    }

    /// Run one atomic mutation step, then publish the events it produced.
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> Result<R, ChatError> {
        let (result, events) = {
            let mut state = self.lock()?;
            let result = f(&mut state);
            (result, state.take_events())
        };
        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        Ok(result)
    }

    /// `update` for closures that can fail.
    pub fn try_update<R>(
        &self,
        f: impl FnOnce(&mut SessionState) -> Result<R, ChatError>,
    ) -> Result<R, ChatError> {
        self.update(f)?
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, ChatError> {
        self.read(SessionState::snapshot)
    }

    /// Set `flag` if it is clear. `None` means it was already held.
    pub(crate) fn acquire(&self, flag: Flag) -> Result<Option<FlagGuard<'_>>, ChatError> {
        let acquired = self.update(|state| {
            if state.flag(flag) {
                false
            } else {
                state.set_flag(flag, true);
                true
            }
        })?;
        Ok(acquired.then(|| FlagGuard { store: self, flag }))
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionState>, ChatError> {
        self.state.lock().map_err(|e| {
            tracing::error!("Session state lock poisoned: {}", e);
            ChatError::StateLock
        })
    }
}

/// Clears its flag when dropped, whichever way the holder exits.
pub(crate) struct FlagGuard<'a> {
    store: &'a SessionStore,
    flag: Flag,
}

impl<'a> FlagGuard<'a> {
    /// Take ownership of a flag that was set inside an `update` step.
    pub(crate) fn adopt(store: &'a SessionStore, flag: Flag) -> Self {
        Self { store, flag }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        let flag = self.flag;
        if let Err(e) = self.store.update(|state| state.set_flag(flag, false)) {
            tracing::error!(?flag, error = %e, "Failed to release session flag");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
