use serde::{Deserialize, Serialize};

use crate::types::{DocumentId, DocumentStatus, Role};

/// Session-level events emitted after state changes.
///
/// Events are published on the session store's broadcast channel and
/// consumed by renderers and by the shell's event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SessionEvent {
    /// The document list was replaced from a remote listing.
    DocumentsRefreshed { count: usize },

    /// A newly uploaded document was inserted at the head of the list.
    DocumentUploaded {
        document_id: DocumentId,
        status: DocumentStatus,
    },

    /// The active document changed. `None` means no document is selected.
    ActiveDocumentChanged {
        document_id: Option<DocumentId>,
        epoch: u64,
    },

    /// The transcript was replaced wholesale.
    TranscriptReplaced {
        document_id: Option<DocumentId>,
        turns: usize,
    },

    /// A turn was appended to the active transcript.
    TurnAppended {
        document_id: DocumentId,
        role: Role,
        synthetic: bool,
    },

    /// A document was removed from the list.
    DocumentRemoved { document_id: DocumentId },

    /// The `uploading` flag changed.
    UploadingChanged { active: bool },

    /// The `answering` flag changed.
    AnsweringChanged { active: bool },

    /// The retrieval mode toggle changed.
    RetrievalModeChanged { expanded: bool },

    /// A remote result arrived for a view that is no longer active.
    StaleResultDiscarded {
        document_id: DocumentId,
        operation: String,
    },
}

impl SessionEvent {
    /// Short machine-readable name.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::DocumentsRefreshed { .. } => "documents_refreshed",
            SessionEvent::DocumentUploaded { .. } => "document_uploaded",
            SessionEvent::ActiveDocumentChanged { .. } => "active_document_changed",
            SessionEvent::TranscriptReplaced { .. } => "transcript_replaced",
            SessionEvent::TurnAppended { .. } => "turn_appended",
            SessionEvent::DocumentRemoved { .. } => "document_removed",
            SessionEvent::UploadingChanged { .. } => "uploading_changed",
            SessionEvent::AnsweringChanged { .. } => "answering_changed",
            SessionEvent::RetrievalModeChanged { .. } => "retrieval_mode_changed",
            SessionEvent::StaleResultDiscarded { .. } => "stale_result_discarded",
        }
    }
}
