//! Error types for the session core.

use folio_core::DocumentId;
use folio_gateway::GatewayError;

/// Errors from session operations.
///
/// `UploadFailed`, `DeleteFailed` and `RefreshFailed` are user-facing
/// failures that leave the session untouched. `HistoryFetchFailed` and
/// `AskFailed` are reported in-context as synthetic assistant turns.
/// `UnknownDocument`, `DuplicateId` and `StaleDocument` mean a caller
/// sequenced operations wrongly.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("history fetch failed: {0}")]
    HistoryFetchFailed(String),
    #[error("question failed: {0}")]
    AskFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("document refresh failed: {0}")]
    RefreshFailed(String),
    #[error("unknown document: {0}")]
    UnknownDocument(DocumentId),
    #[error("duplicate document id: {0}")]
    DuplicateId(DocumentId),
    #[error("transcript does not belong to the active document")]
    StaleDocument,
    #[error("no document is selected")]
    NoActiveDocument,
    #[error("a question is already being answered")]
    AlreadyAnswering,
    #[error("an upload is already in progress")]
    UploadInProgress,
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),
    #[error("question exceeds maximum length of {0} characters")]
    QuestionTooLong(usize),
    #[error("session state lock poisoned")]
    StateLock,
}

impl ChatError {
    /// Whether this error signals a caller sequencing bug rather than a
    /// remote or user-input failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ChatError::UnknownDocument(_) | ChatError::DuplicateId(_) | ChatError::StaleDocument
        )
    }

    pub(crate) fn upload(err: GatewayError) -> Self {
        ChatError::UploadFailed(err.to_string())
    }

    pub(crate) fn delete(err: GatewayError) -> Self {
        ChatError::DeleteFailed(err.to_string())
    }
}
