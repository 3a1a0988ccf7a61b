//! The remote service contract consumed by the session core.

use std::path::Path;

use async_trait::async_trait;

use folio_core::DocumentId;

use crate::error::{GatewayError, Result};
use crate::wire::{AskRequest, AskResponse, DocumentRecord, HistoryResponse, UploadResponse};

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Build an upload from in-memory bytes, guessing the MIME type from the name.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    /// Read a file from disk.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!("not a file path: {}", path.display()))
            })?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(file_name, bytes))
    }

    /// Lowercased extension without the dot, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }
}

/// Stateless request/response API of the document service.
///
/// Implementations must not retry on their own; retry is always a fresh
/// user action.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Upload a file and receive its server-side record.
    async fn upload(&self, file: &UploadFile) -> Result<UploadResponse>;

    /// List the user's documents.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>>;

    /// Fetch the stored conversation of one document.
    async fn history(&self, document_id: &DocumentId) -> Result<HistoryResponse>;

    /// Ask a question about a document.
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse>;

    /// Delete a document and its conversation.
    async fn delete_document(&self, document_id: &DocumentId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_upload_file_guesses_mime() {
        let file = UploadFile::new("Paper.PDF", vec![1, 2, 3]);
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.extension().as_deref(), Some("pdf"));

        let file = UploadFile::new("notes", vec![]);
        assert_eq!(file.mime_type, "application/octet-stream");
        assert_eq!(file.extension(), None);
    }

    #[tokio::test]
    async fn test_upload_file_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"%PDF-1.4").unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.file_name, "report.pdf");
        assert_eq!(file.bytes, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_upload_file_missing_path() {
        let err = UploadFile::from_path(Path::new("/nonexistent/folio/report.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Io(_)));
    }
}
