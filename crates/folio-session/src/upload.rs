//! Upload coordinator: send a file, register the result, and open it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use folio_core::config::UploadConfig;
use folio_core::Document;
use folio_gateway::{RemoteGateway, UploadFile};

use crate::error::ChatError;
use crate::store::{Flag, SessionStore};

/// Client-side file type check. The server enforces the real policy.
#[derive(Debug, Clone, Default)]
pub struct UploadPolicy {
    allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// An empty allow-list accepts everything.
    pub fn allows(&self, file: &UploadFile) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        file.extension()
            .map(|ext| self.allowed_extensions.iter().any(|a| a == &ext))
            .unwrap_or(false)
    }

    pub fn check(&self, file: &UploadFile) -> Result<(), ChatError> {
        if self.allows(file) {
            Ok(())
        } else {
            Err(ChatError::UnsupportedFile(file.file_name.clone()))
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub document: Document,
}

impl UploadOutcome {
    /// Summary to show right after the upload.
    pub fn summary(&self) -> &str {
        self.document.summary_text()
    }
}

pub struct UploadCoordinator {
    store: Arc<SessionStore>,
    gateway: Arc<dyn RemoteGateway>,
    policy: UploadPolicy,
}

impl UploadCoordinator {
    pub fn new(
        store: Arc<SessionStore>,
        gateway: Arc<dyn RemoteGateway>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            policy,
        }
    }

    /// Upload `file` and make the new document active with an empty
    /// transcript.
    ///
    /// On failure the document list and active document are untouched.
    /// `uploading` is cleared however this future ends, including when it
    /// is dropped mid-flight.
    pub async fn upload(&self, file: &UploadFile) -> Result<UploadOutcome, ChatError> {
        self.policy.check(file)?;
        let _uploading = self
            .store
            .acquire(Flag::Uploading)?
            .ok_or(ChatError::UploadInProgress)?;

        let response = self.gateway.upload(file).await.map_err(|e| {
            warn!(file_name = %file.file_name, error = %e, "Upload failed");
            ChatError::upload(e)
        })?;

        let document = response.into_document(&file.file_name, Utc::now());
        self.store
            .try_update(|state| {
                state.upsert_document(document.clone())?;
                state.switch_view(Some(&document.id), Vec::new())?;
                Ok(())
            })
            .map_err(|e| {
                if e.is_contract_violation() {
                    error!(document_id = %document.id, error = %e, "Server returned an id that is already known");
                }
                e
            })?;

        info!(
            document_id = %document.id,
            file_name = %document.file_name,
            status = %document.status,
            "Document uploaded"
        );
        Ok(UploadOutcome { document })
    }
}
