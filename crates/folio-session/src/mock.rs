//! Scripted in-memory gateway for session tests.
//!
//! Each endpoint has a queue of replies. `Reply::Gated` parks the call until
//! the test releases it, which is how interleavings are forced.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::oneshot;

use folio_core::{Document, DocumentId, DocumentStatus};
use folio_gateway::{
    AskRequest, AskResponse, DocumentRecord, GatewayError, HistoryEntry, HistoryResponse,
    RemoteGateway, Result, UploadFile, UploadResponse,
};

pub(crate) enum Reply<T> {
    Ready(Result<T>),
    Gated(oneshot::Receiver<Result<T>>),
}

/// A reply that resolves when the returned sender fires.
pub(crate) fn gate<T>() -> (oneshot::Sender<Result<T>>, Reply<T>) {
    let (tx, rx) = oneshot::channel();
    (tx, Reply::Gated(rx))
}

#[derive(Default)]
pub(crate) struct MockGateway {
    uploads: Mutex<VecDeque<Reply<UploadResponse>>>,
    listings: Mutex<VecDeque<Reply<Vec<DocumentRecord>>>>,
    histories: Mutex<VecDeque<Reply<HistoryResponse>>>,
    answers: Mutex<VecDeque<Reply<AskResponse>>>,
    deletions: Mutex<VecDeque<Reply<()>>>,
    pub asked: Mutex<Vec<AskRequest>>,
    pub history_requests: Mutex<Vec<DocumentId>>,
    pub uploaded: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<DocumentId>>,
    pub listed: Mutex<usize>,
}

impl MockGateway {
    pub fn on_upload(&self, reply: Reply<UploadResponse>) {
        self.uploads.lock().unwrap().push_back(reply);
    }

    pub fn on_list(&self, reply: Reply<Vec<DocumentRecord>>) {
        self.listings.lock().unwrap().push_back(reply);
    }

    pub fn on_history(&self, reply: Reply<HistoryResponse>) {
        self.histories.lock().unwrap().push_back(reply);
    }

    pub fn on_ask(&self, reply: Reply<AskResponse>) {
        self.answers.lock().unwrap().push_back(reply);
    }

    pub fn on_delete(&self, reply: Reply<()>) {
        self.deletions.lock().unwrap().push_back(reply);
    }

    pub fn asked(&self) -> Vec<AskRequest> {
        self.asked.lock().unwrap().clone()
    }

    pub fn ask_count(&self) -> usize {
        self.asked.lock().unwrap().len()
    }

    pub fn history_count(&self) -> usize {
        self.history_requests.lock().unwrap().len()
    }
}

async fn resolve<T>(queue: &Mutex<VecDeque<Reply<T>>>, endpoint: &str) -> Result<T> {
    let reply = queue.lock().unwrap().pop_front();
    match reply {
        Some(Reply::Ready(result)) => result,
        Some(Reply::Gated(rx)) => rx
            .await
            .unwrap_or_else(|_| Err(GatewayError::Connection("gate dropped".to_string()))),
        None => Err(GatewayError::Connection(format!("no scripted {} reply", endpoint))),
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn upload(&self, file: &UploadFile) -> Result<UploadResponse> {
        self.uploaded.lock().unwrap().push(file.file_name.clone());
        resolve(&self.uploads, "upload").await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        *self.listed.lock().unwrap() += 1;
        resolve(&self.listings, "list").await
    }

    async fn history(&self, document_id: &DocumentId) -> Result<HistoryResponse> {
        self.history_requests.lock().unwrap().push(document_id.clone());
        resolve(&self.histories, "history").await
    }

    async fn ask(&self, request: &AskRequest) -> Result<AskResponse> {
        self.asked.lock().unwrap().push(request.clone());
        resolve(&self.answers, "ask").await
    }

    async fn delete_document(&self, document_id: &DocumentId) -> Result<()> {
        self.deleted.lock().unwrap().push(document_id.clone());
        resolve(&self.deletions, "delete").await
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub(crate) fn document(id: &str) -> Document {
    Document {
        id: DocumentId::new(id),
        title: Some(format!("Title {}", id)),
        file_name: format!("{}.pdf", id),
        summary: Some(format!("summary of {}", id)),
        status: DocumentStatus::Ready,
        created_at: Utc::now(),
    }
}

pub(crate) fn uploaded(id: &str, summary: &str) -> Reply<UploadResponse> {
    Reply::Ready(upload_response(id, summary))
}

pub(crate) fn upload_response(id: &str, summary: &str) -> Result<UploadResponse> {
    Ok(UploadResponse {
        pdf_id: id.to_string(),
        title: Some(format!("Title {}", id)),
        file_name: Some(format!("{}.pdf", id)),
        summary: Some(summary.to_string()),
        status: None,
    })
}

pub(crate) fn record(id: &str, day: u32) -> DocumentRecord {
    let created_at = Utc
        .with_ymd_and_hms(2024, 1, day, 12, 0, 0)
        .single()
        .map(|dt| dt.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string());
    DocumentRecord {
        pdf_id: id.to_string(),
        title: Some(format!("Title {}", id)),
        file_name: Some(format!("{}.pdf", id)),
        summary: Some(format!("summary of {}", id)),
        created_at,
        status: None,
    }
}

pub(crate) fn history(entries: &[(&str, &str)]) -> Reply<HistoryResponse> {
    Reply::Ready(Ok(HistoryResponse {
        pdf_id: None,
        title: None,
        history: entries
            .iter()
            .map(|(role, content)| HistoryEntry {
                role: role.to_string(),
                content: content.to_string(),
                sources: Vec::new(),
            })
            .collect(),
    }))
}

pub(crate) fn answer(text: &str) -> Result<AskResponse> {
    Ok(AskResponse {
        answer: text.to_string(),
        sources: Vec::new(),
    })
}

/// Yield to sibling futures until `cond` holds.
pub(crate) async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
