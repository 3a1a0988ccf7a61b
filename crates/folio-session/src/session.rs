//! `Session`: one client session wired from configuration.

use std::sync::Arc;

use tokio::sync::broadcast;

use folio_core::{DocumentId, FolioConfig, SessionEvent};
use folio_gateway::{RemoteGateway, UploadFile};

use crate::conversation::{AskOutcome, ConversationCoordinator};
use crate::error::ChatError;
use crate::history::{HistoryLoader, HistoryOutcome};
use crate::lifecycle::LifecycleController;
use crate::store::{SessionSnapshot, SessionStore};
use crate::upload::{UploadCoordinator, UploadOutcome, UploadPolicy};

/// Owns the store and every coordinator that acts on it.
///
/// All methods take `&self`, so independent operations can be in flight
/// at once (an upload while a question is being answered, say).
pub struct Session {
    store: Arc<SessionStore>,
    uploads: UploadCoordinator,
    history: HistoryLoader,
    conversation: ConversationCoordinator,
    lifecycle: LifecycleController,
}

impl Session {
    pub fn new(gateway: Arc<dyn RemoteGateway>, config: &FolioConfig) -> Self {
        let store = Arc::new(SessionStore::new());
        Self {
            uploads: UploadCoordinator::new(
                store.clone(),
                gateway.clone(),
                UploadPolicy::from_config(&config.upload),
            ),
            history: HistoryLoader::new(
                store.clone(),
                gateway.clone(),
                config.chat.history_error_text.clone(),
            ),
            conversation: ConversationCoordinator::new(
                store.clone(),
                gateway.clone(),
                config.chat.ask_error_text.clone(),
                config.chat.max_question_chars,
            ),
            lifecycle: LifecycleController::new(store.clone(), gateway),
            store,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.store.subscribe()
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, ChatError> {
        self.store.snapshot()
    }

    pub async fn upload(&self, file: &UploadFile) -> Result<UploadOutcome, ChatError> {
        self.uploads.upload(file).await
    }

    pub async fn select_document(&self, id: &DocumentId) -> Result<HistoryOutcome, ChatError> {
        self.history.select_document(id).await
    }

    pub async fn ask(&self, question: &str) -> Result<AskOutcome, ChatError> {
        self.conversation.ask(question).await
    }

    pub fn set_draft(&self, draft: impl Into<String>) -> Result<(), ChatError> {
        let draft = draft.into();
        self.store.update(|state| state.set_draft(draft))
    }

    pub async fn submit_draft(&self) -> Result<AskOutcome, ChatError> {
        self.conversation.submit_draft().await
    }

    pub fn set_expanded_retrieval(&self, expanded: bool) -> Result<(), ChatError> {
        self.conversation.set_expanded_retrieval(expanded)
    }

    pub fn toggle_expanded_retrieval(&self) -> Result<bool, ChatError> {
        self.conversation.toggle_expanded_retrieval()
    }

    pub fn start_new_session(&self) -> Result<(), ChatError> {
        self.lifecycle.start_new_session()
    }

    pub async fn delete_document(&self, id: &DocumentId) -> Result<bool, ChatError> {
        self.lifecycle.delete_document(id).await
    }

    pub async fn refresh_documents(&self) -> Result<usize, ChatError> {
        self.lifecycle.refresh_documents().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{answer, gate, history, uploaded, wait_until, MockGateway, Reply};
    use folio_core::Role;

    fn session(mock: &Arc<MockGateway>) -> Session {
        Session::new(mock.clone(), &FolioConfig::default())
    }

    fn id(s: &str) -> DocumentId {
        DocumentId::new(s)
    }

    #[tokio::test]
    async fn test_upload_then_ask() {
        let mock = Arc::new(MockGateway::default());
        mock.on_upload(uploaded("d1", "S"));
        mock.on_ask(Reply::Ready(answer("Y")));
        let session = session(&mock);

        let outcome = session
            .upload(&UploadFile::new("paper.pdf", b"%PDF".to_vec()))
            .await
            .unwrap();
        assert_eq!(outcome.summary(), "S");

        session.ask("X").await.unwrap();
        let snap = session.snapshot().unwrap();
        assert_eq!(snap.summary.as_deref(), Some("S"));
        let turns: Vec<_> = snap.turns.iter().map(|t| (t.role, t.content.clone())).collect();
        assert_eq!(
            turns,
            vec![(Role::User, "X".to_string()), (Role::Assistant, "Y".to_string())]
        );
    }

    #[tokio::test]
    async fn test_switching_documents_resets_retrieval_mode() {
        let mock = Arc::new(MockGateway::default());
        mock.on_upload(uploaded("d1", "S1"));
        mock.on_upload(uploaded("d2", "S2"));
        mock.on_history(history(&[]));
        let session = session(&mock);

        session.upload(&UploadFile::new("d1.pdf", vec![])).await.unwrap();
        session.upload(&UploadFile::new("d2.pdf", vec![])).await.unwrap();
        session.set_expanded_retrieval(true).unwrap();

        session.select_document(&id("d1")).await.unwrap();
        assert!(!session.snapshot().unwrap().expanded_retrieval);
    }

    #[tokio::test]
    async fn test_new_session_discards_inflight_answer() {
        let mock = Arc::new(MockGateway::default());
        mock.on_upload(uploaded("d1", "S"));
        let (tx, reply) = gate();
        mock.on_ask(reply);
        let session = session(&mock);
        session.upload(&UploadFile::new("d1.pdf", vec![])).await.unwrap();

        let ask = session.ask("X");
        let reset = async {
            wait_until(|| mock.ask_count() == 1).await;
            session.start_new_session().unwrap();
            let _ = tx.send(answer("late"));
        };
        let (outcome, ()) = tokio::join!(ask, reset);

        assert!(matches!(outcome.unwrap(), AskOutcome::Discarded));
        let snap = session.snapshot().unwrap();
        assert_eq!(snap.active_document_id, None);
        assert!(snap.turns.is_empty());
        assert!(!snap.answering);
    }

    #[tokio::test]
    async fn test_upload_while_answering() {
        let mock = Arc::new(MockGateway::default());
        mock.on_upload(uploaded("d1", "S1"));
        mock.on_upload(uploaded("d2", "S2"));
        let (tx, reply) = gate();
        mock.on_ask(reply);
        let session = session(&mock);
        session.upload(&UploadFile::new("d1.pdf", vec![])).await.unwrap();

        let ask = session.ask("about d1");
        let upload = async {
            wait_until(|| mock.ask_count() == 1).await;
            let outcome = session.upload(&UploadFile::new("d2.pdf", vec![])).await;
            let _ = tx.send(answer("late"));
            outcome
        };
        let (asked, uploaded) = tokio::join!(ask, upload);

        assert!(uploaded.is_ok());
        assert!(matches!(asked.unwrap(), AskOutcome::Discarded));
        let snap = session.snapshot().unwrap();
        assert_eq!(snap.active_document_id, Some(id("d2")));
        assert!(snap.turns.is_empty());
    }

    #[tokio::test]
    async fn test_draft_round_trip() {
        let mock = Arc::new(MockGateway::default());
        mock.on_upload(uploaded("d1", "S"));
        mock.on_ask(Reply::Ready(answer("A")));
        let session = session(&mock);
        session.upload(&UploadFile::new("d1.pdf", vec![])).await.unwrap();

        session.set_draft("hello").unwrap();
        assert_eq!(session.snapshot().unwrap().draft, "hello");
        session.submit_draft().await.unwrap();
        assert_eq!(session.snapshot().unwrap().draft, "");
        assert_eq!(mock.asked()[0].question, "hello");
    }
}
