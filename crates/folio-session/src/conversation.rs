//! Conversation coordinator: ask questions about the active document.

use std::sync::Arc;

use tracing::{debug, info, warn};

use folio_core::Turn;
use folio_gateway::{AskRequest, RemoteGateway};

use crate::error::ChatError;
use crate::store::{Flag, FlagGuard, SessionStore};

/// How a question ended.
#[derive(Debug)]
pub enum AskOutcome {
    /// Blank question; nothing was sent.
    Skipped,
    /// The answer was appended.
    Answered(Turn),
    /// The request failed; a synthetic error turn was appended instead.
    Failed { turn: Turn, error: ChatError },
    /// The user switched documents before the answer arrived; nothing was
    /// appended.
    Discarded,
}

pub struct ConversationCoordinator {
    store: Arc<SessionStore>,
    gateway: Arc<dyn RemoteGateway>,
    error_text: String,
    /// 0 disables the check.
    max_question_chars: usize,
}

impl ConversationCoordinator {
    pub fn new(
        store: Arc<SessionStore>,
        gateway: Arc<dyn RemoteGateway>,
        error_text: impl Into<String>,
        max_question_chars: usize,
    ) -> Self {
        Self {
            store,
            gateway,
            error_text: error_text.into(),
            max_question_chars,
        }
    }

    pub fn expanded_retrieval(&self) -> Result<bool, ChatError> {
        self.store.read(|state| state.expanded_retrieval())
    }

    /// Choose between document-only and expanded retrieval for later questions.
    pub fn set_expanded_retrieval(&self, expanded: bool) -> Result<(), ChatError> {
        self.store
            .update(|state| state.set_expanded_retrieval(expanded))?;
        debug!(expanded, "Retrieval mode set");
        Ok(())
    }

    /// Flip the retrieval mode, returning the new value.
    pub fn toggle_expanded_retrieval(&self) -> Result<bool, ChatError> {
        self.store.update(|state| {
            let expanded = !state.expanded_retrieval();
            state.set_expanded_retrieval(expanded);
            expanded
        })
    }

    /// Ask `question` about the active document.
    ///
    /// The user turn is appended and `answering` set in one step before the
    /// request goes out. The answer, or a synthetic error turn, is appended
    /// only if the same view is still current when the response arrives.
    /// Only one question may be in flight at a time.
    ///
    /// The draft is cleared once the question is accepted and kept if it is
    /// refused.
    pub async fn ask(&self, question: &str) -> Result<AskOutcome, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            debug!("Ignoring blank question");
            return Ok(AskOutcome::Skipped);
        }
        if self.max_question_chars > 0 && question.chars().count() > self.max_question_chars {
            return Err(ChatError::QuestionTooLong(self.max_question_chars));
        }

        let user_turn = Turn::user(question);
        let (ticket, request) = self.store.try_update(|state| {
            if state.is_answering() {
                return Err(ChatError::AlreadyAnswering);
            }
            let ticket = state.ticket().ok_or(ChatError::NoActiveDocument)?;
            state.append_turn(user_turn)?;
            state.clear_draft();
            state.set_flag(Flag::Answering, true);
            let request = AskRequest {
                document_id: ticket.document_id().clone(),
                question: question.to_string(),
                expanded_retrieval: state.expanded_retrieval(),
            };
            Ok((ticket, request))
        })?;
        let _answering = FlagGuard::adopt(&self.store, Flag::Answering);

        info!(
            document_id = %request.document_id,
            expanded = request.expanded_retrieval,
            chars = question.chars().count(),
            "Question sent"
        );
        let result = self.gateway.ask(&request).await;

        self.store.try_update(|state| {
            if !state.is_current(&ticket) {
                state.record_discarded(&ticket, "ask");
                return Ok(AskOutcome::Discarded);
            }
            match result {
                Ok(response) => {
                    let turn = Turn::assistant(response.answer, response.sources);
                    state.append_turn_for(&ticket, turn.clone())?;
                    Ok(AskOutcome::Answered(turn))
                }
                Err(e) => {
                    warn!(document_id = %ticket.document_id(), error = %e, "Question failed");
                    let turn = Turn::synthetic_assistant(self.error_text.clone());
                    state.append_turn_for(&ticket, turn.clone())?;
                    Ok(AskOutcome::Failed {
                        turn,
                        error: ChatError::AskFailed(e.to_string()),
                    })
                }
            }
        })
    }

    /// Ask whatever is in the draft buffer.
    pub async fn submit_draft(&self) -> Result<AskOutcome, ChatError> {
        let draft = self.store.read(|state| state.draft().to_string())?;
        self.ask(&draft).await
    }
}
