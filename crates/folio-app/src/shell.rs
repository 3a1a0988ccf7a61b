//! Line-oriented shell over a `Session`.
//!
//! Lines starting with `/` are commands; anything else is a question about
//! the active document.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use folio_core::{Document, DocumentId, Role, Turn};
use folio_gateway::{GatewayError, UploadFile};
use folio_session::{AskOutcome, ChatError, HistoryOutcome, Session, SessionSnapshot};

pub const HELP_TEXT: &str = "\
Commands:
  /upload <path>              upload a PDF and open it
  /docs                       list documents (* marks the open one)
  /refresh                    reload the document list from the server
  /select <id>                open a document and load its conversation
  /new                        close the open document
  /delete <id>                delete a document
  /mode [document|expanded]   show or set the retrieval mode
  /history                    show the open conversation
  /help                       show this help
  /quit                       exit
Anything else is sent as a question about the open document.";

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("unknown command: /{0} (try /help)")]
    UnknownCommand(String),
    #[error(transparent)]
    Session(#[from] ChatError),
    #[error("cannot read file: {0}")]
    File(#[from] GatewayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Document,
    Expanded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload(PathBuf),
    Docs,
    Refresh,
    Select(DocumentId),
    New,
    Delete(DocumentId),
    Mode(Option<ModeArg>),
    History,
    Help,
    Quit,
    Ask(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ShellError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Command::Empty);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Ask(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let required = |usage: &'static str| {
            if arg.is_empty() {
                Err(ShellError::Usage(usage))
            } else {
                Ok(arg)
            }
        };

        match name.to_ascii_lowercase().as_str() {
            "upload" => Ok(Command::Upload(PathBuf::from(required("/upload <path>")?))),
            "docs" | "documents" => Ok(Command::Docs),
            "refresh" => Ok(Command::Refresh),
            "select" | "open" => Ok(Command::Select(DocumentId::new(required("/select <id>")?))),
            "new" => Ok(Command::New),
            "delete" => Ok(Command::Delete(DocumentId::new(required("/delete <id>")?))),
            "mode" => match arg.to_ascii_lowercase().as_str() {
                "" => Ok(Command::Mode(None)),
                "document" | "doc" => Ok(Command::Mode(Some(ModeArg::Document))),
                "expanded" | "study" => Ok(Command::Mode(Some(ModeArg::Expanded))),
                _ => Err(ShellError::Usage("/mode [document|expanded]")),
            },
            "history" => Ok(Command::History),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(ShellError::UnknownCommand(other.to_string())),
        }
    }
}

/// Run one command against the session and return what to print.
pub async fn execute(session: &Session, command: Command) -> Result<String, ShellError> {
    match command {
        Command::Empty | Command::Quit => Ok(String::new()),
        Command::Help => Ok(HELP_TEXT.to_string()),
        Command::Upload(path) => {
            let file = UploadFile::from_path(&path).await?;
            let outcome = session.upload(&file).await?;
            Ok(format!(
                "Uploaded {} ({})\n\n{}",
                outcome.document.display_title(),
                outcome.document.id,
                outcome.summary()
            ))
        }
        Command::Docs => Ok(render_documents(&session.snapshot()?)),
        Command::Refresh => {
            session.refresh_documents().await?;
            Ok(render_documents(&session.snapshot()?))
        }
        Command::Select(id) => {
            let outcome = session.select_document(&id).await?;
            let snapshot = session.snapshot()?;
            let mut out = render_header(&snapshot);
            if let HistoryOutcome::Failed(e) = outcome {
                tracing::debug!(error = %e, "History unavailable");
            }
            if !snapshot.turns.is_empty() {
                out.push_str("\n\n");
                out.push_str(&render_transcript(&snapshot));
            }
            Ok(out)
        }
        Command::New => {
            session.start_new_session()?;
            Ok("No document open. Use /select <id> or /upload <path>.".to_string())
        }
        Command::Delete(id) => {
            let was_active = session.delete_document(&id).await?;
            Ok(if was_active {
                format!("Deleted {}. No document open.", id)
            } else {
                format!("Deleted {}.", id)
            })
        }
        Command::Mode(arg) => {
            if let Some(arg) = arg {
                session.set_expanded_retrieval(arg == ModeArg::Expanded)?;
            }
            Ok(render_mode(session.snapshot()?.expanded_retrieval))
        }
        Command::History => {
            let snapshot = session.snapshot()?;
            if snapshot.active_document_id.is_none() {
                return Err(ChatError::NoActiveDocument.into());
            }
            Ok(render_transcript(&snapshot))
        }
        Command::Ask(question) => Ok(render_outcome(&session.ask(&question).await?)),
    }
}

// =============================================================================
// Rendering
// =============================================================================

pub fn render_mode(expanded: bool) -> String {
    if expanded {
        "Retrieval mode: expanded (answers may draw on related sources)".to_string()
    } else {
        "Retrieval mode: document (answers use this document only)".to_string()
    }
}

fn render_date(created_at: &DateTime<Utc>) -> String {
    if *created_at == DateTime::<Utc>::MIN_UTC {
        "-".to_string()
    } else {
        created_at.format("%Y-%m-%d").to_string()
    }
}

fn render_document_line(document: &Document, active: bool) -> String {
    format!(
        "{} {}  {}  {}  [{}]",
        if active { "*" } else { " " },
        document.id,
        document.display_title(),
        render_date(&document.created_at),
        document.status
    )
}

pub fn render_documents(snapshot: &SessionSnapshot) -> String {
    if snapshot.documents.is_empty() {
        return "No documents yet. Use /upload <path>.".to_string();
    }
    snapshot
        .documents
        .iter()
        .map(|d| render_document_line(d, snapshot.active_document_id.as_ref() == Some(&d.id)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Title and summary of the open document.
pub fn render_header(snapshot: &SessionSnapshot) -> String {
    let Some(active) = snapshot.active_document_id.as_ref() else {
        return "No document open.".to_string();
    };
    let title = snapshot
        .documents
        .iter()
        .find(|d| &d.id == active)
        .map(Document::display_title)
        .unwrap_or(active.as_str());
    format!(
        "== {} ==\n{}",
        title,
        snapshot.summary.as_deref().unwrap_or_default()
    )
}

pub fn render_turn(turn: &Turn) -> String {
    let speaker = match turn.role {
        Role::User => "you",
        Role::Assistant => "folio",
    };
    let mut out = format!("{}: {}", speaker, turn.content);
    if !turn.sources.is_empty() {
        let sources: Vec<String> = turn.sources.iter().map(ToString::to_string).collect();
        let _ = write!(out, "\n  sources: {}", sources.join(", "));
    }
    out
}

pub fn render_transcript(snapshot: &SessionSnapshot) -> String {
    if snapshot.turns.is_empty() {
        return "(no messages yet)".to_string();
    }
    snapshot
        .turns
        .iter()
        .map(render_turn)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_outcome(outcome: &AskOutcome) -> String {
    match outcome {
        AskOutcome::Skipped => String::new(),
        AskOutcome::Answered(turn) => render_turn(turn),
        AskOutcome::Failed { turn, .. } => render_turn(turn),
        AskOutcome::Discarded => "(answer dropped: the open document changed)".to_string(),
    }
}
