use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shown when a document has no summary and is not being processed.
pub const NO_SUMMARY_TEXT: &str = "No summary available.";

/// Shown while the server is still generating a document's summary.
pub const PENDING_SUMMARY_TEXT: &str = "Summary is still being generated.";

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque server-assigned document identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Server-side processing state of an uploaded document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Summary generated, document can be queried.
    #[default]
    Ready,
    /// Accepted by the server; summary not generated yet.
    Processing,
    /// Server-side processing failed.
    Failed,
}

impl DocumentStatus {
    /// Parse the loosely-typed status label used on the wire.
    ///
    /// Unknown labels are treated as `Ready`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "processing" | "pending" | "queued" => DocumentStatus::Processing,
            "failed" | "error" => DocumentStatus::Failed,
            _ => DocumentStatus::Ready,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Ready => write!(f, "ready"),
            DocumentStatus::Processing => write!(f, "processing"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Citation attached to an assistant turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    /// Free-form label, usually an excerpt or a file name.
    Label(String),
    /// Location inside the document.
    Page { page_label: String },
}

impl Source {
    pub fn label(&self) -> &str {
        match self {
            Source::Label(label) => label,
            Source::Page { page_label } => page_label,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Label(label) => f.write_str(label),
            Source::Page { page_label } => write!(f, "p. {}", page_label),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// An uploaded document as known to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: Option<String>,
    pub file_name: String,
    /// Generated summary, possibly markdown. `None` until the server finishes.
    pub summary: Option<String>,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Title for headers and listings, falling back to the file name.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => &self.file_name,
        }
    }

    /// Summary text for display, with placeholders when none is cached.
    pub fn summary_text(&self) -> &str {
        match (self.summary.as_deref(), self.status) {
            (Some(summary), _) if !summary.trim().is_empty() => summary,
            (_, DocumentStatus::Processing) => PENDING_SUMMARY_TEXT,
            _ => NO_SUMMARY_TEXT,
        }
    }
}

/// One message in a document's conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Client-local identifier. Not shared with the server.
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    /// True for turns produced locally to report a failure.
    #[serde(default)]
    pub synthetic: bool,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            sources,
            synthetic: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, Vec::new())
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self::new(Role::Assistant, content, sources)
    }

    /// Bot-voiced turn that reports a local failure in-context.
    pub fn synthetic_assistant(content: impl Into<String>) -> Self {
        Self {
            synthetic: true,
            ..Self::new(Role::Assistant, content, Vec::new())
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
