//! Request and response bodies of the document service.
//!
//! Field names follow the server (`pdf_id`, `study_mode`, `source_documents`).
//! Conversions into the domain types live here so the session core never
//! sees wire naming. Role labels are deliberately left raw: normalizing them
//! is the history loader's job.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use folio_core::{Document, DocumentId, DocumentStatus, Source};

/// Body of `POST /upload`.
///
/// Synchronous deployments answer with the finished summary; queued ones
/// answer `{"pdf_id": .., "status": "processing"}` and fill the rest in later.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    pub pdf_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "filename")]
    pub file_name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl UploadResponse {
    /// Build the client-side record for a freshly uploaded file.
    pub fn into_document(self, uploaded_name: &str, now: DateTime<Utc>) -> Document {
        let status = self
            .status
            .as_deref()
            .map(DocumentStatus::from_label)
            .unwrap_or_default();
        Document {
            id: DocumentId::new(self.pdf_id),
            title: self.title,
            file_name: self.file_name.unwrap_or_else(|| uploaded_name.to_string()),
            summary: self.summary,
            status,
            created_at: now,
        }
    }
}

/// One entry of `GET /documents`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentRecord {
    pub pdf_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "filename")]
    pub file_name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl DocumentRecord {
    pub fn into_document(self) -> Document {
        let created_at = self
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let status = match self.status.as_deref() {
            Some(label) => DocumentStatus::from_label(label),
            None if self.summary.is_none() => DocumentStatus::Processing,
            None => DocumentStatus::Ready,
        };
        Document {
            file_name: self.file_name.unwrap_or_else(|| self.pdf_id.clone()),
            id: DocumentId::new(self.pdf_id),
            title: self.title,
            summary: self.summary,
            status,
            created_at,
        }
    }
}

/// Body of `GET /history/{pdf_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub pdf_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub history: Vec<HistoryEntry>,
}

/// A past turn as stored by the server. `role` is the server's label.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    #[serde(default, alias = "message")]
    pub content: String,
    #[serde(default, deserialize_with = "deserialize_sources")]
    pub sources: Vec<Source>,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskRequest {
    #[serde(rename = "pdf_id")]
    pub document_id: DocumentId,
    pub question: String,
    #[serde(rename = "study_mode")]
    pub expanded_retrieval: bool,
}

/// Response of `POST /chat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(
        default,
        alias = "sources",
        rename = "source_documents",
        deserialize_with = "deserialize_sources"
    )]
    pub sources: Vec<Source>,
}

/// Parse server timestamps: RFC 3339, or naive ISO 8601 taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Map one loosely-shaped source entry onto a `Source`.
///
/// Strings become labels, objects with a page become page references, any
/// other shape is kept as its JSON text so nothing is silently dropped.
pub fn source_from_value(value: Value) -> Option<Source> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(Source::Label(s)),
        Value::Number(n) => Some(Source::Label(n.to_string())),
        Value::Object(ref map) => {
            let page = map
                .get("page_label")
                .or_else(|| map.get("page"))
                .and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
            Some(match page {
                Some(page_label) => Source::Page { page_label },
                None => Source::Label(value.to_string()),
            })
        }
        other => Some(Source::Label(other.to_string())),
    }
}

fn deserialize_sources<'de, D>(deserializer: D) -> std::result::Result<Vec<Source>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(source_from_value)
        .collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
