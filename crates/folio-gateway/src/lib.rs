//! Remote gateway access for Folio.
//!
//! Defines the `RemoteGateway` trait the session core talks to, the wire
//! types of the document service, bearer token plumbing, and the default
//! HTTP implementation built on `reqwest`.

pub mod auth;
pub mod error;
pub mod gateway;
pub mod http;
pub mod wire;

pub use auth::{SharedToken, TokenProvider};
pub use error::{GatewayError, Result};
pub use gateway::{RemoteGateway, UploadFile};
pub use http::HttpGateway;
pub use wire::{AskRequest, AskResponse, DocumentRecord, HistoryEntry, HistoryResponse, UploadResponse};
