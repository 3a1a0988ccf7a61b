//! HTTP implementation of `RemoteGateway`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use folio_core::config::GatewayConfig;
use folio_core::DocumentId;

use crate::auth::TokenProvider;
use crate::error::{GatewayError, Result};
use crate::gateway::{RemoteGateway, UploadFile};
use crate::wire::{AskRequest, AskResponse, DocumentRecord, HistoryResponse, UploadResponse};

/// Gateway that talks to the document service over HTTP.
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl HttpGateway {
    /// Build a gateway from configuration.
    pub fn new(config: &GatewayConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            GatewayError::InvalidRequest(format!("invalid base URL {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidRequest(format!(
                "invalid base URL {}",
                config.base_url
            )));
        }

        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        let client = builder.build().map_err(GatewayError::from_transport)?;

        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidRequest("base URL cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and map non-success statuses to errors.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(GatewayError::from_transport)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.on_unauthorized();
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let bytes = response.bytes().await.map_err(GatewayError::from_transport)?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

/// Pull a readable message out of an error body (`{"detail": ..}` or text).
fn error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("detail")
            .or_else(|| value.get("message"))
            .or_else(|| value.get("error"))
            .map(|v| match v.as_str() {
                Some(s) => s.to_string(),
                None => v.to_string(),
            })
            .unwrap_or_else(|| body.trim().to_string()),
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn upload(&self, file: &UploadFile) -> Result<UploadResponse> {
        let url = self.endpoint(&["upload"])?;
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::debug!(file_name = %file.file_name, bytes = file.bytes.len(), "Uploading document");
        let response = self.send(self.client.post(url).multipart(form)).await?;
        Self::decode(response).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let url = self.endpoint(&["documents"])?;
        let response = self.send(self.client.get(url)).await?;
        Self::decode(response).await
    }

    async fn history(&self, document_id: &DocumentId) -> Result<HistoryResponse> {
        let url = self.endpoint(&["history", document_id.as_str()])?;
        let response = self.send(self.client.get(url)).await?;
        Self::decode(response).await
    }

    async fn ask(&self, request: &AskRequest) -> Result<AskResponse> {
        let url = self.endpoint(&["chat"])?;
        tracing::debug!(
            document_id = %request.document_id,
            expanded = request.expanded_retrieval,
            "Sending question"
        );
        let response = self.send(self.client.post(url).json(request)).await?;
        Self::decode(response).await
    }

    async fn delete_document(&self, document_id: &DocumentId) -> Result<()> {
        let url = self.endpoint(&["document", document_id.as_str()])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SharedToken;

    fn gateway(base_url: &str) -> Result<HttpGateway> {
        let config = GatewayConfig {
            base_url: base_url.to_string(),
            ..GatewayConfig::default()
        };
        HttpGateway::new(&config, Arc::new(SharedToken::default()))
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let gw = gateway("http://localhost/api").unwrap();
        assert_eq!(gw.endpoint(&["chat"]).unwrap().as_str(), "http://localhost/api/chat");

        let gw = gateway("http://localhost/api/").unwrap();
        assert_eq!(
            gw.endpoint(&["history", "d1"]).unwrap().as_str(),
            "http://localhost/api/history/d1"
        );
    }

    #[test]
    fn test_endpoint_encodes_ids() {
        let gw = gateway("http://localhost/api").unwrap();
        let url = gw.endpoint(&["document", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost/api/document/a%2Fb%20c");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = gateway("not a url").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));

        let err = gateway("mailto:me@example.com").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"detail": "Only PDF files are allowed"}"#), "Only PDF files are allowed");
        assert_eq!(error_message(r#"{"message": "nope"}"#), "nope");
        assert_eq!(error_message("  Bad Gateway "), "Bad Gateway");
        assert_eq!(error_message(r#"{"detail": [1, 2]}"#), "[1,2]");
    }
}
