use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FolioError, Result};

/// Top-level configuration for the Folio client.
///
/// Loaded from `~/.folio/config.toml` by default. Every section is optional
/// and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolioConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl FolioConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FolioConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| FolioError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Remote gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL every endpoint path is joined onto.
    pub base_url: String,
    /// Whole-request timeout in seconds. 0 disables the timeout.
    pub request_timeout_secs: u64,
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// User-Agent header sent with each request.
    pub user_agent: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost/api".to_string(),
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            user_agent: format!("folio/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Bearer token source. Issuing tokens is the auth service's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token to start with. Takes precedence over `token_env`.
    pub token: Option<String>,
    /// Environment variable consulted when `token` is unset.
    pub token_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_env: "FOLIO_TOKEN".to_string(),
        }
    }
}

impl AuthConfig {
    /// Resolve the initial token from config, then the environment.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var(&self.token_env).ok())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Client-side upload checks. Advisory only; the server enforces the real policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// File extensions (without the dot, case-insensitive) offered for upload.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["pdf".to_string()],
        }
    }
}

/// Conversation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Assistant text shown when a history fetch fails.
    pub history_error_text: String,
    /// Assistant text appended when a question cannot be answered.
    pub ask_error_text: String,
    /// Maximum question length in characters.
    pub max_question_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_error_text: "Could not load the conversation history for this document."
                .to_string(),
            ask_error_text: "Error getting response.".to_string(),
            max_question_chars: 4000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = FolioConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.gateway.base_url, "http://localhost/api");
        assert_eq!(config.gateway.request_timeout_secs, 120);
        assert_eq!(config.auth.token_env, "FOLIO_TOKEN");
        assert_eq!(config.upload.allowed_extensions, vec!["pdf".to_string()]);
        assert_eq!(config.chat.ask_error_text, "Error getting response.");
        assert_eq!(config.chat.max_question_chars, 4000);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[gateway]
base_url = "https://docs.example.com/api"
request_timeout_secs = 30

[upload]
allowed_extensions = ["pdf", "md"]

[chat]
ask_error_text = "Sorry, try again."
"#;
        let file = create_temp_config(content);
        let config = FolioConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.gateway.base_url, "https://docs.example.com/api");
        assert_eq!(config.gateway.request_timeout_secs, 30);
        // Unset fields in a present section keep their defaults.
        assert_eq!(config.gateway.connect_timeout_secs, 10);
        assert_eq!(config.upload.allowed_extensions.len(), 2);
        assert_eq!(config.chat.ask_error_text, "Sorry, try again.");
        assert_eq!(config.chat.max_question_chars, 4000);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = FolioConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.gateway.base_url, "http://localhost/api");
        assert_eq!(config.upload.allowed_extensions, vec!["pdf".to_string()]);
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[gateway\nbase_url = ");
        let err = FolioConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, FolioError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = FolioConfig::load_or_default(Path::new("/nonexistent/folio/config.toml"));
        assert_eq!(config.gateway.base_url, "http://localhost/api");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = FolioConfig::default();
        config.gateway.base_url = "http://10.0.0.5:8000/api".to_string();
        config.auth.token = Some("abc".to_string());
        config.save(&path).unwrap();

        let reloaded = FolioConfig::load(&path).unwrap();
        assert_eq!(reloaded.gateway.base_url, "http://10.0.0.5:8000/api");
        assert_eq!(reloaded.auth.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_resolve_token_prefers_config_value() {
        let auth = AuthConfig {
            token: Some("  from-config ".to_string()),
            token_env: "FOLIO_TEST_TOKEN_UNUSED".to_string(),
        };
        assert_eq!(auth.resolve_token().as_deref(), Some("from-config"));
    }

    #[test]
    fn test_resolve_token_blank_and_missing() {
        let auth = AuthConfig {
            token: Some("   ".to_string()),
            token_env: "FOLIO_TEST_TOKEN_DEFINITELY_UNSET".to_string(),
        };
        assert_eq!(auth.resolve_token(), None);
    }
}
