//! Command-line arguments for the Folio client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::Parser;

use folio_core::FolioConfig;

/// Folio: ask questions about your PDF documents from the terminal.
#[derive(Parser, Debug, Default)]
#[command(name = "folio", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the document service, e.g. https://docs.example.com/api.
    #[arg(short = 'u', long = "base-url")]
    pub base_url: Option<String>,

    /// Bearer token for the document service.
    #[arg(short = 't', long = "token")]
    pub token: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Priority: --config flag > FOLIO_CONFIG env var > ~/.folio/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("FOLIO_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --base-url flag > FOLIO_BASE_URL env var > config file value.
    pub fn resolve_base_url(&self, config_url: &str) -> String {
        self.base_url
            .clone()
            .or_else(|| std::env::var("FOLIO_BASE_URL").ok())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| config_url.to_string())
    }

    /// Priority: --token flag > `[auth]` token > the configured env var.
    pub fn resolve_token(&self, config: &FolioConfig) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| config.auth.resolve_token())
    }

    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Apply flag and env overrides onto a loaded configuration.
    pub fn apply(&self, config: &mut FolioConfig) {
        config.gateway.base_url = self.resolve_base_url(&config.gateway.base_url);
        config.general.log_level = self.resolve_log_level(&config.general.log_level);
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".folio").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".folio").join("config.toml");
    }
    PathBuf::from("config.toml")
}
