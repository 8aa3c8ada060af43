//! Configuration management for the Satchel gateway
//!
//! Layered: built-in defaults, then the TOML config file, then
//! environment variables. CLI flags are applied last by `main`.

pub mod file;

use std::path::PathBuf;

use secrecy::SecretString;

use crate::Result;

/// Default API server port
pub const DEFAULT_PORT: u16 = 18650;

/// Satchel gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory (database lives here)
    pub data_dir: PathBuf,

    /// HTTP API server configuration
    pub server: ServerConfig,

    /// Chat completion configuration
    pub llm: LlmConfig,

    /// Voice configuration
    pub voice: VoiceConfig,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Per-user assistant commands per minute; `None` disables limiting
    pub rate_limit_per_minute: Option<u32>,
}

/// Chat completion configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL
    pub base_url: String,

    /// API key (from `OPENAI_API_KEY` or the config file)
    pub api_key: SecretString,

    /// Model identifier
    pub model: String,

    /// Max tokens per completion
    pub max_tokens: u32,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input
    pub enabled: bool,

    /// STT model identifier
    pub stt_model: String,
}

impl Config {
    /// Load configuration from the default file location and environment
    ///
    /// # Errors
    ///
    /// Returns error when the config file exists but cannot be parsed
    pub fn load() -> Result<Self> {
        let overlay = file::default_path()
            .map(|p| file::load(&p))
            .transpose()?
            .unwrap_or_default();

        Ok(Self::from_overlay(overlay))
    }

    fn from_overlay(overlay: file::SatchelConfigFile) -> Self {
        let data_dir = std::env::var_os("SATCHEL_DATA_DIR")
            .map(PathBuf::from)
            .or(overlay.data_dir)
            .or_else(|| {
                directories::ProjectDirs::from("dev", "satchel", "satchel")
                    .map(|dirs| dirs.data_dir().to_path_buf())
            })
            .unwrap_or_else(|| PathBuf::from("./data"));

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or(overlay.llm.api_key)
            .unwrap_or_default();

        Self {
            data_dir,
            server: ServerConfig {
                port: overlay.server.port.unwrap_or(DEFAULT_PORT),
                rate_limit_per_minute: overlay.server.rate_limit_per_minute,
            },
            llm: LlmConfig {
                base_url: overlay
                    .llm
                    .base_url
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                api_key: SecretString::from(api_key),
                model: overlay
                    .llm
                    .model
                    .unwrap_or_else(|| "gpt-4o-mini".to_string()),
                max_tokens: overlay.llm.max_tokens.unwrap_or(512),
            },
            voice: VoiceConfig {
                enabled: overlay.voice.enabled.unwrap_or(true),
                stt_model: overlay
                    .voice
                    .stt_model
                    .unwrap_or_else(|| "whisper-1".to_string()),
            },
        }
    }

    /// Path of the SQLite database file
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("satchel.db")
    }
}
