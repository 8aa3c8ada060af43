//! TOML configuration file loading
//!
//! Supports `~/.config/satchel/config.toml` as a persistent config
//! source. All fields are optional - the file is a partial overlay on
//! top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SatchelConfigFile {
    /// Data directory override (database location)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Per-user assistant commands per minute; omit to disable limiting
    pub rate_limit_per_minute: Option<u32>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,

    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// Max tokens per completion
    pub max_tokens: Option<u32>,

    /// API key; the OPENAI_API_KEY env var takes precedence
    pub api_key: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input
    pub enabled: Option<bool>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,
}

/// Default config file location
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "satchel", "satchel")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load a config file; a missing file yields defaults
///
/// # Errors
///
/// Returns error when the file exists but cannot be read or parsed
pub fn load(path: &Path) -> Result<SatchelConfigFile> {
    if !path.exists() {
        return Ok(SatchelConfigFile::default());
    }

    let content = std::fs::read_to_string(path)?;
    let parsed = toml::from_str(&content)?;

    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let parsed: SatchelConfigFile = toml::from_str(
            r#"
            [server]
            port = 9000

            [llm]
            model = "gpt-4o"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.server.port, Some(9000));
        assert_eq!(parsed.llm.model.as_deref(), Some("gpt-4o"));
        assert!(parsed.llm.base_url.is_none());
        assert!(parsed.voice.enabled.is_none());
    }

    #[test]
    fn test_empty_file_is_default() {
        let parsed: SatchelConfigFile = toml::from_str("").unwrap();
        assert!(parsed.server.port.is_none());
        assert!(parsed.data_dir.is_none());
    }
}
