//! TOML configuration file loading
//!
//! Supports `~/.config/heartline/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;
use crate::voice::VoiceTier;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct HeartlineConfigFile {
    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Identity provider configuration
    #[serde(default)]
    pub auth: AuthFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Speech-to-text configuration
    #[serde(default)]
    pub stt: ProviderFileConfig,

    /// Reply generation configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Text-to-speech configuration
    #[serde(default)]
    pub tts: ProviderFileConfig,

    /// Companion persona
    #[serde(default)]
    pub persona: PersonaFileConfig,

    /// Voice tiers and call-out keywords
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Allowed CORS origin
    pub frontend_url: Option<String>,

    /// SQLite database path
    pub database_path: Option<String>,

    /// Per-call collaborator deadline in seconds
    pub timeout_secs: Option<u64>,
}

/// Identity provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct AuthFileConfig {
    /// Tenant domain (e.g. "example.us.auth0.com")
    pub domain: Option<String>,

    /// Expected token audience
    pub audience: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub groq: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Provider selection for a speech adapter
#[derive(Debug, Default, Deserialize)]
pub struct ProviderFileConfig {
    /// Provider name ("whisper"/"deepgram" or "elevenlabs"/"openai")
    pub provider: Option<String>,

    /// Model identifier
    pub model: Option<String>,
}

/// Chat completion configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// OpenAI-compatible base URL
    pub base_url: Option<String>,

    /// Model identifier (e.g. "llama-3.1-8b-instant")
    pub model: Option<String>,
}

/// Persona configuration
#[derive(Debug, Default, Deserialize)]
pub struct PersonaFileConfig {
    /// Base system prompt text
    pub text: Option<String>,
}

/// Voice configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    pub english: Option<VoiceTier>,
    pub hindi: Option<VoiceTier>,
    pub scold_keywords: Option<Vec<String>>,
}

/// Load the TOML config file from the standard path
///
/// Returns `HeartlineConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> HeartlineConfigFile {
    let Some(path) = config_file_path() else {
        return HeartlineConfigFile::default();
    };

    if !path.exists() {
        return HeartlineConfigFile::default();
    }

    match parse_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            HeartlineConfigFile::default()
        }
    }
}

/// Read and parse a config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn parse_config_file(path: &Path) -> Result<HeartlineConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/heartline/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("heartline").join("config.toml"))
}
