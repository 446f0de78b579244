//! Configuration management for Heartline
//!
//! Precedence: environment > config file > compiled defaults.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::llm;
use crate::prompt::DEFAULT_PERSONA;
use crate::turn::DEFAULT_STAGE_TIMEOUT;
use crate::voice::VoiceProfile;
use crate::{Error, Result};

use file::HeartlineConfigFile;

/// Default API server port
pub const DEFAULT_PORT: u16 = 8000;

/// Default allowed browser origin
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

/// Heartline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database, etc)
    pub data_dir: PathBuf,

    /// SQLite database path
    pub database_path: PathBuf,

    /// HTTP API server configuration
    pub server: ServerConfig,

    /// Identity provider configuration
    pub auth: AuthConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Speech-to-text backend
    pub stt: SttConfig,

    /// Reply generation backend
    pub llm: LlmConfig,

    /// Text-to-speech backend
    pub tts: TtsConfig,

    /// Persona base text for the system prompt
    pub persona: String,

    /// Voice tiers and call-out keywords
    pub voice: VoiceProfile,

    /// Deadline for each collaborator call
    pub stage_timeout: Duration,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origin; `None` allows no cross-origin requests
    pub frontend_url: Option<String>,
}

/// Identity provider configuration
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Tenant domain, e.g. `example.us.auth0.com`
    pub domain: Option<String>,

    /// Expected `aud` claim
    pub audience: Option<String>,
}

impl AuthConfig {
    /// Whether both domain and audience are set
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.domain.is_some() && self.audience.is_some()
    }
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub groq: Option<String>,
    pub elevenlabs: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| k.as_ref().map(|_| "<set>");
        f.debug_struct("ApiKeys")
            .field("openai", &mask(&self.openai))
            .field("deepgram", &mask(&self.deepgram))
            .field("groq", &mask(&self.groq))
            .field("elevenlabs", &mask(&self.elevenlabs))
            .finish()
    }
}

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttBackend {
    Whisper,
    Deepgram,
}

/// Speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub backend: SttBackend,
    pub model: String,
}

/// Text-to-speech backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsBackend {
    ElevenLabs,
    OpenAI,
}

/// Text-to-speech configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub backend: TtsBackend,
    pub model: String,
}

/// Reply generation configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn from_sources(
        fc: HeartlineConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let data_dir = env("HEARTLINE_DATA_DIR").map_or_else(default_data_dir, PathBuf::from);

        let database_path = env("DATABASE_PATH")
            .or(fc.server.database_path)
            .map_or_else(|| data_dir.join("heartline.db"), PathBuf::from);

        // Server config (env > toml > default)
        let port = match env("HEARTLINE_PORT").or_else(|| env("PORT")) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid port: {raw}")))?,
            None => fc.server.port.unwrap_or(DEFAULT_PORT),
        };
        let server = ServerConfig {
            port,
            frontend_url: env("FRONTEND_URL")
                .or(fc.server.frontend_url)
                .or_else(|| Some(DEFAULT_FRONTEND_URL.to_string())),
        };

        let auth = AuthConfig {
            domain: env("AUTH0_DOMAIN")
                .or(fc.auth.domain)
                .map(|d| normalize_domain(&d)),
            audience: env("AUTH0_AUDIENCE").or(fc.auth.audience),
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            groq: env("GROQ_API_KEY").or(fc.api_keys.groq),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
        };

        let stt_backend = match env("HEARTLINE_STT_PROVIDER")
            .or(fc.stt.provider)
            .as_deref()
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            None if api_keys.openai.is_none() && api_keys.deepgram.is_some() => {
                SttBackend::Deepgram
            }
            None | Some("whisper" | "openai") => SttBackend::Whisper,
            Some("deepgram") => SttBackend::Deepgram,
            Some(other) => {
                return Err(Error::Config(format!("unknown STT provider: {other}")));
            }
        };
        let stt = SttConfig {
            backend: stt_backend,
            model: env("HEARTLINE_STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or_else(|| match stt_backend {
                    SttBackend::Whisper => "whisper-1".to_string(),
                    SttBackend::Deepgram => "nova-2".to_string(),
                }),
        };

        let tts_backend = match env("HEARTLINE_TTS_PROVIDER")
            .or(fc.tts.provider)
            .as_deref()
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            None | Some("elevenlabs") => TtsBackend::ElevenLabs,
            Some("openai") => TtsBackend::OpenAI,
            Some(other) => {
                return Err(Error::Config(format!("unknown TTS provider: {other}")));
            }
        };
        let tts = TtsConfig {
            backend: tts_backend,
            model: env("HEARTLINE_TTS_MODEL")
                .or(fc.tts.model)
                .unwrap_or_else(|| match tts_backend {
                    TtsBackend::ElevenLabs => "eleven_multilingual_v2".to_string(),
                    TtsBackend::OpenAI => "tts-1".to_string(),
                }),
        };

        let llm = LlmConfig {
            base_url: env("HEARTLINE_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| llm::GROQ_API_BASE.to_string()),
            model: env("HEARTLINE_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| llm::DEFAULT_MODEL.to_string()),
        };

        let persona = fc
            .persona
            .text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PERSONA.to_string());

        // Voice tiers: file overrides per tier, defaults otherwise
        let defaults = VoiceProfile::default();
        let voice = VoiceProfile {
            english: fc.voice.english.unwrap_or(defaults.english),
            hindi: fc.voice.hindi.unwrap_or(defaults.hindi),
            scold_keywords: fc.voice.scold_keywords.unwrap_or(defaults.scold_keywords),
        };

        let stage_timeout = match env("HEARTLINE_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid timeout: {raw}")))?,
            ),
            None => fc
                .server
                .timeout_secs
                .map_or(DEFAULT_STAGE_TIMEOUT, Duration::from_secs),
        };
        if stage_timeout.is_zero() {
            return Err(Error::Config("timeout must be positive".to_string()));
        }

        Ok(Self {
            data_dir,
            database_path,
            server,
            auth,
            api_keys,
            stt,
            llm,
            tts,
            persona,
            voice,
            stage_timeout,
        })
    }

    /// Key for the configured STT backend
    #[must_use]
    pub fn stt_api_key(&self) -> Option<&str> {
        match self.stt.backend {
            SttBackend::Whisper => self.api_keys.openai.as_deref(),
            SttBackend::Deepgram => self.api_keys.deepgram.as_deref(),
        }
    }

    /// Key for the configured TTS backend
    #[must_use]
    pub fn tts_api_key(&self) -> Option<&str> {
        match self.tts.backend {
            TtsBackend::ElevenLabs => self.api_keys.elevenlabs.as_deref(),
            TtsBackend::OpenAI => self.api_keys.openai.as_deref(),
        }
    }

    /// Key for the reply generator (Groq, falling back to `OpenAI`)
    #[must_use]
    pub fn llm_api_key(&self) -> Option<&str> {
        self.api_keys
            .groq
            .as_deref()
            .or(self.api_keys.openai.as_deref())
    }
}

/// Strip scheme and trailing slashes from a tenant domain
fn normalize_domain(domain: &str) -> String {
    domain
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "heartline").map_or_else(
        || PathBuf::from(".heartline"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}
