//! HTTP API server for Heartline

mod auth;
pub mod conversation;
pub mod error;
pub mod health;
pub mod jwt;
pub mod user;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Config, SttBackend, TtsBackend};
use crate::db::{self, ConversationRepo, DbPool, UserRepo};
use crate::llm::ChatClient;
use crate::prompt::PromptComposer;
use crate::turn::{Collaborators, TurnOrchestrator};
use crate::voice::{SpeechToText, TextToSpeech, VoiceSelector};
use crate::{Error, Result};

pub use error::ApiError;
pub use jwt::{AuthError, Claims, JwksCache, TokenVerifier};

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub users: UserRepo,
    pub conversations: ConversationRepo,
    pub orchestrator: Arc<TurnOrchestrator>,
    /// Token verifier; `None` when the identity provider is not configured
    pub verifier: Option<Arc<dyn TokenVerifier>>,
}

impl ApiState {
    /// Build state with the given pipeline and verifier
    #[must_use]
    pub fn new(
        db: DbPool,
        orchestrator: TurnOrchestrator,
        verifier: Option<Arc<dyn TokenVerifier>>,
    ) -> Self {
        Self {
            users: UserRepo::new(db.clone()),
            conversations: ConversationRepo::new(db.clone()),
            db,
            orchestrator: Arc::new(orchestrator),
            verifier,
        }
    }

    /// Wire the database, speech adapters and token verifier from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or a required API key is missing
    pub fn from_config(config: &Config) -> Result<Self> {
        let pool = db::init(&config.database_path)?;
        let conversations = Arc::new(ConversationRepo::new(pool.clone()));

        let stt_key = required_key(config.stt_api_key(), "speech-to-text")?;
        let transcriber = match config.stt.backend {
            SttBackend::Whisper => SpeechToText::new_whisper(stt_key, config.stt.model.clone())?,
            SttBackend::Deepgram => {
                SpeechToText::new_deepgram(stt_key, config.stt.model.clone())?
            }
        };

        let tts_key = required_key(config.tts_api_key(), "text-to-speech")?;
        let synthesizer = match config.tts.backend {
            TtsBackend::ElevenLabs => {
                TextToSpeech::new_elevenlabs(tts_key, config.tts.model.clone())?
            }
            TtsBackend::OpenAI => {
                TextToSpeech::new_openai(tts_key, 1.0, config.tts.model.clone())?
            }
        };

        let llm_key = required_key(config.llm_api_key(), "reply generation")?;
        let generator =
            ChatClient::new(config.llm.base_url.clone(), llm_key, config.llm.model.clone())?;

        let orchestrator = TurnOrchestrator::new(Collaborators {
            transcriber: Arc::new(transcriber),
            history: conversations.clone(),
            generator: Arc::new(generator),
            synthesizer: Arc::new(synthesizer),
            store: conversations,
        })
        .with_composer(PromptComposer::new(config.persona.clone()))
        .with_selector(VoiceSelector::new(config.voice.clone()))
        .with_stage_timeout(config.stage_timeout);

        let verifier = JwksCache::from_config(&config.auth)
            .map(|cache| Arc::new(cache) as Arc<dyn TokenVerifier>);
        if verifier.is_none() {
            tracing::warn!(
                "AUTH0_DOMAIN or AUTH0_AUDIENCE not set, protected routes will be rejected"
            );
        }

        tracing::info!(
            stt = ?config.stt.backend,
            tts = ?config.tts.backend,
            llm_model = %config.llm.model,
            timeout_secs = config.stage_timeout.as_secs(),
            "pipeline configured"
        );

        Ok(Self::new(pool, orchestrator, verifier))
    }
}

fn required_key(key: Option<&str>, purpose: &str) -> Result<String> {
    key.map(ToString::to_string)
        .ok_or_else(|| Error::Config(format!("no API key configured for {purpose}")))
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    frontend_url: Option<String>,
}

impl ApiServer {
    /// Create a new API server
    #[must_use]
    pub fn new(state: ApiState, port: u16, frontend_url: Option<String>) -> Self {
        Self {
            state: Arc::new(state),
            port,
            frontend_url,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let protected = Router::new()
            .merge(user::router())
            .merge(conversation::router(self.state.clone()))
            .route_layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                auth::require_user,
            ));

        Router::new()
            .nest("/api", protected)
            .merge(health::router(self.state.clone()))
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
            .layer(self.cors())
            .layer(TraceLayer::new_for_http())
    }

    /// CORS layer restricted to the configured frontend origin
    fn cors(&self) -> CorsLayer {
        let origin = self.frontend_url.as_deref().and_then(|url| {
            HeaderValue::from_str(url.trim_end_matches('/'))
                .inspect_err(|e| {
                    tracing::warn!(url, error = %e, "invalid frontend URL, CORS disabled");
                })
                .ok()
        });

        let layer = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

        match origin {
            Some(origin) => layer
                .allow_origin(AllowOrigin::exact(origin))
                .allow_credentials(true),
            None => layer.allow_origin(AllowOrigin::list(std::iter::empty::<HeaderValue>())),
        }
    }

    /// Run the API server until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, origin = ?self.frontend_url, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
