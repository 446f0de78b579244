//! Conversation endpoints: audio turns and history

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Multipart, Query, State},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ApiState;
use super::error::ApiError;
use crate::db::User;
use crate::emotion::Emotion;
use crate::turn::TurnResult;

/// Multipart field carrying the recorded audio
pub const AUDIO_FIELD: &str = "audio";

/// Default number of turns returned by the history endpoint
const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Upper bound on turns returned by the history endpoint
const MAX_HISTORY_LIMIT: usize = 500;

/// Result of one spoken turn
#[derive(Debug, Serialize, Deserialize)]
pub struct TurnResponse {
    pub transcription: String,
    pub response: String,
    pub emotion: Emotion,
    pub voice: Option<String>,
    /// Base64-encoded audio of the reply
    pub audio: Option<String>,
}

impl From<TurnResult> for TurnResponse {
    fn from(result: TurnResult) -> Self {
        Self {
            transcription: result.transcription,
            response: result.reply_text,
            emotion: result.emotion.label,
            voice: result.voice_id,
            audio: result.audio.map(|bytes| STANDARD.encode(bytes)),
        }
    }
}

/// Who said a history message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Assistant,
}

/// One side of a stored turn
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub text: String,
    pub emotion: String,
    pub timestamp: DateTime<Utc>,
}

/// Conversation history, oldest first
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

/// Run a turn from an uploaded recording
async fn process_audio(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> Result<Json<TurnResponse>, ApiError> {
    let mut audio = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some(AUDIO_FIELD) {
            tracing::debug!(
                user_id = %user.id,
                file_name = ?field.file_name(),
                content_type = ?field.content_type(),
                "received audio upload"
            );
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("could not read audio: {e}")))?;
            audio = Some(bytes);
            break;
        }
    }

    let audio =
        audio.ok_or_else(|| ApiError::BadRequest(format!("missing '{AUDIO_FIELD}' field")))?;

    let result = state.orchestrator.run(&user.id, &audio).await?;
    if result.is_degraded() {
        tracing::info!(
            user_id = %user.id,
            degradations = ?result.degradations,
            "turn completed degraded"
        );
    }

    Ok(Json(result.into()))
}

/// List the user's stored turns as alternating messages
async fn history(
    State(state): State<Arc<ApiState>>,
    Extension(user): Extension<User>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    let records = state.conversations.history(&user.id, limit)?;
    tracing::debug!(user_id = %user.id, turns = records.len(), "history requested");

    let messages = records
        .into_iter()
        .flat_map(|record| {
            [
                HistoryMessage {
                    kind: MessageType::User,
                    text: record.user_message,
                    emotion: record.emotion.clone(),
                    timestamp: record.created_at,
                },
                HistoryMessage {
                    kind: MessageType::Assistant,
                    text: record.assistant_message,
                    emotion: record.emotion,
                    timestamp: record.created_at,
                },
            ]
        })
        .collect();

    Ok(Json(HistoryResponse { messages }))
}

/// Build conversation router (requires the auth layer)
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/process-audio", post(process_audio))
        .route("/history", get(history))
        .with_state(state)
}
