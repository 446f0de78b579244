//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;

/// Root banner response
#[derive(Serialize)]
pub struct RootResponse {
    pub status: &'static str,
    pub auth: &'static str,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// Public banner
async fn root(State(state): State<Arc<ApiState>>) -> Json<RootResponse> {
    Json(RootResponse {
        status: "Heartline API is running",
        auth: if state.verifier.is_some() {
            "Auth0"
        } else {
            "unconfigured"
        },
    })
}

/// Liveness probe with a database check
async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let database = match state.db.get() {
        Ok(conn) => match conn.query_row("SELECT 1", [], |_| Ok(())) {
            Ok(()) => "ok",
            Err(e) => {
                tracing::warn!(error = %e, "database health query failed");
                "fail"
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "database connection failed");
            "fail"
        }
    };

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

/// Build health router (public, no auth)
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
}
