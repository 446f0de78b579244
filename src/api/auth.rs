//! Bearer token authentication middleware

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::ApiState;
use super::error::ApiError;
use super::jwt::AuthError;

/// Extract the bearer token from the Authorization header
fn extract_bearer(req: &Request) -> Result<&str, AuthError> {
    let value = req
        .headers()
        .get("authorization")
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Middleware that verifies the token and attaches the current user
///
/// Inserts [`crate::db::User`] into request extensions for handlers.
pub async fn require_user(
    State(state): State<Arc<ApiState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(verifier) = state.verifier.as_ref() else {
        tracing::error!("request rejected: identity provider is not configured");
        return Err(AuthError::NotConfigured.into());
    };

    let token = extract_bearer(&req)
        .inspect_err(|e| tracing::debug!(error = %e, "no usable bearer token"))?;
    let claims = verifier.verify(token).await.inspect_err(|e| {
        tracing::warn!(error = %e, "token verification failed");
    })?;

    let user = state.users.find_or_create(&claims.profile())?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
