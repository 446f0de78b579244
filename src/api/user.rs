//! Current user endpoint

use axum::{Extension, Json, Router, routing::get};
use serde::Serialize;

use crate::db::User;

/// Profile of the authenticated user
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub auth_subject: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            auth_subject: user.auth_subject,
            name: user.name,
            email: user.email,
            picture: user.picture,
        }
    }
}

async fn current_user(Extension(user): Extension<User>) -> Json<UserResponse> {
    tracing::debug!(user_id = %user.id, "user profile requested");
    Json(user.into())
}

/// Build user router (requires the auth layer)
pub fn router() -> Router {
    Router::new().route("/user", get(current_user))
}
