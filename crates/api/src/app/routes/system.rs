use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::IdentityContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(identity): Extension<IdentityContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": identity.user_id().to_string(),
        "role": identity.role(),
    }))
}
