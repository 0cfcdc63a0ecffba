use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use wayfare_auth::AccessTokenVerifier;

use crate::app::errors::json_error;
use crate::context::IdentityContext;

#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn AccessTokenVerifier>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Some(token) => token.to_string(),
        None => return unauthenticated("missing bearer token"),
    };

    let claims = match state.verifier.verify(&token, Utc::now()) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "bearer token rejected");
            return unauthenticated(e.to_string());
        }
    };

    req.extensions_mut()
        .insert(IdentityContext::new(claims.sub, claims.role, token));

    next.run(req).await
}

fn unauthenticated(message: impl Into<String>) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthenticated", message)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
