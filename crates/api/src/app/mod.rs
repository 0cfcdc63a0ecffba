//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store backend selection and per-request facade construction
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use wayfare_auth::Hs256Verifier;
use wayfare_infra::StoreError;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &ApiConfig) -> Result<Router, StoreError> {
    let verifier = Arc::new(Hs256Verifier::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { verifier };

    let services = Arc::new(services::build_services(&config.store)?);

    // Protected routes: require a valid bearer token.
    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::auth_middleware,
            ))
            .layer(Extension(services)),
    );

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected))
}
