use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use wayfare_core::{InviteTokenId, TripId};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::IdentityContext;

pub async fn list_invites(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(trip_id): Path<String>,
) -> axum::response::Response {
    let trip_id: TripId = match errors::parse_id(&trip_id, "trip") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.collaboration(&identity).get_invite_tokens(trip_id).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::collab_error_to_response(e),
    }
}

pub async fn create_invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(trip_id): Path<String>,
    Json(body): Json<dto::CreateInviteRequest>,
) -> axum::response::Response {
    let trip_id: TripId = match errors::parse_id(&trip_id, "trip") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .collaboration(&identity)
        .create_invite_token(trip_id, body.invite_type, body.expires_in_days, body.max_uses)
        .await
    {
        Ok(invite) => (StatusCode::CREATED, Json(invite)).into_response(),
        Err(e) => errors::collab_error_to_response(e),
    }
}

pub async fn deactivate_invite(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(token_id): Path<String>,
) -> axum::response::Response {
    let token_id: InviteTokenId = match errors::parse_id(&token_id, "invite token") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .collaboration(&identity)
        .deactivate_invite_token(token_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::collab_error_to_response(e),
    }
}

pub async fn verify_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(token): Path<String>,
) -> axum::response::Response {
    match services.collaboration(&identity).verify_invite_token(&token).await {
        Ok(verification) => (StatusCode::OK, Json(verification)).into_response(),
        Err(e) => errors::collab_error_to_response(e),
    }
}

pub async fn use_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(token): Path<String>,
) -> axum::response::Response {
    match services.collaboration(&identity).use_invite_token(&token).await {
        Ok(redeemed) => (StatusCode::OK, Json(serde_json::json!({ "redeemed": redeemed }))).into_response(),
        Err(e) => errors::collab_error_to_response(e),
    }
}
