use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use wayfare_core::{ExpenseId, TripId};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::IdentityContext;

pub async fn list_expenses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(trip_id): Path<String>,
) -> axum::response::Response {
    let trip_id: TripId = match errors::parse_id(&trip_id, "trip") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.collaboration(&identity).fetch_expenses(trip_id).await {
        Ok(expenses) => (StatusCode::OK, Json(expenses)).into_response(),
        Err(e) => errors::collab_error_to_response(e),
    }
}

pub async fn create_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(trip_id): Path<String>,
    Json(body): Json<dto::CreateExpenseRequest>,
) -> axum::response::Response {
    let trip_id: TripId = match errors::parse_id(&trip_id, "trip") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .collaboration(&identity)
        .create_expense(trip_id, body.expense, body.splits)
        .await
    {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => errors::collab_error_to_response(e),
    }
}

pub async fn update_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(expense_id): Path<String>,
    Json(body): Json<dto::UpdateExpenseRequest>,
) -> axum::response::Response {
    let expense_id: ExpenseId = match errors::parse_id(&expense_id, "expense") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .collaboration(&identity)
        .update_expense(expense_id, body.patch, body.splits)
        .await
    {
        Ok(updated) => (StatusCode::OK, Json(updated)).into_response(),
        Err(e) => errors::collab_error_to_response(e),
    }
}

pub async fn delete_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(expense_id): Path<String>,
) -> axum::response::Response {
    let expense_id: ExpenseId = match errors::parse_id(&expense_id, "expense") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.collaboration(&identity).delete_expense(expense_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::collab_error_to_response(e),
    }
}
