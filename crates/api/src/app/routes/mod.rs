use axum::{
    Router,
    routing::{get, patch, post},
};

pub mod expenses;
pub mod invites;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route(
            "/trips/:trip_id/expenses",
            get(expenses::list_expenses).post(expenses::create_expense),
        )
        .route(
            "/expenses/:expense_id",
            patch(expenses::update_expense).delete(expenses::delete_expense),
        )
        .route(
            "/trips/:trip_id/invites",
            get(invites::list_invites).post(invites::create_invite),
        )
        .route("/invites/:token_id/deactivate", post(invites::deactivate_invite))
        .route("/invite-tokens/:token", get(invites::verify_token))
        .route("/invite-tokens/:token/use", post(invites::use_token))
}
