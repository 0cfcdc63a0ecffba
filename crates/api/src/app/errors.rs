use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use wayfare_infra::CollabError;

pub fn collab_error_to_response(err: CollabError) -> axum::response::Response {
    let status = match &err {
        CollabError::Validation(_) => StatusCode::BAD_REQUEST,
        CollabError::Unauthenticated => StatusCode::UNAUTHORIZED,
        CollabError::NoRowsAffected { .. } => StatusCode::FORBIDDEN,
        CollabError::SchemaMissing(_) => StatusCode::SERVICE_UNAVAILABLE,
        CollabError::SplitInsertFailed { .. }
        | CollabError::SplitDeleteFailed { .. }
        | CollabError::OrphanedExpense { .. }
        | CollabError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    // Client errors carry the detail; anything else gets the user-facing text.
    let message = if status.is_client_error() {
        err.to_string()
    } else {
        tracing::error!(error = %err, kind = err.kind(), "request failed");
        err.user_facing().message().to_string()
    };

    json_error(status, err.kind(), message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse an id from a path segment, or produce a 400 response.
pub fn parse_id<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr,
{
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfare_core::TripId;
    use wayfare_infra::StoreError;

    #[test]
    fn statuses_follow_error_classes() {
        let cases = [
            (CollabError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CollabError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (CollabError::no_rows("expense", "e"), StatusCode::FORBIDDEN),
            (CollabError::SchemaMissing("t".into()), StatusCode::SERVICE_UNAVAILABLE),
            (
                CollabError::Store(StoreError::Transport("t".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(collab_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn bad_ids_are_client_errors() {
        assert!(parse_id::<TripId>("nope", "trip").is_err());
        let id = TripId::new();
        assert_eq!(parse_id::<TripId>(&id.to_string(), "trip").unwrap(), id);
    }
}
