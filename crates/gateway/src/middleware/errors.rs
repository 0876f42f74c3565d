//! Production redaction of server error messages
//!
//! `AppError` responses carry a `ServerErrorMarker` when the status is 5xx.
//! In production mode the body is rebuilt with a generic message so upstream
//! details (SQL, ledger status codes, LLM payloads) never reach clients.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use paperledger_common::errors::{ErrorDetails, ErrorResponse, ServerErrorMarker};

use crate::AppState;

fn generic_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_GATEWAY => "An upstream service failed",
        StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable",
        _ => "Internal server error",
    }
}

pub async fn redact_server_errors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !state.config.server.production {
        return response;
    }

    let Some(marker) = response.extensions().get::<ServerErrorMarker>().copied() else {
        return response;
    };

    let status = response.status();
    let body = ErrorResponse {
        error: ErrorDetails {
            code: marker.code,
            message: generic_message(status).to_string(),
            field: None,
        },
    };
    (status, Json(body)).into_response()
}
