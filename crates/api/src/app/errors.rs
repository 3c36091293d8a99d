use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use cnjflow_application::ReceiveError;
use cnjflow_core::RepositoryError;

pub const CNJ_REQUIRED_MESSAGE: &str = "CNJ é obrigatório";

pub fn receive_error_to_response(err: ReceiveError) -> axum::response::Response {
    match err {
        ReceiveError::Validation(e) => json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
        ReceiveError::Queue(e) => internal_error("queue_error", &e),
    }
}

pub fn repository_error_to_response(err: RepositoryError) -> axum::response::Response {
    match err {
        RepositoryError::NotFound(number) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("CNJ {number} not found"))
        }
        other => internal_error("storage_error", &other),
    }
}

/// 500 with an opaque reference; details only go to the log.
pub fn internal_error(code: &'static str, err: &dyn std::fmt::Display) -> axum::response::Response {
    let reference = Uuid::now_v7();
    error!(%reference, error = %err, code, "request failed");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        code,
        format!("internal error (reference: {reference})"),
    )
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
