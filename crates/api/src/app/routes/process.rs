use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use cnjflow_core::Delivery;

use crate::app::dto::ProcessBatchRequest;
use crate::app::errors::json_error;
use crate::app::services::AppServices;

/// Process entry: runs the process use case over a batch of queue records.
/// Per-record failures are reported in the body, never as an HTTP error.
pub async fn process_batch(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<ProcessBatchRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text());
        }
    };

    let deliveries: Vec<Delivery> = request.records.into_iter().map(Delivery::from).collect();
    let outcome = services.batch.process_batch(deliveries).await;
    info!(processed = outcome.processed, failed = outcome.failed, "batch processed");

    (StatusCode::OK, Json(outcome)).into_response()
}
