use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use cnjflow_application::ReceiveCnjRequest;
use cnjflow_core::CnjRecord;

use crate::app::dto::SubmitCnjRequest;
use crate::app::errors::{
    json_error, receive_error_to_response, repository_error_to_response, CNJ_REQUIRED_MESSAGE,
};
use crate::app::services::AppServices;
use crate::context::RequestContext;

/// Receive entry: validates and queues a number, answering 202 right away.
pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<SubmitCnjRequest>, JsonRejection>,
) -> Response {
    let cnj = match payload {
        Ok(Json(SubmitCnjRequest { cnj: Some(cnj) })) if !cnj.is_empty() => cnj,
        Ok(_) => return json_error(StatusCode::BAD_REQUEST, "validation_error", CNJ_REQUIRED_MESSAGE),
        Err(rejection) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text());
        }
    };

    let request = ReceiveCnjRequest {
        cnj,
        request_id: ctx.request_id().clone(),
    };
    match services.receive.execute(request).await {
        Ok(accepted) => (StatusCode::ACCEPTED, Json(accepted)).into_response(),
        Err(e) => receive_error_to_response(e),
    }
}

pub async fn get_by_number(
    Extension(services): Extension<Arc<AppServices>>,
    Path(number): Path<String>,
) -> Response {
    match services.repository.find_by_number(&number).await {
        Ok(Some(cnj)) => Json(CnjRecord::from(&cnj)).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "not_found", format!("CNJ {number} not found")),
        Err(e) => repository_error_to_response(e),
    }
}
