use axum::{
    routing::{get, post},
    Router,
};

pub mod cnj;
pub mod process;
pub mod system;

/// Router for the CNJ intake, processing and lookup endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/cnj", post(cnj::submit))
        .route("/cnj/:number", get(cnj::get_by_number))
        .route("/process", post(process::process_batch))
}
