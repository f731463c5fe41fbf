//! Rating submission API.
//!
//! - `POST /rate`: validate and enqueue one rating
//! - `GET /health`: liveness plus broker connectivity
//! - `GET /stats`: queue name and connectivity

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;

use super::{connection_label, with_common_layers, ApiError};
use crate::config::ServiceKind;
use crate::model::{RatingMessage, RatingRequest};
use crate::services::{SubmissionError, SubmissionService};

type AppState = Arc<SubmissionService>;

/// Build the submission router.
pub fn router(service: Arc<SubmissionService>) -> Router {
    let routes = Router::new()
        .route("/rate", post(rate))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(service);
    with_common_layers(routes)
}

#[derive(Serialize)]
struct RateResponse {
    success: bool,
    message: &'static str,
    data: RatingRequest,
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Invalid(e) => ApiError::bad_request(e.to_string()),
            SubmissionError::Queue(e) => ApiError::internal("Error processing rating", e),
        }
    }
}

async fn rate(
    State(service): State<AppState>,
    body: Result<Json<RatingMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<RateResponse>), ApiError> {
    let Json(message) = body?;
    let data = service.submit(message).await?;

    Ok((
        StatusCode::CREATED,
        Json(RateResponse {
            success: true,
            message: "Rating sent to queue successfully",
            data,
        }),
    ))
}

async fn health(State(service): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": ServiceKind::Submit.name(),
        "rabbitmq": connection_label(service.is_connected()),
    }))
}

async fn stats(State(service): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "service": ServiceKind::Submit.name(),
        "rabbitmq_connected": service.is_connected(),
        "queue": service.queue_name(),
    }))
}
