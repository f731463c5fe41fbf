//! Random movie API.
//!
//! - `GET /random-movies?count=N`
//! - `GET /health`

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use super::{with_common_layers, ApiError};
use crate::config::ServiceKind;
use crate::model::Movie;
use crate::services::random_picker::clamp_count;
use crate::services::RandomPicker;

type AppState = Arc<RandomPicker>;

/// Build the random movie router.
pub fn router(picker: Arc<RandomPicker>) -> Router {
    let routes = Router::new()
        .route("/random-movies", get(random_movies))
        .route("/health", get(health))
        .with_state(picker);
    with_common_layers(routes)
}

async fn random_movies(
    State(picker): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Movie>>, ApiError> {
    let requested = params.get("count").and_then(|c| c.trim().parse::<i64>().ok());
    let movies = picker
        .pick(clamp_count(requested))
        .await
        .map_err(|e| ApiError::internal("Error fetching random movies", e))?;
    Ok(Json(movies))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": ServiceKind::Random.name(),
    }))
}
